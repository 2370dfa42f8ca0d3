//! Device purchase and activation
//!
//! Thin domain layer over the ledger's atomic primitives: the shop resolves
//! prices and caps from the catalog, the ledger enforces them.

use crate::{AccrualConfig, DeviceCatalog, Error, Result};
use chrono::Utc;
use ledger_store::{AccountId, Device, Ledger, StartOutcome};
use std::sync::Arc;

/// Sells and activates income-producing devices
#[derive(Clone)]
pub struct DeviceShop {
    ledger: Ledger,
    catalog: Arc<DeviceCatalog>,
    config: AccrualConfig,
}

impl DeviceShop {
    /// Create a shop backed by the given ledger and catalog
    pub fn new(ledger: Ledger, catalog: Arc<DeviceCatalog>, config: AccrualConfig) -> Self {
        Self {
            ledger,
            catalog,
            config,
        }
    }

    /// Buy one device of `kind`.
    ///
    /// The price debit, the device append, and the global supply counter
    /// move in one atomic ledger operation; a failed purchase leaves no
    /// trace.
    pub async fn purchase(&self, account_id: AccountId, kind: &str) -> Result<Device> {
        let spec = self
            .catalog
            .get(kind)
            .ok_or_else(|| Error::UnknownDeviceKind(kind.to_string()))?;

        let device = self
            .ledger
            .purchase_device(
                account_id,
                Device::new(&spec.kind, Utc::now()),
                spec.price,
                spec.price_currency,
                spec.max_per_account,
                spec.global_limit,
                &format!("shop:{}", spec.kind),
            )
            .await?;

        Ok(device)
    }

    /// Start (or restart) mining for every idle or expired device
    pub async fn start_mining(&self, account_id: AccountId) -> Result<StartOutcome> {
        Ok(self
            .ledger
            .start_devices(account_id, self.config.cap_secs())
            .await?)
    }
}
