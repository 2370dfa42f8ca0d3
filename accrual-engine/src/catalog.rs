//! Device catalog and accrual timing configuration
//!
//! Rates and prices are configuration data, not engine state: new device
//! kinds are added by editing the catalog, never by code changes.

use ledger_store::{Currency, DeviceRate, RateTable};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Accrual timing configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccrualConfig {
    /// Tick length in seconds
    pub tick_secs: u64,

    /// Accrual window cap in seconds; a device pays nothing past this age
    /// until restarted
    pub window_cap_secs: u64,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self {
            tick_secs: 60,
            window_cap_secs: 4 * 60 * 60, // 4 hours
        }
    }
}

impl AccrualConfig {
    /// Maximum paid ticks per activation window
    pub fn cap_ticks(&self) -> u64 {
        self.window_cap_secs / self.tick_secs.max(1)
    }

    /// Window cap in whole seconds (tick-aligned)
    pub fn cap_secs(&self) -> i64 {
        (self.cap_ticks() * self.tick_secs.max(1)) as i64
    }
}

/// One purchasable device kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceKindSpec {
    /// Catalog key
    pub kind: String,

    /// Display name
    pub name: String,

    /// Purchase price
    pub price: Decimal,

    /// Currency the price is charged in
    pub price_currency: Currency,

    /// Fixed income per tick
    pub rate: Decimal,

    /// Currency the device produces
    pub payout_currency: Currency,

    /// Per-account ownership cap
    pub max_per_account: Option<u32>,

    /// Global supply cap across all accounts
    pub global_limit: Option<u64>,
}

/// Static catalog of purchasable device kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCatalog {
    /// All known kinds
    pub kinds: Vec<DeviceKindSpec>,
}

impl Default for DeviceCatalog {
    fn default() -> Self {
        Self {
            kinds: vec![
                DeviceKindSpec {
                    kind: "novice".to_string(),
                    name: "Novice Miner".to_string(),
                    price: Decimal::from(100u64),
                    price_currency: Currency::Coins,
                    rate: Decimal::from(1u64),
                    payout_currency: Currency::Coins,
                    max_per_account: Some(5),
                    global_limit: None,
                },
                DeviceKindSpec {
                    kind: "advanced".to_string(),
                    name: "Advanced Miner".to_string(),
                    price: Decimal::from(500u64),
                    price_currency: Currency::Coins,
                    rate: Decimal::from(6u64),
                    payout_currency: Currency::Coins,
                    max_per_account: Some(5),
                    global_limit: None,
                },
                DeviceKindSpec {
                    kind: "stellar".to_string(),
                    name: "Stellar Extractor".to_string(),
                    price: Decimal::from(2000u64),
                    price_currency: Currency::Coins,
                    rate: Decimal::from(1u64),
                    payout_currency: Currency::Stars,
                    max_per_account: Some(2),
                    global_limit: Some(10_000),
                },
            ],
        }
    }
}

impl DeviceCatalog {
    /// Look up one kind
    pub fn get(&self, kind: &str) -> Option<&DeviceKindSpec> {
        self.kinds.iter().find(|spec| spec.kind == kind)
    }

    /// Build the rate lookup handed to the ledger's accrual primitive
    pub fn rate_table(&self, config: &AccrualConfig) -> RateTable {
        let mut rates = HashMap::new();
        for spec in &self.kinds {
            rates.insert(
                spec.kind.clone(),
                DeviceRate {
                    per_tick: spec.rate,
                    currency: spec.payout_currency,
                },
            );
        }
        RateTable {
            tick_secs: config.tick_secs,
            cap_ticks: config.cap_ticks(),
            rates,
        }
    }
}
