//! Economy facade
//!
//! Wires the ledger, the device shop, the reward resolver and the
//! referral program into one surface. Spending operations fire referral
//! fanout after they commit; a fanout failure is logged and never fails
//! the operation that triggered it.

use crate::{EconomyConfig, Result};
use accrual_engine::{AccrualScheduler, DeviceCatalog, DeviceShop};
use ledger_store::{
    AccountId, Currency, Device, Ledger, Metrics, StartOutcome, Transaction,
};
use referral_engine::{ActivityKind, ReferralProgram};
use reward_engine::{ContainerCatalog, ContainerOutcome, KeyGrant, RewardResolver};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Unified entry point to the whole economy
#[derive(Clone)]
pub struct Economy {
    ledger: Ledger,
    shop: DeviceShop,
    resolver: RewardResolver,
    referrals: ReferralProgram,
    devices: Arc<DeviceCatalog>,
    config: EconomyConfig,
}

impl Economy {
    /// Open the economy over a fresh or existing data directory
    pub async fn open(config: EconomyConfig) -> Result<Self> {
        let ledger = Ledger::open(config.ledger.clone()).await?;

        let devices = Arc::new(config.devices.clone());
        let shop = DeviceShop::new(ledger.clone(), devices.clone(), config.accrual);
        let resolver = RewardResolver::new(ledger.clone(), Arc::new(config.containers.clone()));
        let referrals = ReferralProgram::new(ledger.clone(), config.referral.clone());

        tracing::info!(
            device_kinds = devices.kinds.len(),
            containers = config.containers.containers.len(),
            "economy opened"
        );

        Ok(Self {
            ledger,
            shop,
            resolver,
            referrals,
            devices,
            config,
        })
    }

    /// Direct access to the underlying ledger
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Prometheus collectors for this instance
    pub fn metrics(&self) -> Arc<Metrics> {
        self.ledger.metrics()
    }

    /// Current balances per currency (empty for unknown accounts)
    pub async fn get_balance(&self, account_id: AccountId) -> Result<HashMap<Currency, Decimal>> {
        Ok(self.ledger.get_balance(account_id).await?)
    }

    /// Apply a signed balance change with an audit reason
    pub async fn adjust_balance(
        &self,
        account_id: AccountId,
        currency: Currency,
        delta: Decimal,
        reason: &str,
    ) -> Result<Decimal> {
        Ok(self
            .ledger
            .adjust_balance(account_id, currency, delta, reason)
            .await?)
    }

    /// Newest-first global credit feed
    pub async fn list_recent_credits(&self, limit: usize) -> Result<Vec<Transaction>> {
        Ok(self.ledger.list_recent_credits(limit).await?)
    }

    /// Newest-first transaction history for one account
    pub async fn recent_activity(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<Transaction>> {
        Ok(self.ledger.account_transactions(account_id, limit).await?)
    }

    /// Buy one device; fires the referral purchase bonus
    pub async fn purchase_device(&self, account_id: AccountId, kind: &str) -> Result<Device> {
        let device = self.shop.purchase(account_id, kind).await?;
        self.fanout(account_id, ActivityKind::Purchase).await;
        Ok(device)
    }

    /// Start (or restart) accrual for every idle or expired device
    pub async fn start_accrual(&self, account_id: AccountId) -> Result<StartOutcome> {
        Ok(self.shop.start_mining(account_id).await?)
    }

    /// Open one container; fires the referral collection bonus
    pub async fn open_container(
        &self,
        account_id: AccountId,
        container_id: &str,
    ) -> Result<ContainerOutcome> {
        let outcome = self.resolver.open_container(account_id, container_id).await?;
        self.fanout(account_id, ActivityKind::Collection).await;
        Ok(outcome)
    }

    /// Redeem a promotional key; fires the referral redemption bonus
    pub async fn redeem_key(&self, code: &str, account_id: AccountId) -> Result<KeyGrant> {
        let grant = self.resolver.redeem_key(code, account_id).await?;
        self.fanout(account_id, ActivityKind::Redemption).await;
        Ok(grant)
    }

    /// Register a promotional key with a bounded number of uses
    pub async fn create_key(
        &self,
        code: &str,
        currency: Currency,
        amount: Decimal,
        uses: u32,
    ) -> Result<()> {
        Ok(self.ledger.create_code(code, currency, amount, uses).await?)
    }

    /// Link an account under a referrer, paying both one-time bonuses.
    ///
    /// Returns `true` when the link landed; benign rejections (self-link,
    /// already linked, unknown referrer) return `false`.
    pub async fn link_referral(&self, referred: AccountId, referrer: AccountId) -> Result<bool> {
        Ok(self.referrals.link(referred, referrer).await?)
    }

    /// Erase one account's current state, keeping the transaction log
    pub async fn purge_account(&self, account_id: AccountId) -> Result<()> {
        Ok(self.ledger.purge_account(account_id).await?)
    }

    /// Backfill missed accrual, then run the recurring tick loop in a
    /// background task.
    pub async fn spawn_scheduler(&self) -> Result<JoinHandle<()>> {
        let scheduler = AccrualScheduler::new(
            self.ledger.clone(),
            &self.devices,
            self.config.accrual,
        );
        scheduler.catch_up().await?;
        Ok(tokio::spawn(scheduler.run()))
    }

    /// Flush and stop the ledger actor
    pub async fn shutdown(&self) -> Result<()> {
        Ok(self.ledger.shutdown().await?)
    }

    /// Container catalog in effect
    pub fn containers(&self) -> &ContainerCatalog {
        &self.config.containers
    }

    /// Device catalog in effect
    pub fn devices(&self) -> &DeviceCatalog {
        &self.devices
    }

    async fn fanout(&self, account_id: AccountId, kind: ActivityKind) {
        if let Err(e) = self.referrals.reward_activity(account_id, kind).await {
            tracing::warn!(account = %account_id, "referral fanout failed: {}", e);
        }
    }
}
