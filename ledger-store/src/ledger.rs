//! Main ledger orchestration layer
//!
//! Ties storage, metrics, and the single-writer actor into the high-level
//! API every other engine component calls. This is the single choke point
//! for balance mutation.
//!
//! # Example
//!
//! ```no_run
//! use ledger_store::{AccountId, Config, Currency, Ledger};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> ledger_store::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!
//!     let balance = ledger
//!         .adjust_balance(AccountId::new(1), Currency::Coins, Decimal::from(1u64), "click")
//!         .await?;
//!     assert!(balance > Decimal::ZERO);
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle, LedgerMessage},
    types::{
        Account, AccountId, Currency, Device, RateTable, StartOutcome, Transaction,
    },
    Config, Error, Metrics, Result, Storage,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Main ledger interface (cheap to clone, all clones share one writer)
#[derive(Clone)]
pub struct Ledger {
    /// Actor handle for serialized operations
    handle: LedgerHandle,

    /// Metrics collector
    metrics: Arc<Metrics>,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Arc::new(
            Metrics::new().map_err(|e| Error::Other(format!("metrics init failed: {}", e)))?,
        );

        let handle = spawn_ledger_actor(storage, metrics.clone(), config.mailbox_capacity);

        Ok(Self { handle, metrics })
    }

    /// Metrics collector shared with the actor
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Atomically apply one signed delta and record it in the audit trail.
    ///
    /// A debit exceeding the balance fails with [`Error::InsufficientFunds`]
    /// and leaves no trace. Accounts are created lazily on first credit.
    pub async fn adjust_balance(
        &self,
        account_id: AccountId,
        currency: Currency,
        delta: Decimal,
        reason: &str,
    ) -> Result<Decimal> {
        let reason = reason.to_string();
        self.handle
            .call(|respond| LedgerMessage::Adjust {
                account_id,
                currency,
                delta,
                reason,
                respond,
            })
            .await
    }

    /// Get one account
    pub async fn get_account(&self, account_id: AccountId) -> Result<Account> {
        self.handle
            .call(|respond| LedgerMessage::GetAccount {
                account_id,
                respond,
            })
            .await
    }

    /// Current balances per currency (empty map for unknown accounts)
    pub async fn get_balance(&self, account_id: AccountId) -> Result<HashMap<Currency, Decimal>> {
        match self.get_account(account_id).await {
            Ok(account) => Ok(account.balances),
            Err(Error::AccountNotFound(_)) => Ok(HashMap::new()),
            Err(e) => Err(e),
        }
    }

    /// Newest-first positive deltas for the public "recent wins" feed
    pub async fn list_recent_credits(&self, limit: usize) -> Result<Vec<Transaction>> {
        self.handle
            .call(|respond| LedgerMessage::RecentCredits { limit, respond })
            .await
    }

    /// Newest-first transactions for one account
    pub async fn account_transactions(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<Transaction>> {
        self.handle
            .call(|respond| LedgerMessage::AccountTransactions {
                account_id,
                limit,
                respond,
            })
            .await
    }

    /// Atomic debit + device append, enforcing per-account and global caps
    #[allow(clippy::too_many_arguments)]
    pub async fn purchase_device(
        &self,
        account_id: AccountId,
        device: Device,
        price: Decimal,
        currency: Currency,
        max_per_account: Option<u32>,
        global_limit: Option<u64>,
        reason: &str,
    ) -> Result<Device> {
        let reason = reason.to_string();
        self.handle
            .call(|respond| LedgerMessage::PurchaseDevice {
                account_id,
                device,
                price,
                currency,
                max_per_account,
                global_limit,
                reason,
                respond,
            })
            .await
    }

    /// Reactivate every idle or expired device on the account
    pub async fn start_devices(
        &self,
        account_id: AccountId,
        cap_secs: i64,
    ) -> Result<StartOutcome> {
        self.handle
            .call(|respond| LedgerMessage::StartDevices {
                account_id,
                cap_secs,
                respond,
            })
            .await
    }

    /// Pay out all owed ticks for one account (idempotent)
    pub async fn accrue(
        &self,
        account_id: AccountId,
        rates: RateTable,
        reason: &str,
    ) -> Result<Vec<(Currency, Decimal)>> {
        let reason = reason.to_string();
        self.handle
            .call(|respond| LedgerMessage::Accrue {
                account_id,
                rates,
                reason,
                respond,
            })
            .await
    }

    /// All known account IDs (scheduler support)
    pub async fn scan_account_ids(&self) -> Result<Vec<AccountId>> {
        self.handle
            .call(|respond| LedgerMessage::ScanAccounts { respond })
            .await
    }

    /// Register a promotional code (admin operation)
    pub async fn create_code(
        &self,
        code: &str,
        currency: Currency,
        amount: Decimal,
        uses: u32,
    ) -> Result<()> {
        let code = code.to_string();
        self.handle
            .call(|respond| LedgerMessage::CreateCode {
                code,
                currency,
                amount,
                uses,
                respond,
            })
            .await
    }

    /// Redeem a promotional code, one-time per account, bounded globally
    pub async fn redeem_code(
        &self,
        code: &str,
        account_id: AccountId,
        reason: &str,
    ) -> Result<(Currency, Decimal)> {
        let code = code.to_string();
        let reason = reason.to_string();
        self.handle
            .call(|respond| LedgerMessage::RedeemCode {
                code,
                account_id,
                reason,
                respond,
            })
            .await
    }

    /// Record a referral link and grant both one-time bonuses.
    ///
    /// Benign outcomes (self-link, duplicate link, unknown referrer) resolve
    /// to `Ok(false)` rather than hard errors; repeated invocation never
    /// double-grants.
    pub async fn link_referral(
        &self,
        referred: AccountId,
        referrer: AccountId,
        signup_bonus: (Currency, Decimal),
        referrer_bonus: (Currency, Decimal),
    ) -> Result<bool> {
        if referred == referrer {
            tracing::debug!(account = %referred, "self-referral ignored");
            return Ok(false);
        }

        let result = self
            .handle
            .call(|respond| LedgerMessage::LinkReferral {
                referred,
                referrer,
                signup_bonus,
                referrer_bonus,
                respond,
            })
            .await;

        match result {
            Ok(()) => Ok(true),
            Err(Error::SelfReferral(_))
            | Err(Error::AlreadyLinked(_))
            | Err(Error::AccountNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Referrer of an account, if linked
    pub async fn referrer_of(&self, account_id: AccountId) -> Result<Option<AccountId>> {
        self.handle
            .call(|respond| LedgerMessage::ReferrerOf {
                account_id,
                respond,
            })
            .await
    }

    /// Administrative hard delete (audit log is retained)
    pub async fn purge_account(&self, account_id: AccountId) -> Result<()> {
        self.handle
            .call(|respond| LedgerMessage::PurgeAccount {
                account_id,
                respond,
            })
            .await
    }

    /// Shutdown ledger
    pub async fn shutdown(&self) -> Result<()> {
        self.handle.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_ledger() -> (Ledger, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Ledger::open(config).await.unwrap(), temp_dir)
    }

    #[tokio::test]
    async fn test_ledger_open_shutdown() {
        let (ledger, _temp) = create_test_ledger().await;
        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_get_balance_unknown_account_is_empty() {
        let (ledger, _temp) = create_test_ledger().await;
        let balances = ledger.get_balance(AccountId::new(404)).await.unwrap();
        assert!(balances.is_empty());
        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_adjust_and_read_back() {
        let (ledger, _temp) = create_test_ledger().await;
        let id = AccountId::new(1);

        ledger
            .adjust_balance(id, Currency::Coins, Decimal::from(42u64), "click")
            .await
            .unwrap();

        let balances = ledger.get_balance(id).await.unwrap();
        assert_eq!(balances.get(&Currency::Coins), Some(&Decimal::from(42u64)));

        let txs = ledger.account_transactions(id, 10).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].reason, "click");

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_adjustments_are_serialized() {
        let (ledger, _temp) = create_test_ledger().await;
        let id = AccountId::new(2);
        let n = 100;

        let mut handles = Vec::new();
        for _ in 0..n {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .adjust_balance(id, Currency::Coins, Decimal::from(1u64), "click")
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // No lost updates: final balance is exactly N
        let balances = ledger.get_balance(id).await.unwrap();
        assert_eq!(balances.get(&Currency::Coins), Some(&Decimal::from(n as u64)));

        // Exactly N transaction records exist
        let txs = ledger.account_transactions(id, n * 2).await.unwrap();
        assert_eq!(txs.len(), n);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_self_referral_never_links() {
        let (ledger, _temp) = create_test_ledger().await;
        let id = AccountId::new(3);
        let bonus = (Currency::Coins, Decimal::from(25u64));

        let linked = ledger.link_referral(id, id, bonus, bonus).await.unwrap();
        assert!(!linked);
        assert_eq!(ledger.referrer_of(id).await.unwrap(), None);
        assert!(ledger.get_balance(id).await.unwrap().is_empty());

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_link_referral_idempotent() {
        let (ledger, _temp) = create_test_ledger().await;
        let referrer = AccountId::new(4);
        let referred = AccountId::new(5);
        let signup = (Currency::Coins, Decimal::from(25u64));
        let invite = (Currency::Coins, Decimal::from(50u64));

        ledger
            .adjust_balance(referrer, Currency::Coins, Decimal::from(1u64), "seed")
            .await
            .unwrap();

        assert!(ledger
            .link_referral(referred, referrer, signup, invite)
            .await
            .unwrap());
        // Second call links nothing and pays nothing
        assert!(!ledger
            .link_referral(referred, referrer, signup, invite)
            .await
            .unwrap());

        let balances = ledger.get_balance(referrer).await.unwrap();
        assert_eq!(balances.get(&Currency::Coins), Some(&Decimal::from(51u64)));

        ledger.shutdown().await.unwrap();
    }
}
