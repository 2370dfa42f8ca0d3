//! Actor-based concurrency for the ledger
//!
//! All mutations funnel through one tokio task (the single-writer pattern):
//! concurrent adjustments against the same account serialize through the
//! mailbox, so two deltas can never overwrite each other ("lost update").
//! Reads go through the same mailbox and therefore always observe committed
//! state in mailbox order.
//!
//! ```text
//! callers (handlers, scheduler)        LedgerHandle (Clone)
//!         │                                   │
//!         └──────── mpsc::channel (bounded) ──┘
//!                            │
//!                            ▼
//!                  LedgerActor (single task)
//!                            │
//!                            ▼
//!              Storage — one WriteBatch per op
//! ```

use crate::types::{
    Account, AccountId, Currency, Device, RateTable, StartOutcome, Transaction,
};
use crate::{Error, Metrics, Result, Storage};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Apply one signed delta
    Adjust {
        account_id: AccountId,
        currency: Currency,
        delta: Decimal,
        reason: String,
        respond: oneshot::Sender<Result<Decimal>>,
    },

    /// Read one account
    GetAccount {
        account_id: AccountId,
        respond: oneshot::Sender<Result<Account>>,
    },

    /// Newest-first positive deltas across all accounts
    RecentCredits {
        limit: usize,
        respond: oneshot::Sender<Result<Vec<Transaction>>>,
    },

    /// Newest-first transactions for one account
    AccountTransactions {
        account_id: AccountId,
        limit: usize,
        respond: oneshot::Sender<Result<Vec<Transaction>>>,
    },

    /// Debit price and append a device atomically
    PurchaseDevice {
        account_id: AccountId,
        device: Device,
        price: Decimal,
        currency: Currency,
        max_per_account: Option<u32>,
        global_limit: Option<u64>,
        reason: String,
        respond: oneshot::Sender<Result<Device>>,
    },

    /// Reactivate idle/expired devices
    StartDevices {
        account_id: AccountId,
        cap_secs: i64,
        respond: oneshot::Sender<Result<StartOutcome>>,
    },

    /// Pay out owed ticks for one account
    Accrue {
        account_id: AccountId,
        rates: RateTable,
        reason: String,
        respond: oneshot::Sender<Result<Vec<(Currency, Decimal)>>>,
    },

    /// All known account IDs
    ScanAccounts {
        respond: oneshot::Sender<Result<Vec<AccountId>>>,
    },

    /// Register a promotional code
    CreateCode {
        code: String,
        currency: Currency,
        amount: Decimal,
        uses: u32,
        respond: oneshot::Sender<Result<()>>,
    },

    /// Redeem a promotional code
    RedeemCode {
        code: String,
        account_id: AccountId,
        reason: String,
        respond: oneshot::Sender<Result<(Currency, Decimal)>>,
    },

    /// Record a referral link and grant one-time bonuses
    LinkReferral {
        referred: AccountId,
        referrer: AccountId,
        signup_bonus: (Currency, Decimal),
        referrer_bonus: (Currency, Decimal),
        respond: oneshot::Sender<Result<()>>,
    },

    /// Referrer lookup
    ReferrerOf {
        account_id: AccountId,
        respond: oneshot::Sender<Result<Option<AccountId>>>,
    },

    /// Administrative hard delete
    PurgeAccount {
        account_id: AccountId,
        respond: oneshot::Sender<Result<()>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger messages
pub struct LedgerActor {
    storage: Arc<Storage>,
    mailbox: mpsc::Receiver<LedgerMessage>,
    metrics: Arc<Metrics>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<LedgerMessage>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            storage,
            mailbox,
            metrics,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if matches!(msg, LedgerMessage::Shutdown) {
                break;
            }
            self.handle_message(msg);
        }
        tracing::info!("ledger actor stopped");
    }

    fn handle_message(&mut self, msg: LedgerMessage) {
        let now = Utc::now();

        match msg {
            LedgerMessage::Adjust {
                account_id,
                currency,
                delta,
                reason,
                respond,
            } => {
                let start = Instant::now();
                let result = self
                    .storage
                    .adjust_balance(account_id, currency, delta, &reason, now);
                self.metrics.record_adjust(&result, start.elapsed());
                let _ = respond.send(result);
            }

            LedgerMessage::GetAccount {
                account_id,
                respond,
            } => {
                let result = self.storage.load_account(account_id).and_then(|account| {
                    account.ok_or(Error::AccountNotFound(account_id))
                });
                let _ = respond.send(result);
            }

            LedgerMessage::RecentCredits { limit, respond } => {
                let _ = respond.send(self.storage.recent_credits(limit));
            }

            LedgerMessage::AccountTransactions {
                account_id,
                limit,
                respond,
            } => {
                let _ = respond.send(self.storage.account_transactions(account_id, limit));
            }

            LedgerMessage::PurchaseDevice {
                account_id,
                device,
                price,
                currency,
                max_per_account,
                global_limit,
                reason,
                respond,
            } => {
                let result = self.storage.purchase_device(
                    account_id,
                    device,
                    price,
                    currency,
                    max_per_account,
                    global_limit,
                    &reason,
                    now,
                );
                if result.is_ok() {
                    self.metrics.devices_purchased_total.inc();
                }
                let _ = respond.send(result);
            }

            LedgerMessage::StartDevices {
                account_id,
                cap_secs,
                respond,
            } => {
                let _ = respond.send(self.storage.start_devices(account_id, cap_secs, now));
            }

            LedgerMessage::Accrue {
                account_id,
                rates,
                reason,
                respond,
            } => {
                let _ = respond.send(self.storage.accrue(account_id, &rates, now, &reason));
            }

            LedgerMessage::ScanAccounts { respond } => {
                let _ = respond.send(self.storage.scan_account_ids());
            }

            LedgerMessage::CreateCode {
                code,
                currency,
                amount,
                uses,
                respond,
            } => {
                let _ = respond.send(self.storage.create_code(&code, currency, amount, uses, now));
            }

            LedgerMessage::RedeemCode {
                code,
                account_id,
                reason,
                respond,
            } => {
                let result = self.storage.redeem_code(&code, account_id, &reason, now);
                if result.is_ok() {
                    self.metrics.codes_redeemed_total.inc();
                }
                let _ = respond.send(result);
            }

            LedgerMessage::LinkReferral {
                referred,
                referrer,
                signup_bonus,
                referrer_bonus,
                respond,
            } => {
                let _ = respond.send(self.storage.link_referral(
                    referred,
                    referrer,
                    signup_bonus,
                    referrer_bonus,
                    now,
                ));
            }

            LedgerMessage::ReferrerOf {
                account_id,
                respond,
            } => {
                let _ = respond.send(self.storage.referrer_of(account_id));
            }

            LedgerMessage::PurgeAccount {
                account_id,
                respond,
            } => {
                let _ = respond.send(self.storage.purge_account(account_id));
            }

            LedgerMessage::Shutdown => {
                // Handled in the main loop
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Send a message and await the oneshot reply
    pub(crate) async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .await
            .map_err(|_| Error::Concurrency("actor mailbox closed".to_string()))?;
        rx.await
            .map_err(|_| Error::Concurrency("response channel closed".to_string()))?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("actor mailbox closed".to_string()))
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    storage: Arc<Storage>,
    metrics: Arc<Metrics>,
    mailbox_capacity: usize,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = LedgerActor::new(storage, rx, metrics);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn test_parts() -> (Arc<Storage>, Arc<Metrics>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let storage = Arc::new(Storage::open(&config).unwrap());
        let metrics = Arc::new(Metrics::new().unwrap());
        (storage, metrics, temp_dir)
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (storage, metrics, _temp) = test_parts();
        let handle = spawn_ledger_actor(storage, metrics, 100);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_adjust_roundtrip() {
        let (storage, metrics, _temp) = test_parts();
        let handle = spawn_ledger_actor(storage, metrics, 100);
        let id = AccountId::new(1);

        let balance = handle
            .call(|respond| LedgerMessage::Adjust {
                account_id: id,
                currency: Currency::Coins,
                delta: Decimal::from(5u64),
                reason: "click".to_string(),
                respond,
            })
            .await
            .unwrap();
        assert_eq!(balance, Decimal::from(5u64));

        let account = handle
            .call(|respond| LedgerMessage::GetAccount {
                account_id: id,
                respond,
            })
            .await
            .unwrap();
        assert_eq!(account.balance(Currency::Coins), Decimal::from(5u64));

        handle.shutdown().await.unwrap();
    }
}
