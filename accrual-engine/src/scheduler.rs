//! Recurring accrual scheduler
//!
//! One background task converts elapsed wall-clock time into currency for
//! every device across every account. There are no per-device timers: time
//! is derived lazily from each device's stored activation instant whenever a
//! pass runs, which tolerates restarts and uneven tick spacing.
//!
//! Two entry points share the same idempotent ledger primitive:
//! - `catch_up` runs once at boot, before the recurring loop, and pays out
//!   whatever accumulated while the process was down (`mining:backfill`)
//! - `run` ticks on a fixed interval and pays the ticks that completed
//!   since the last pass (`mining:tick`)
//!
//! A failure on one account is logged and never halts the pass.

use crate::{AccrualConfig, DeviceCatalog, Result};
use ledger_store::{Ledger, RateTable};
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Recurring accrual task over all accounts
pub struct AccrualScheduler {
    ledger: Ledger,
    rates: RateTable,
    tick: Duration,
}

impl AccrualScheduler {
    /// Create a scheduler for the given catalog and timing configuration
    pub fn new(ledger: Ledger, catalog: &DeviceCatalog, config: AccrualConfig) -> Self {
        Self {
            ledger,
            rates: catalog.rate_table(&config),
            tick: Duration::from_secs(config.tick_secs.max(1)),
        }
    }

    /// One-time backfill for time elapsed while the process was down.
    ///
    /// Safe to re-run: owed ticks are derived from each device's persisted
    /// cursor, so a second invocation credits nothing.
    pub async fn catch_up(&self) -> Result<()> {
        let credited = self.run_pass("mining:backfill").await?;
        tracing::info!(accounts_credited = credited, "accrual catch-up complete");
        Ok(())
    }

    /// Run the recurring tick loop (never returns)
    pub async fn run(self) {
        let mut timer = interval(self.tick);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            match self.run_pass("mining:tick").await {
                Ok(credited) => {
                    if credited > 0 {
                        tracing::debug!(accounts_credited = credited, "accrual tick complete");
                    }
                }
                Err(e) => tracing::error!("accrual tick failed: {}", e),
            }
        }
    }

    /// One pass over all accounts; returns how many received a credit
    async fn run_pass(&self, reason: &str) -> Result<usize> {
        let accounts = self.ledger.scan_account_ids().await?;
        let mut credited_accounts = 0usize;

        for account_id in accounts {
            match self
                .ledger
                .accrue(account_id, self.rates.clone(), reason)
                .await
            {
                Ok(credited) if !credited.is_empty() => {
                    credited_accounts += 1;
                    for (currency, amount) in credited {
                        tracing::debug!(
                            account = %account_id,
                            currency = %currency,
                            %amount,
                            reason,
                            "accrual credited"
                        );
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    // One account must never block the others
                    tracing::warn!(account = %account_id, "accrual failed: {}", e);
                }
            }
        }

        self.ledger.metrics().accrual_runs_total.inc();
        Ok(credited_accounts)
    }
}
