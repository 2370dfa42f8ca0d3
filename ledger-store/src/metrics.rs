//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the economy ledger:
//!
//! - `ledger_adjustments_total` - Committed balance adjustments
//! - `ledger_insufficient_funds_total` - Rejected debits
//! - `ledger_adjust_duration_seconds` - Adjustment latency histogram
//! - `ledger_devices_purchased_total` - Successful device purchases
//! - `ledger_codes_redeemed_total` - Successful code redemptions
//! - `ledger_accrual_runs_total` - Scheduler accrual passes

use crate::Error;
use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed balance adjustments
    pub adjustments_total: IntCounter,

    /// Debits rejected for insufficient funds
    pub insufficient_funds_total: IntCounter,

    /// Adjustment latency
    pub adjust_duration: Histogram,

    /// Successful device purchases
    pub devices_purchased_total: IntCounter,

    /// Successful code redemptions
    pub codes_redeemed_total: IntCounter,

    /// Scheduler accrual passes
    pub accrual_runs_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let adjustments_total = IntCounter::with_opts(Opts::new(
            "ledger_adjustments_total",
            "Committed balance adjustments",
        ))?;
        registry.register(Box::new(adjustments_total.clone()))?;

        let insufficient_funds_total = IntCounter::with_opts(Opts::new(
            "ledger_insufficient_funds_total",
            "Debits rejected for insufficient funds",
        ))?;
        registry.register(Box::new(insufficient_funds_total.clone()))?;

        let adjust_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_adjust_duration_seconds",
                "Adjustment latency histogram",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(adjust_duration.clone()))?;

        let devices_purchased_total = IntCounter::with_opts(Opts::new(
            "ledger_devices_purchased_total",
            "Successful device purchases",
        ))?;
        registry.register(Box::new(devices_purchased_total.clone()))?;

        let codes_redeemed_total = IntCounter::with_opts(Opts::new(
            "ledger_codes_redeemed_total",
            "Successful code redemptions",
        ))?;
        registry.register(Box::new(codes_redeemed_total.clone()))?;

        let accrual_runs_total = IntCounter::with_opts(Opts::new(
            "ledger_accrual_runs_total",
            "Scheduler accrual passes",
        ))?;
        registry.register(Box::new(accrual_runs_total.clone()))?;

        Ok(Self {
            adjustments_total,
            insufficient_funds_total,
            adjust_duration,
            devices_purchased_total,
            codes_redeemed_total,
            accrual_runs_total,
            registry,
        })
    }

    /// Record the outcome of one adjustment
    pub fn record_adjust(&self, result: &crate::Result<Decimal>, elapsed: Duration) {
        self.adjust_duration.observe(elapsed.as_secs_f64());
        match result {
            Ok(_) => self.adjustments_total.inc(),
            Err(Error::InsufficientFunds { .. }) => self.insufficient_funds_total.inc(),
            Err(_) => {}
        }
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.adjustments_total.get(), 0);
        assert_eq!(metrics.insufficient_funds_total.get(), 0);
    }

    #[test]
    fn test_record_adjust_outcomes() {
        let metrics = Metrics::new().unwrap();

        metrics.record_adjust(&Ok(Decimal::from(1u64)), Duration::from_millis(2));
        assert_eq!(metrics.adjustments_total.get(), 1);

        let err = Err(Error::InsufficientFunds {
            account: crate::types::AccountId::new(1),
            currency: crate::types::Currency::Coins,
            balance: Decimal::ZERO,
            requested: Decimal::from(5u64),
        });
        metrics.record_adjust(&err, Duration::from_millis(1));
        assert_eq!(metrics.insufficient_funds_total.get(), 1);
        assert_eq!(metrics.adjustments_total.get(), 1);
    }

    #[test]
    fn test_two_collectors_coexist() {
        // Each collector owns its registry, so tests can create many
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.adjustments_total.inc();
        assert_eq!(b.adjustments_total.get(), 0);
    }
}
