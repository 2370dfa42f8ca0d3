//! StarMine Ledger Store
//!
//! Durable per-account balance records plus an append-only transaction log.
//!
//! # Architecture
//!
//! - **Single Writer**: one actor task serializes all mutations, so
//!   concurrent adjustments against the same account never lose updates
//! - **Atomic Commits**: every mutation and its audit record land in one
//!   RocksDB `WriteBatch`
//! - **Append-only**: transactions are never modified or deleted
//!
//! # Invariants
//!
//! - No balance ever drops below zero; violating debits are rejected whole
//! - `total_earned` is monotonic and accumulates only positive deltas
//! - Every committed balance change has exactly one transaction record with
//!   matching before/after snapshots

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use metrics::Metrics;
pub use storage::Storage;
pub use types::{
    Account, AccountId, Currency, Device, DeviceRate, PromoCode, RateTable, ReferralLink,
    ReferralState, StartOutcome, Transaction,
};
