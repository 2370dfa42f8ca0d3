//! StarMine Economy
//!
//! The complete in-game economy behind one facade: durable balances and
//! audit history, time-based device income, weighted-random containers,
//! promotional keys, and one-level referral fanout.
//!
//! Every balance change, whatever its origin, settles through the
//! ledger's single-writer actor, so the whole economy shares one set of
//! invariants: no negative balances, no lost updates, one audit record
//! per committed change.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod economy;
pub mod error;

// Re-exports
pub use config::EconomyConfig;
pub use economy::Economy;
pub use error::{Error, Result};

pub use accrual_engine::{AccrualConfig, DeviceCatalog, DeviceKindSpec};
pub use ledger_store::{Account, AccountId, Currency, Device, StartOutcome, Transaction};
pub use referral_engine::{ActivityKind, ReferralConfig};
pub use reward_engine::{ContainerCatalog, ContainerOutcome, ContainerSpec, KeyGrant};
