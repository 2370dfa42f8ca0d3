//! StarMine Referral Engine
//!
//! One-level referral links with two payout moments: one-time bonuses
//! for both parties when a link lands, and flat per-activity bonuses to
//! the referrer whenever the referred account spends.
//!
//! All payouts settle through the ledger, so every bonus carries an
//! audit record and linking is exactly-once even under concurrent
//! requests.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod program;

// Re-exports
pub use config::ReferralConfig;
pub use error::{Error, Result};
pub use program::{ActivityKind, ReferralProgram};
