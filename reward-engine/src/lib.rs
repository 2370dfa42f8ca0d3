//! StarMine Reward Engine
//!
//! Weighted-random container ("case") opening and promotional key
//! redemption, settled against the ledger.
//!
//! # Design
//!
//! Outcome tables live in the catalog as plain configuration; the resolver
//! only knows how to debit a price, draw exactly one entry from a
//! [`WeightedTable`], and credit the result. A failed debit selects
//! nothing; a failure after the debit is compensated with a refund.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod catalog;
pub mod error;
pub mod resolver;
pub mod table;

// Re-exports
pub use catalog::{ContainerCatalog, ContainerEntry, ContainerSpec};
pub use error::{Error, Result};
pub use resolver::{ContainerOutcome, KeyGrant, RewardResolver};
pub use table::WeightedTable;
