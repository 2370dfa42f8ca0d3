//! Error types for the reward engine

use thiserror::Error;

/// Result type for reward operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reward engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Container ID missing from the catalog
    #[error("unknown container: {0}")]
    UnknownContainer(String),

    /// Outcome table has no selectable entries (zero total weight)
    #[error("container '{0}' has no probability mass")]
    EmptyTable(String),

    /// Underlying ledger failure
    #[error(transparent)]
    Ledger(#[from] ledger_store::Error),
}
