//! Error types for the accrual engine

use thiserror::Error;

/// Result type for accrual operations
pub type Result<T> = std::result::Result<T, Error>;

/// Accrual engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Device kind missing from the catalog
    #[error("unknown device kind: {0}")]
    UnknownDeviceKind(String),

    /// Underlying ledger failure
    #[error(transparent)]
    Ledger(#[from] ledger_store::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}
