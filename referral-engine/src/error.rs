//! Error types for the referral engine

use thiserror::Error;

/// Result type for referral operations
pub type Result<T> = std::result::Result<T, Error>;

/// Referral engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying ledger failure
    #[error(transparent)]
    Ledger(#[from] ledger_store::Error),
}
