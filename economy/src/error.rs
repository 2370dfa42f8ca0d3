//! Error types for the economy facade

use thiserror::Error;

/// Result type for economy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Economy facade errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger failure
    #[error(transparent)]
    Ledger(#[from] ledger_store::Error),

    /// Device shop or scheduler failure
    #[error(transparent)]
    Accrual(#[from] accrual_engine::Error),

    /// Container or key redemption failure
    #[error(transparent)]
    Reward(#[from] reward_engine::Error),

    /// Referral program failure
    #[error(transparent)]
    Referral(#[from] referral_engine::Error),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}
