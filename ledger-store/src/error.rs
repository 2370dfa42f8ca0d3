//! Error types for the ledger store

use crate::types::{AccountId, Currency};
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Attempted debit exceeds the current balance (never partially applied)
    #[error("insufficient funds: account {account} has {balance} {currency}, requested {requested}")]
    InsufficientFunds {
        /// Account whose debit was rejected
        account: AccountId,
        /// Currency of the attempted debit
        currency: Currency,
        /// Balance at the time of the attempt
        balance: Decimal,
        /// Absolute amount requested
        requested: Decimal,
    },

    /// Referenced account does not exist
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// Adjustment with a zero delta
    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Promotional code does not exist
    #[error("unknown code")]
    UnknownCode,

    /// Promotional code has no uses left
    #[error("code exhausted")]
    CodeExhausted,

    /// Account already redeemed this code (benign idempotency guard)
    #[error("code already redeemed by account {0}")]
    AlreadyRedeemed(AccountId),

    /// Account already has a recorded referrer (benign idempotency guard)
    #[error("account {0} already has a referrer")]
    AlreadyLinked(AccountId),

    /// Account attempted to refer itself
    #[error("account {0} cannot refer itself")]
    SelfReferral(AccountId),

    /// Per-account device cap reached
    #[error("per-account limit reached for device kind '{0}'")]
    PerAccountLimitReached(String),

    /// Global device cap reached
    #[error("global limit reached for device kind '{0}'")]
    GlobalLimitReached(String),

    /// Storage error (RocksDB)
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Idempotency guards tripping is expected behavior, not a system failure
    pub fn is_benign(&self) -> bool {
        matches!(self, Error::AlreadyRedeemed(_) | Error::AlreadyLinked(_))
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
