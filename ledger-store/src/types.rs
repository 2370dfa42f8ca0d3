//! Core types for the economy ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for currency amounts)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

/// Account identifier (stable external user ID)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AccountId(i64);

impl AccountId {
    /// Create new account ID
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get as raw integer
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Big-endian key bytes for storage ordering
    pub fn key_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Reconstruct from storage key bytes
    pub fn from_key_bytes(bytes: [u8; 8]) -> Self {
        Self(i64::from_be_bytes(bytes))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Virtual currency code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// Primary soft currency
    Coins,
    /// Premium currency
    Stars,
}

impl Currency {
    /// Lowercase currency code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Coins => "coins",
            Currency::Stars => "stars",
        }
    }

    /// Parse from string
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "coins" => Some(Currency::Coins),
            "stars" => Some(Currency::Stars),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Income-producing device ("miner") owned by one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Catalog key identifying rate and price
    pub kind: String,

    /// Start of the current accrual window (None = idle)
    pub activated_at: Option<DateTime<Utc>>,

    /// Ticks of the current window already paid out
    pub credited_ticks: u64,

    /// Device is enabled (disabled devices never accrue)
    pub active: bool,

    /// Purchase timestamp
    pub purchased_at: DateTime<Utc>,
}

impl Device {
    /// Create a freshly purchased, idle device
    pub fn new(kind: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            kind: kind.into(),
            activated_at: None,
            credited_ticks: 0,
            active: true,
            purchased_at: now,
        }
    }

    /// Age of the current accrual window in seconds, if running
    pub fn window_age_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.activated_at.map(|t| (now - t).num_seconds())
    }

    /// Device is inside its accrual window
    pub fn is_accruing(&self, now: DateTime<Utc>, cap_secs: i64) -> bool {
        self.active
            && matches!(self.window_age_secs(now), Some(age) if age >= 0 && age < cap_secs)
    }

    /// Window has run out; no further income until restarted
    pub fn is_expired(&self, now: DateTime<Utc>, cap_secs: i64) -> bool {
        self.active && matches!(self.window_age_secs(now), Some(age) if age >= cap_secs)
    }
}

/// Referral metadata embedded in an account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferralState {
    /// Account that referred this one (at most one, never self)
    pub referrer: Option<AccountId>,

    /// One-time registration bonus already granted to this account
    pub signup_bonus_granted: bool,

    /// One-time referral bonus already granted to the referrer
    pub referrer_bonus_granted: bool,
}

/// Durable per-user balance record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Stable external identity
    pub account_id: AccountId,

    /// Current balance per currency (never negative)
    pub balances: HashMap<Currency, Decimal>,

    /// Cumulative lifetime credited amount per currency (monotonic)
    pub total_earned: HashMap<Currency, Decimal>,

    /// Owned devices, in purchase order
    pub devices: Vec<Device>,

    /// Referral metadata
    pub referral: ReferralState,

    /// Last balance-affecting activity
    pub last_activity: DateTime<Utc>,

    /// Lazy-creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a zero-balance account
    pub fn new(account_id: AccountId, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            balances: HashMap::new(),
            total_earned: HashMap::new(),
            devices: Vec::new(),
            referral: ReferralState::default(),
            last_activity: now,
            created_at: now,
        }
    }

    /// Current balance for a currency (zero if never touched)
    pub fn balance(&self, currency: Currency) -> Decimal {
        self.balances.get(&currency).copied().unwrap_or(Decimal::ZERO)
    }

    /// Lifetime credited amount for a currency
    pub fn earned(&self, currency: Currency) -> Decimal {
        self.total_earned
            .get(&currency)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Number of owned devices of a given kind
    pub fn device_count(&self, kind: &str) -> usize {
        self.devices.iter().filter(|d| d.kind == kind).count()
    }
}

/// Immutable ledger entry describing one balance mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID (UUIDv7 for time-ordering)
    pub tx_id: Uuid,

    /// Account whose balance changed
    pub account_id: AccountId,

    /// Currency affected
    pub currency: Currency,

    /// Signed amount applied
    pub delta: Decimal,

    /// Classification tag ("click", "mining:tick", "case:bronze", ...)
    pub reason: String,

    /// Balance immediately before the mutation
    pub balance_before: Decimal,

    /// Balance immediately after the mutation
    pub balance_after: Decimal,

    /// Commit timestamp
    pub timestamp: DateTime<Utc>,
}

/// Referral relationship record (unique per referred account)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralLink {
    /// Referred account
    pub referred: AccountId,

    /// Referring account
    pub referrer: AccountId,

    /// Link creation time
    pub linked_at: DateTime<Utc>,
}

/// Redeemable promotional code with a global use counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCode {
    /// Code string (storage key)
    pub code: String,

    /// Granted currency
    pub currency: Currency,

    /// Granted amount per redemption
    pub amount: Decimal,

    /// Remaining global uses
    pub uses_left: u32,

    /// Accounts that already redeemed this code
    pub redeemed_by: HashSet<i64>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Per-tick payout for one device kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceRate {
    /// Fixed amount credited per tick
    pub per_tick: Decimal,

    /// Currency the device produces
    pub currency: Currency,
}

/// Rate lookup handed to the accrual primitive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTable {
    /// Tick length in seconds
    pub tick_secs: u64,

    /// Maximum paid ticks per activation window
    pub cap_ticks: u64,

    /// Rates keyed by device kind
    pub rates: HashMap<String, DeviceRate>,
}

impl RateTable {
    /// Window cap in seconds
    pub fn cap_secs(&self) -> i64 {
        (self.tick_secs * self.cap_ticks) as i64
    }
}

/// Result of a "start mining" request
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StartOutcome {
    /// At least one device was (re)activated
    pub started: bool,

    /// When a device next becomes eligible for restart
    pub next_eligible_at: Option<DateTime<Utc>>,
}
