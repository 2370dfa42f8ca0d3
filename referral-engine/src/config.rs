//! Referral program configuration

use ledger_store::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Bonus amounts paid by the referral program.
///
/// A zero amount disables that bonus without touching any code path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralConfig {
    /// Currency every referral bonus is paid in
    pub currency: Currency,

    /// One-time credit to the referred account when the link lands
    pub signup_bonus: Decimal,

    /// One-time credit to the referrer when the link lands
    pub referrer_bonus: Decimal,

    /// Credit to the referrer per device purchase by a referred account
    pub purchase_bonus: Decimal,

    /// Credit to the referrer per key redemption by a referred account
    pub redemption_bonus: Decimal,

    /// Credit to the referrer per container opening by a referred account
    pub collection_bonus: Decimal,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            currency: Currency::Coins,
            signup_bonus: Decimal::from(25u64),
            referrer_bonus: Decimal::from(50u64),
            purchase_bonus: Decimal::from(10u64),
            redemption_bonus: Decimal::from(5u64),
            collection_bonus: Decimal::from(2u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_pay_in_coins() {
        let config = ReferralConfig::default();
        assert_eq!(config.currency, Currency::Coins);
        assert!(config.signup_bonus > Decimal::ZERO);
        assert!(config.referrer_bonus > config.signup_bonus);
    }
}
