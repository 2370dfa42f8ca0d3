//! Referral linking and activity fanout
//!
//! Linking pays both one-time bonuses atomically inside the ledger.
//! Fanout is fire-on-activity: when a referred account spends, the
//! referrer gets a flat bonus. The chain is one level deep; the
//! referrer's own referrer sees nothing.

use crate::{ReferralConfig, Result};
use ledger_store::{AccountId, Ledger};
use rust_decimal::Decimal;

/// Paid activity performed by a referred account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    /// Device purchase in the shop
    Purchase,

    /// Promotional key redemption
    Redemption,

    /// Container opening
    Collection,
}

impl ActivityKind {
    fn reason_tag(self) -> &'static str {
        match self {
            ActivityKind::Purchase => "purchase",
            ActivityKind::Redemption => "redemption",
            ActivityKind::Collection => "collection",
        }
    }
}

/// Referral program bound to a ledger
#[derive(Clone)]
pub struct ReferralProgram {
    ledger: Ledger,
    config: ReferralConfig,
}

impl ReferralProgram {
    /// Create a program with the given bonus schedule
    pub fn new(ledger: Ledger, config: ReferralConfig) -> Self {
        Self { ledger, config }
    }

    /// Bonus schedule in effect
    pub fn config(&self) -> &ReferralConfig {
        &self.config
    }

    /// Link `referred` under `referrer` and pay both one-time bonuses.
    ///
    /// Returns `true` when the link landed. Self-referrals, repeat links
    /// and links to unknown referrers return `false` without paying.
    pub async fn link(&self, referred: AccountId, referrer: AccountId) -> Result<bool> {
        let linked = self
            .ledger
            .link_referral(
                referred,
                referrer,
                (self.config.currency, self.config.signup_bonus),
                (self.config.currency, self.config.referrer_bonus),
            )
            .await?;

        if linked {
            tracing::info!(%referred, %referrer, "referral link established");
        }
        Ok(linked)
    }

    /// Pay the referrer of `account_id` the flat bonus for one activity.
    ///
    /// Returns the amount paid, or zero when the account has no referrer
    /// or the bonus for this activity is disabled.
    pub async fn reward_activity(
        &self,
        account_id: AccountId,
        kind: ActivityKind,
    ) -> Result<Decimal> {
        let bonus = match kind {
            ActivityKind::Purchase => self.config.purchase_bonus,
            ActivityKind::Redemption => self.config.redemption_bonus,
            ActivityKind::Collection => self.config.collection_bonus,
        };
        if bonus.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let referrer = match self.ledger.referrer_of(account_id).await? {
            Some(referrer) => referrer,
            None => return Ok(Decimal::ZERO),
        };

        self.ledger
            .adjust_balance(
                referrer,
                self.config.currency,
                bonus,
                &format!("referral:{}", kind.reason_tag()),
            )
            .await?;

        tracing::debug!(
            %referrer,
            referred = %account_id,
            activity = kind.reason_tag(),
            %bonus,
            "referral activity bonus paid"
        );
        Ok(bonus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_store::{Config, Currency};

    async fn test_program() -> (ReferralProgram, Ledger, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let ledger = Ledger::open(config).await.unwrap();
        let program = ReferralProgram::new(ledger.clone(), ReferralConfig::default());
        (program, ledger, temp_dir)
    }

    #[tokio::test]
    async fn test_link_pays_both_bonuses_once() {
        let (program, ledger, _temp) = test_program().await;
        let referrer = AccountId::new(1);
        let referred = AccountId::new(2);

        ledger
            .adjust_balance(referrer, Currency::Coins, Decimal::ONE, "seed")
            .await
            .unwrap();

        assert!(program.link(referred, referrer).await.unwrap());

        let schedule = program.config().clone();
        let referred_coins = ledger.get_balance(referred).await.unwrap()[&Currency::Coins];
        let referrer_coins = ledger.get_balance(referrer).await.unwrap()[&Currency::Coins];
        assert_eq!(referred_coins, schedule.signup_bonus);
        assert_eq!(referrer_coins, Decimal::ONE + schedule.referrer_bonus);

        // Repeat link is a no-op
        assert!(!program.link(referred, referrer).await.unwrap());
        let after = ledger.get_balance(referred).await.unwrap()[&Currency::Coins];
        assert_eq!(after, schedule.signup_bonus);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_self_link_rejected() {
        let (program, ledger, _temp) = test_program().await;
        let id = AccountId::new(1);
        assert!(!program.link(id, id).await.unwrap());
        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_link_to_unknown_referrer_rejected() {
        let (program, ledger, _temp) = test_program().await;
        assert!(!program
            .link(AccountId::new(2), AccountId::new(999))
            .await
            .unwrap());
        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_activity_bonus_reaches_referrer_only() {
        let (program, ledger, _temp) = test_program().await;
        let grandparent = AccountId::new(1);
        let referrer = AccountId::new(2);
        let referred = AccountId::new(3);

        ledger
            .adjust_balance(grandparent, Currency::Coins, Decimal::ONE, "seed")
            .await
            .unwrap();
        assert!(program.link(referrer, grandparent).await.unwrap());
        assert!(program.link(referred, referrer).await.unwrap());

        let before_grandparent = ledger.get_balance(grandparent).await.unwrap()[&Currency::Coins];
        let before_referrer = ledger.get_balance(referrer).await.unwrap()[&Currency::Coins];

        let paid = program
            .reward_activity(referred, ActivityKind::Purchase)
            .await
            .unwrap();
        assert_eq!(paid, program.config().purchase_bonus);

        let after_referrer = ledger.get_balance(referrer).await.unwrap()[&Currency::Coins];
        assert_eq!(after_referrer, before_referrer + paid);

        // One level deep: nothing propagates further up
        let after_grandparent = ledger.get_balance(grandparent).await.unwrap()[&Currency::Coins];
        assert_eq!(after_grandparent, before_grandparent);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_activity_without_referrer_pays_nothing() {
        let (program, ledger, _temp) = test_program().await;
        let lone = AccountId::new(7);

        ledger
            .adjust_balance(lone, Currency::Coins, Decimal::from(10u64), "seed")
            .await
            .unwrap();

        let paid = program
            .reward_activity(lone, ActivityKind::Collection)
            .await
            .unwrap();
        assert_eq!(paid, Decimal::ZERO);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_bonus_skips_ledger() {
        let (_, ledger, _temp) = test_program().await;
        let referrer = AccountId::new(1);
        let referred = AccountId::new(2);

        ledger
            .adjust_balance(referrer, Currency::Coins, Decimal::ONE, "seed")
            .await
            .unwrap();

        let mut config = ReferralConfig::default();
        config.collection_bonus = Decimal::ZERO;
        let program = ReferralProgram::new(ledger.clone(), config);

        assert!(program.link(referred, referrer).await.unwrap());
        let before = ledger.get_balance(referrer).await.unwrap()[&Currency::Coins];

        let paid = program
            .reward_activity(referred, ActivityKind::Collection)
            .await
            .unwrap();
        assert_eq!(paid, Decimal::ZERO);

        let after = ledger.get_balance(referrer).await.unwrap()[&Currency::Coins];
        assert_eq!(after, before);

        ledger.shutdown().await.unwrap();
    }
}
