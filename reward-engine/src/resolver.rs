//! Container opening and promotional-key redemption
//!
//! Both flows share the debit-then-credit shape: all preconditions are
//! checked before any debit, and a failure after a successful debit is
//! compensated with a refund before the error surfaces.

use crate::{ContainerCatalog, Error, Result, WeightedTable};
use ledger_store::{AccountId, Currency, Ledger};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Result of opening one container
#[derive(Debug, Clone)]
pub struct ContainerOutcome {
    /// Container that was opened
    pub container_id: String,

    /// Granted currency
    pub currency: Currency,

    /// Granted amount
    pub amount: Decimal,

    /// Rarity label of the selected entry
    pub rarity: String,
}

/// Result of redeeming a promotional key
#[derive(Debug, Clone, Copy)]
pub struct KeyGrant {
    /// Granted currency
    pub currency: Currency,

    /// Granted amount
    pub amount: Decimal,
}

/// Resolves weighted-random rewards against the ledger
#[derive(Clone)]
pub struct RewardResolver {
    ledger: Ledger,
    catalog: Arc<ContainerCatalog>,
}

impl RewardResolver {
    /// Create a resolver backed by the given ledger and catalog
    pub fn new(ledger: Ledger, catalog: Arc<ContainerCatalog>) -> Self {
        Self { ledger, catalog }
    }

    /// Open one container: debit the price, resolve exactly one weighted
    /// outcome, credit it, and report it.
    pub async fn open_container(
        &self,
        account_id: AccountId,
        container_id: &str,
    ) -> Result<ContainerOutcome> {
        let mut rng = StdRng::from_entropy();
        self.open_container_with_rng(account_id, container_id, &mut rng)
            .await
    }

    /// Deterministic variant for tests and replayable draws
    pub async fn open_container_seeded(
        &self,
        account_id: AccountId,
        container_id: &str,
        seed: u64,
    ) -> Result<ContainerOutcome> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.open_container_with_rng(account_id, container_id, &mut rng)
            .await
    }

    async fn open_container_with_rng(
        &self,
        account_id: AccountId,
        container_id: &str,
        rng: &mut StdRng,
    ) -> Result<ContainerOutcome> {
        let spec = self
            .catalog
            .get(container_id)
            .ok_or_else(|| Error::UnknownContainer(container_id.to_string()))?;

        // Validate the table before touching any balance
        let table = WeightedTable::new(
            spec.entries
                .iter()
                .enumerate()
                .map(|(i, entry)| (i, entry.weight))
                .collect(),
        )
        .ok_or_else(|| Error::EmptyTable(spec.id.clone()))?;

        // Debit first; no outcome is selected on failure
        self.ledger
            .adjust_balance(
                account_id,
                spec.currency,
                -spec.price,
                &format!("case:{}:open", spec.id),
            )
            .await?;

        let entry = &spec.entries[*table.pick(rng)];
        let amount = if entry.min >= entry.max {
            entry.min
        } else {
            rng.gen_range(entry.min..=entry.max)
        };
        let amount = Decimal::from(amount);

        let credit = self
            .ledger
            .adjust_balance(
                account_id,
                entry.currency,
                amount,
                &format!("case:{}:{}", spec.id, entry.rarity),
            )
            .await;

        match credit {
            Ok(_) => {
                tracing::info!(
                    account = %account_id,
                    container = %spec.id,
                    rarity = %entry.rarity,
                    %amount,
                    "container opened"
                );
                Ok(ContainerOutcome {
                    container_id: spec.id.clone(),
                    currency: entry.currency,
                    amount,
                    rarity: entry.rarity.clone(),
                })
            }
            Err(e) => {
                // Debit landed but the grant did not: refund before surfacing
                if let Err(refund_err) = self
                    .ledger
                    .adjust_balance(
                        account_id,
                        spec.currency,
                        spec.price,
                        &format!("case:{}:refund", spec.id),
                    )
                    .await
                {
                    tracing::error!(
                        account = %account_id,
                        container = %spec.id,
                        "refund after failed grant also failed: {}",
                        refund_err
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Redeem a promotional key: one-time per account, bounded by the
    /// code's global use counter, all in one atomic ledger operation.
    pub async fn redeem_key(&self, code: &str, account_id: AccountId) -> Result<KeyGrant> {
        let (currency, amount) = self
            .ledger
            .redeem_code(code, account_id, &format!("promo:{}", code))
            .await?;

        tracing::info!(account = %account_id, code, %amount, "key redeemed");
        Ok(KeyGrant { currency, amount })
    }
}
