//! Container ("case") catalog
//!
//! Outcome tables are configuration data consumed by the resolver; the
//! engine never hard-codes a probability table.

use ledger_store::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One possible outcome inside a container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerEntry {
    /// Currency granted
    pub currency: Currency,

    /// Minimum granted amount (inclusive)
    pub min: u64,

    /// Maximum granted amount (inclusive)
    pub max: u64,

    /// Relative weight (zero = never selected)
    pub weight: u64,

    /// Display rarity label ("common", "rare", ...)
    pub rarity: String,
}

/// One purchasable container definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Catalog key
    pub id: String,

    /// Display name
    pub name: String,

    /// Opening price
    pub price: Decimal,

    /// Currency the price is charged in
    pub currency: Currency,

    /// Weighted outcome table
    pub entries: Vec<ContainerEntry>,
}

/// Static catalog of containers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerCatalog {
    /// All known containers
    pub containers: Vec<ContainerSpec>,
}

impl Default for ContainerCatalog {
    fn default() -> Self {
        Self {
            containers: vec![
                ContainerSpec {
                    id: "bronze".to_string(),
                    name: "Bronze Case".to_string(),
                    price: Decimal::from(50u64),
                    currency: Currency::Coins,
                    entries: vec![
                        ContainerEntry {
                            currency: Currency::Coins,
                            min: 10,
                            max: 60,
                            weight: 70,
                            rarity: "common".to_string(),
                        },
                        ContainerEntry {
                            currency: Currency::Coins,
                            min: 60,
                            max: 150,
                            weight: 25,
                            rarity: "rare".to_string(),
                        },
                        ContainerEntry {
                            currency: Currency::Stars,
                            min: 1,
                            max: 3,
                            weight: 5,
                            rarity: "epic".to_string(),
                        },
                    ],
                },
                ContainerSpec {
                    id: "gold".to_string(),
                    name: "Gold Case".to_string(),
                    price: Decimal::from(250u64),
                    currency: Currency::Coins,
                    entries: vec![
                        ContainerEntry {
                            currency: Currency::Coins,
                            min: 100,
                            max: 400,
                            weight: 60,
                            rarity: "common".to_string(),
                        },
                        ContainerEntry {
                            currency: Currency::Stars,
                            min: 2,
                            max: 8,
                            weight: 35,
                            rarity: "rare".to_string(),
                        },
                        ContainerEntry {
                            currency: Currency::Stars,
                            min: 10,
                            max: 25,
                            weight: 5,
                            rarity: "legendary".to_string(),
                        },
                    ],
                },
            ],
        }
    }
}

impl ContainerCatalog {
    /// Look up one container
    pub fn get(&self, id: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|spec| spec.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = ContainerCatalog::default();
        assert!(catalog.get("bronze").is_some());
        assert!(catalog.get("gold").is_some());
        assert!(catalog.get("mystery").is_none());
    }

    #[test]
    fn test_entries_have_probability_mass() {
        let catalog = ContainerCatalog::default();
        for spec in &catalog.containers {
            let total: u64 = spec.entries.iter().map(|e| e.weight).sum();
            assert!(total > 0, "container {} has zero mass", spec.id);
        }
    }
}
