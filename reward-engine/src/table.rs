//! Reusable weighted-random selection
//!
//! A cumulative-weight walk over an injected table of outcomes, so new
//! containers are pure configuration. Zero-weight entries carry zero
//! probability mass and are never selected.

use rand::Rng;

/// Weighted table over arbitrary outcome values
#[derive(Debug, Clone)]
pub struct WeightedTable<T> {
    entries: Vec<(T, u64)>,
    total_weight: u64,
}

impl<T> WeightedTable<T> {
    /// Build a table from `(outcome, weight)` pairs.
    ///
    /// Returns `None` when the total weight is zero (nothing selectable).
    pub fn new(entries: Vec<(T, u64)>) -> Option<Self> {
        let total_weight: u64 = entries.iter().map(|(_, w)| *w).sum();
        if total_weight == 0 {
            return None;
        }
        Some(Self {
            entries,
            total_weight,
        })
    }

    /// Total probability mass
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Draw one outcome: uniform value in `[0, total_weight)`, then walk
    /// entries accumulating weight until the draw is covered.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        let draw = rng.gen_range(0..self.total_weight);
        let mut cumulative = 0u64;
        for (outcome, weight) in &self.entries {
            cumulative += weight;
            if draw < cumulative {
                return outcome;
            }
        }
        // Unreachable: cumulative ends at total_weight and draw < total_weight
        let (outcome, _) = self
            .entries
            .last()
            .expect("non-empty by construction");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_zero_total_weight_rejected() {
        assert!(WeightedTable::new(vec![("a", 0u64), ("b", 0u64)]).is_none());
        assert!(WeightedTable::<&str>::new(vec![]).is_none());
    }

    #[test]
    fn test_zero_weight_entry_never_selected() {
        let table = WeightedTable::new(vec![("never", 0u64), ("always", 1u64)]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            assert_eq!(*table.pick(&mut rng), "always");
        }
    }

    #[test]
    fn test_empirical_distribution_70_30() {
        let table = WeightedTable::new(vec![("coins", 70u64), ("stars", 30u64)]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let draws = 100_000u32;
        let mut coins = 0u32;
        for _ in 0..draws {
            if *table.pick(&mut rng) == "coins" {
                coins += 1;
            }
        }

        let ratio = coins as f64 / draws as f64;
        assert!(
            (ratio - 0.70).abs() < 0.01,
            "coins ratio {} too far from 0.70",
            ratio
        );
    }

    #[test]
    fn test_single_entry_always_wins() {
        let table = WeightedTable::new(vec![("only", 5u64)]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(*table.pick(&mut rng), "only");
    }
}
