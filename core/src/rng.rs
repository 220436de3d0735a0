//! Deterministic random number generation for synthetic datasets.
//!
//! RULE: The generator never touches a platform RNG.
//! Each generated table draws from its own stream, seeded from
//! (master_seed XOR table_index * golden ratio), so adding a table never
//! shifts the values of the others.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single generated table.
pub struct TableRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl TableRng {
    pub fn new(master_seed: u64, table_index: u64) -> Self {
        let derived_seed = master_seed ^ (table_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Draw from N(mean, std) by Box-Muller.
    pub fn normal(&mut self, mean: f64, std: f64) -> f64 {
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std * z
    }

    /// Pick an index with probability proportional to its weight.
    /// Returns None for an empty or all-zero weight list.
    pub fn pick_weighted(&mut self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
        if total <= 0.0 {
            return None;
        }
        let mut roll = self.next_f64() * total;
        let mut last = None;
        for (i, w) in weights.iter().enumerate() {
            if *w <= 0.0 {
                continue;
            }
            if roll < *w {
                return Some(i);
            }
            roll -= w;
            last = Some(i);
        }
        last
    }
}

/// All table RNGs for one generated dataset, indexed by stable slot.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn for_table(&self, slot: TableSlot) -> TableRng {
        TableRng::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable slot assignments.
/// NEVER reorder or remove entries; only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum TableSlot {
    Users = 0,
    Calls = 1,
    Messages = 2,
    Internet = 3,
}

impl TableSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Calls => "calls",
            Self::Messages => "messages",
            Self::Internet => "internet",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let bank_a = RngBank::new(12345);
        let bank_b = RngBank::new(12345);
        let mut a = bank_a.for_table(TableSlot::Calls);
        let mut b = bank_b.for_table(TableSlot::Calls);
        for _ in 0..100 {
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
    }

    #[test]
    fn tables_get_independent_streams() {
        let bank = RngBank::new(12345);
        let mut calls = bank.for_table(TableSlot::Calls);
        let mut messages = bank.for_table(TableSlot::Messages);
        let same = (0..20).all(|_| calls.next_f64() == messages.next_f64());
        assert!(!same, "distinct slots should not share a stream");
    }

    #[test]
    fn normal_draws_center_on_mean() {
        let mut rng = RngBank::new(7).for_table(TableSlot::Users);
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| rng.normal(100.0, 15.0)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        assert!((mean - 100.0).abs() < 1.0, "mean {mean} too far from 100");
    }

    #[test]
    fn weighted_pick_respects_zero_weights() {
        let mut rng = RngBank::new(3).for_table(TableSlot::Users);
        for _ in 0..200 {
            assert_eq!(rng.pick_weighted(&[0.0, 1.0, 0.0]), Some(1));
        }
        assert_eq!(rng.pick_weighted(&[]), None);
        assert_eq!(rng.pick_weighted(&[0.0, 0.0]), None);
    }
}
