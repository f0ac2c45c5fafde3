//! Deterministic random number generation for synthetic datasets.
//!
//! RULE: the generator never calls any platform RNG.
//! All randomness flows through DatasetRng instances derived
//! from a single master seed.
//!
//! Each dataset gets its own stream, seeded from
//! (master_seed XOR slot_index * golden-ratio constant). Adding a new
//! dataset never changes the streams of existing ones.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single dataset.
pub struct DatasetRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl DatasetRng {
    pub fn new(master_seed: u64, slot_index: u64) -> Self {
        let derived_seed = master_seed ^ (slot_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
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

    /// Roll an integer in [lo, hi], both ends inclusive.
    pub fn range_inclusive(&mut self, lo: u64, hi: u64) -> u64 {
        assert!(lo <= hi, "empty range {lo}..={hi}");
        lo + self.next_u64_below(hi - lo + 1)
    }

    /// Fair coin.
    pub fn coin(&mut self) -> bool {
        self.next_f64() < 0.5
    }

    /// Uniform pick from a non-empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        let idx = self.next_u64_below(items.len() as u64) as usize;
        &items[idx]
    }
}

/// All dataset RNGs for a single generation run, indexed by stable slot.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn for_dataset(&self, slot: DatasetSlot) -> DatasetRng {
        DatasetRng::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable dataset slot assignments.
/// NEVER reorder or remove entries; only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum DatasetSlot {
    Merchants = 0,
    Tickets = 1,
    ErrorMetrics = 2,
}

impl DatasetSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Merchants => "merchants",
            Self::Tickets => "tickets",
            Self::ErrorMetrics => "error_metrics",
        }
    }
}
