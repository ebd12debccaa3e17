//! DeterministicRng - Seeded randomness for simulation

use std::ops::RangeInclusive;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A seeded RNG. Same seed, same sequence, on every platform.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    inner: ChaCha8Rng,
}

impl DeterministicRng {
    /// Create from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Derive an independent stream, e.g. one for workload and one for faults.
    #[must_use]
    pub fn fork(&mut self) -> Self {
        Self::new(self.inner.gen())
    }

    /// True with probability `p`.
    ///
    /// # Panics
    /// Panics if `p` is outside `0.0..=1.0`.
    pub fn gen_bool(&mut self, p: f64) -> bool {
        assert!((0.0..=1.0).contains(&p), "probability {p} outside 0..=1");
        self.inner.gen_bool(p)
    }

    /// Uniform integer in `range`.
    pub fn gen_range(&mut self, range: RangeInclusive<i64>) -> i64 {
        self.inner.gen_range(range)
    }

    /// Uniform index below `len`.
    ///
    /// # Panics
    /// Panics if `len` is zero.
    pub fn gen_index(&mut self, len: usize) -> usize {
        assert!(len > 0, "cannot pick from empty range");
        self.inner.gen_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = DeterministicRng::new(7);
        let mut b = DeterministicRng::new(7);

        for _ in 0..100 {
            assert_eq!(a.gen_range(0..=1_000_000), b.gen_range(0..=1_000_000));
        }
    }

    #[test]
    fn test_fork_is_deterministic() {
        let mut a = DeterministicRng::new(7);
        let mut b = DeterministicRng::new(7);

        let mut fa = a.fork();
        let mut fb = b.fork();
        assert_eq!(fa.gen_index(1000), fb.gen_index(1000));
    }

    #[test]
    fn test_gen_bool_extremes() {
        let mut rng = DeterministicRng::new(1);
        assert!(!rng.gen_bool(0.0));
        assert!(rng.gen_bool(1.0));
    }
}
