//! SimConfig - Simulation seed handling

use crate::constants::DST_SEED_ENV;

/// Configuration for a deterministic simulation run.
///
/// TigerStyle: Every run has a seed, and the seed is always logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    seed: u64,
}

impl SimConfig {
    /// Use an explicit seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed from `DST_SEED` if set and valid, otherwise a random one.
    #[must_use]
    pub fn from_env_or_random() -> Self {
        let seed = std::env::var(DST_SEED_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or_else(rand::random);

        tracing::info!(seed, "DST seed (replay with {}={})", DST_SEED_ENV, seed);
        Self { seed }
    }

    /// The seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}
