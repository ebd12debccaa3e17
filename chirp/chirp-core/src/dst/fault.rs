//! Fault Injection
//!
//! TigerStyle: Faults are data. Each one has a type, a probability and a
//! counter, and all draws come from one seeded RNG.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::constants::{DST_FAULT_PROBABILITY_MAX, DST_FAULT_PROBABILITY_MIN};

use super::rng::DeterministicRng;

/// Where a fault can strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultType {
    /// `insert_post` fails
    PostWrite,
    /// `insert_follow` fails
    FollowWrite,
    /// Any read fails
    Read,
}

impl FaultType {
    /// Operation name carried in the injected error.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::PostWrite => "insert_post",
            Self::FollowWrite => "insert_follow",
            Self::Read => "read",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::PostWrite => 0,
            Self::FollowWrite => 1,
            Self::Read => 2,
        }
    }
}

/// One fault and its probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultConfig {
    /// Fault type
    pub fault_type: FaultType,
    /// Chance per operation
    pub probability: f64,
}

impl FaultConfig {
    /// Create a fault config.
    ///
    /// # Panics
    /// Panics if `probability` is outside `0.0..=1.0`.
    #[must_use]
    pub fn new(fault_type: FaultType, probability: f64) -> Self {
        assert!(
            (DST_FAULT_PROBABILITY_MIN..=DST_FAULT_PROBABILITY_MAX).contains(&probability),
            "fault probability {probability} outside {DST_FAULT_PROBABILITY_MIN}..={DST_FAULT_PROBABILITY_MAX}"
        );
        Self {
            fault_type,
            probability,
        }
    }
}

/// Decides, deterministically, whether an operation fails.
#[derive(Debug)]
pub struct FaultInjector {
    rng: Mutex<DeterministicRng>,
    faults: Vec<FaultConfig>,
    injected: [AtomicU64; 3],
}

impl FaultInjector {
    /// Injector that never fails anything.
    #[must_use]
    pub fn disabled() -> Self {
        FaultInjectorBuilder::new(DeterministicRng::new(0)).build()
    }

    /// Roll for `fault_type`. Counts the fault when it fires.
    pub fn should_fail(&self, fault_type: FaultType) -> bool {
        let Some(config) = self.faults.iter().find(|f| f.fault_type == fault_type) else {
            return false;
        };

        let fire = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_bool(config.probability);
        if fire {
            self.injected[fault_type.index()].fetch_add(1, Ordering::Relaxed);
        }
        fire
    }

    /// Faults of this type injected so far.
    #[must_use]
    pub fn injected(&self, fault_type: FaultType) -> u64 {
        self.injected[fault_type.index()].load(Ordering::Relaxed)
    }

    /// Faults injected so far, all types.
    #[must_use]
    pub fn injected_total(&self) -> u64 {
        self.injected
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }
}

/// Builder for [`FaultInjector`].
#[derive(Debug)]
pub struct FaultInjectorBuilder {
    rng: DeterministicRng,
    faults: Vec<FaultConfig>,
}

impl FaultInjectorBuilder {
    /// Start with a seeded RNG and no faults.
    #[must_use]
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rng,
            faults: Vec::new(),
        }
    }

    /// Add a fault. A later config for the same type replaces the earlier one.
    #[must_use]
    pub fn with_fault(mut self, config: FaultConfig) -> Self {
        self.faults.retain(|f| f.fault_type != config.fault_type);
        self.faults.push(config);
        self
    }

    /// Build the injector.
    #[must_use]
    pub fn build(self) -> FaultInjector {
        FaultInjector {
            rng: Mutex::new(self.rng),
            faults: self.faults,
            injected: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
        }
    }
}
