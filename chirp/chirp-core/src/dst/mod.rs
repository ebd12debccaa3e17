//! DST - Deterministic Simulation Testing
//!
//! TigerBeetle/FoundationDB-style simulation support for the storage layer.
//!
//! # Philosophy
//!
//! > "If you're not testing with fault injection, you're not testing."
//!
//! # Usage
//!
//! ```rust
//! use chirp_core::dst::{DeterministicRng, FaultConfig, FaultInjectorBuilder, FaultType, FaultyBackend, SimConfig};
//! use chirp_core::storage::{MemoryBackend, StorageBackend, DEFAULT_SCHEMA};
//!
//! # tokio_test::block_on(async {
//! let config = SimConfig::with_seed(42);
//! let injector = FaultInjectorBuilder::new(DeterministicRng::new(config.seed()))
//!     .with_fault(FaultConfig::new(FaultType::PostWrite, 0.1))
//!     .build();
//! let store = FaultyBackend::new(MemoryBackend::initialize(DEFAULT_SCHEMA).await.unwrap(), injector);
//!
//! // Some inserts fail; none of them corrupt the store.
//! for i in 0..100 {
//!     let _ = store.insert_post(1, &format!("post {i}")).await;
//! }
//! let stored = store.post_count().await.unwrap() as u64;
//! assert_eq!(stored + store.injector().injected(FaultType::PostWrite), 100);
//! # });
//! ```
//!
//! Run with explicit seed for reproducibility:
//! ```bash
//! DST_SEED=12345 cargo test
//! ```

mod backend;
mod config;
mod fault;
mod rng;
mod workload;

pub use backend::FaultyBackend;
pub use config::SimConfig;
pub use fault::{FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType};
pub use rng::DeterministicRng;
pub use workload::{Workload, WorkloadConfig};
