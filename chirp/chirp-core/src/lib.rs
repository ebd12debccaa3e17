//! Chirp Core - Timeline Storage with DST
//!
//! TigerStyle storage and fan-out-on-read timeline engine for a minimal
//! social graph: posts, directed follow edges, and "the ten most recent
//! posts by everyone I follow".
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Chirp Core                     │
//! ├─────────────────────────────────────────────┤
//! │  TimelineEngine         │ bounded k-way merge│
//! ├─────────────────────────────────────────────┤
//! │  StorageBackend trait   │ memory / sqlite    │
//! │  Schema                 │ DDL script         │
//! │  Post, Follow           │ immutable records  │
//! ├─────────────────────────────────────────────┤
//! │  DST Framework          │ Fault injection    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! A store is created from a schema script, populated by ingestion, then
//! only read. Ingestion must finish before timelines are computed.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use chirp_core::{MemoryBackend, StorageBackend, TimelineEngine, DEFAULT_SCHEMA};
//!
//! # tokio_test::block_on(async {
//! let store = MemoryBackend::initialize(DEFAULT_SCHEMA).await.unwrap();
//! store.insert_follow(1, 2).await.unwrap();
//! store.insert_follow(1, 3).await.unwrap();
//! store.insert_post(2, "hello").await.unwrap();
//! store.insert_post(3, "world").await.unwrap();
//! store.insert_post(2, "again").await.unwrap();
//!
//! let engine = TimelineEngine::new(Arc::new(store));
//! let texts: Vec<String> = engine
//!     .retrieve_timeline(1)
//!     .await
//!     .unwrap()
//!     .into_iter()
//!     .map(|p| p.text)
//!     .collect();
//! assert_eq!(texts, ["again", "world", "hello"]);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
pub mod dst;
pub mod storage;
pub mod timeline;

// Re-export common types
pub use constants::*;
pub use dst::{
    DeterministicRng, FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType, FaultyBackend,
    SimConfig, Workload, WorkloadConfig,
};
pub use storage::{
    Follow, MemoryBackend, Post, Schema, SchemaError, Sequence, StorageBackend, StorageError,
    StorageResult, UserId, DEFAULT_SCHEMA,
};
pub use timeline::{merge_recent, TimelineEngine, UserTimeline};

#[cfg(feature = "sqlite")]
pub use storage::SqliteBackend;
