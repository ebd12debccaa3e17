//! Storage - Backend Trait and Implementations
//!
//! TigerStyle: Abstract storage with simulation-first testing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    StorageBackend Trait                      │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                     ↑                     ↑
//!          │                     │                     │
//! ┌────────┴────────┐   ┌────────┴────────┐   ┌────────┴────────┐
//! │  MemoryBackend  │   │  SqliteBackend  │   │  FaultyBackend  │
//! │ (indexed maps)  │   │  (sqlx, SQL)    │   │  (dst wrapper)  │
//! └─────────────────┘   └─────────────────┘   └─────────────────┘
//! ```
//!
//! Both real backends are initialized from the same schema script, parsed and
//! validated by [`Schema`].

mod backend;
mod entity;
mod error;
mod memory;
mod schema;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use backend::StorageBackend;
pub use entity::{Follow, Post, Sequence, UserId};
pub use error::{SchemaError, StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use schema::{ColumnDef, IndexColumn, IndexDef, Schema, TableDef, DEFAULT_SCHEMA};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
