//! Chirp - Timeline benchmark driver
//!
//! Populates a timeline store from delimited record files, then computes
//! the home timeline of every follower and reports throughput.
//!
//! Features:
//! - Post and follow ingestion that survives malformed records
//! - Memory and SQLite backends behind one trait
//! - Seeded simulation with fault injection

pub mod ingest;
pub mod pipeline;
pub mod report;
pub mod simulate;

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Application name
pub const APP_NAME: &str = "chirp";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Users in a generated corpus
pub const SIMULATION_USERS_DEFAULT: usize = 100;

/// Posts in a generated corpus
pub const SIMULATION_POSTS_DEFAULT: usize = 10_000;

/// Follow edges in a generated corpus
pub const SIMULATION_FOLLOWS_DEFAULT: usize = 2_000;

/// Per-insert failure probability during simulation
pub const SIMULATION_FAULT_RATE_DEFAULT: f64 = 0.0;
