//! TigerStyle Constants
//!
//! Every limit in the core has a name, a unit suffix and a single home.

// =============================================================================
// Timeline
// =============================================================================

/// Maximum number of posts in a home timeline.
pub const TIMELINE_POSTS_COUNT_MAX: usize = 10;

/// Maximum number of concurrent timeline computations in a batch.
pub const TIMELINE_BATCH_CONCURRENCY_MAX: usize = 256;

/// Default number of concurrent timeline computations in a batch.
pub const TIMELINE_BATCH_CONCURRENCY_DEFAULT: usize = 8;

// =============================================================================
// Storage
// =============================================================================

/// First sequence number handed out by a fresh store.
pub const SEQUENCE_FIRST: i64 = 1;

/// Maximum `limit` accepted by `posts_by_author`.
pub const POSTS_BY_AUTHOR_LIMIT_MAX: usize = 1000;

/// Relation holding posts.
pub const POSTS_TABLE: &str = "posts";

/// Relation holding follow edges.
pub const FOLLOWS_TABLE: &str = "follows";

/// Columns the posts relation must declare.
pub const POSTS_COLUMNS: &[&str] = &["seq", "author_id", "text"];

/// Columns the follows relation must declare.
pub const FOLLOWS_COLUMNS: &[&str] = &["follower_id", "followee_id"];

/// Maximum number of statements in a schema script.
pub const SCHEMA_STATEMENTS_COUNT_MAX: usize = 256;

/// Connections in the SQLite pool.
///
/// Every connection to `sqlite::memory:` opens a private database, so the
/// pool must never hold more than one.
pub const SQLITE_POOL_CONNECTIONS_MAX: u32 = 1;

// =============================================================================
// DST
// =============================================================================

/// Environment variable that overrides the simulation seed.
pub const DST_SEED_ENV: &str = "DST_SEED";

/// Probability bounds for fault injection.
pub const DST_FAULT_PROBABILITY_MIN: f64 = 0.0;

/// Upper bound for fault injection probability.
pub const DST_FAULT_PROBABILITY_MAX: f64 = 1.0;
