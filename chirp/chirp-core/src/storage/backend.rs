//! StorageBackend - Capability contract for the Storage Engine
//!
//! TigerStyle: One trait, interchangeable substrates. The timeline engine only
//! ever talks to this trait.

use async_trait::async_trait;

use super::entity::{Post, Sequence, UserId};
use super::error::{SchemaError, StorageResult};

/// Storage for posts and follow edges.
///
/// Every operation takes `&self`; implementations serialize sequence
/// assignment internally so concurrent writers cannot break recency order.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Establish an empty store from a schema script.
    ///
    /// # Errors
    /// `SchemaError` if the script cannot be parsed or applied. Fatal.
    async fn initialize(schema_source: &str) -> Result<Self, SchemaError>
    where
        Self: Sized;

    /// Short backend name for logs and reports.
    fn name(&self) -> &'static str;

    /// Append a post and return its sequence number.
    async fn insert_post(&self, author_id: UserId, text: &str) -> StorageResult<Sequence>;

    /// Append a follow edge. Duplicates and self-loops are stored as given.
    async fn insert_follow(&self, follower_id: UserId, followee_id: UserId) -> StorageResult<()>;

    /// Every distinct follower id, ascending.
    async fn all_follower_ids(&self) -> StorageResult<Vec<UserId>>;

    /// Distinct followees of `follower_id`, ascending.
    async fn followee_ids(&self, follower_id: UserId) -> StorageResult<Vec<UserId>>;

    /// Up to `limit` posts by `author_id`, most recent first.
    ///
    /// `limit` is bounded by `POSTS_BY_AUTHOR_LIMIT_MAX`. Timelines only ever
    /// need `TIMELINE_POSTS_COUNT_MAX` posts per author.
    ///
    /// # Panics
    /// Implementations panic if `limit` exceeds `POSTS_BY_AUTHOR_LIMIT_MAX`.
    async fn posts_by_author(&self, author_id: UserId, limit: usize) -> StorageResult<Vec<Post>>;

    /// Stored posts.
    async fn post_count(&self) -> StorageResult<usize>;

    /// Stored follow edges, duplicates included.
    async fn follow_count(&self) -> StorageResult<usize>;
}
