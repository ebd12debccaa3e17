//! MemoryBackend - In-memory indexed maps
//!
//! TigerStyle: Explicit indexes, one lock, sequence assigned under the lock.
//!
//! # Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       MemoryBackend                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  posts_by_author: author_id -> Vec<Post> (ascending seq)     │
//! │  followees:       follower_id -> BTreeSet<followee_id>       │
//! │  follow_count:    raw edge count (duplicates included)       │
//! │  next_sequence:   owned counter                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Posts of one author are appended in sequence order, so reading an author's
//! recent posts is a reverse walk that stops after `limit` entries.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::constants::{POSTS_BY_AUTHOR_LIMIT_MAX, SEQUENCE_FIRST};

use super::backend::StorageBackend;
use super::entity::{Post, Sequence, UserId};
use super::error::{SchemaError, StorageError, StorageResult};
use super::schema::Schema;

#[derive(Debug)]
struct Tables {
    posts_by_author: HashMap<UserId, Vec<Post>>,
    followees: BTreeMap<UserId, BTreeSet<UserId>>,
    post_count: usize,
    follow_count: usize,
    next_sequence: Sequence,
}

impl Tables {
    fn new() -> Self {
        Self {
            posts_by_author: HashMap::new(),
            followees: BTreeMap::new(),
            post_count: 0,
            follow_count: 0,
            next_sequence: SEQUENCE_FIRST,
        }
    }
}

/// In-memory storage backend.
#[derive(Debug)]
pub struct MemoryBackend {
    schema: Schema,
    tables: RwLock<Tables>,
}

impl MemoryBackend {
    /// The schema this store was initialized from.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn initialize(schema_source: &str) -> Result<Self, SchemaError> {
        let schema = Schema::parse(schema_source)?;

        for (table, column) in [("follows", "follower_id"), ("posts", "author_id")] {
            if !schema.has_index_leading_with(table, column) {
                tracing::debug!(
                    table,
                    column,
                    "schema declares no index; memory backend indexes it anyway"
                );
            }
        }

        tracing::info!(
            statements = schema.statements().len(),
            "memory store initialized"
        );

        Ok(Self {
            schema,
            tables: RwLock::new(Tables::new()),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert_post(&self, author_id: UserId, text: &str) -> StorageResult<Sequence> {
        let mut tables = self.tables.write().await;

        let sequence = tables.next_sequence;
        tables.next_sequence = sequence
            .checked_add(1)
            .ok_or_else(|| StorageError::write("sequence counter exhausted"))?;

        tables
            .posts_by_author
            .entry(author_id)
            .or_default()
            .push(Post::new(author_id, text, sequence));
        tables.post_count += 1;

        // Postcondition
        assert!(
            tables.next_sequence > sequence,
            "sequence counter must advance"
        );

        tracing::trace!(author_id, sequence, "post inserted");
        Ok(sequence)
    }

    async fn insert_follow(&self, follower_id: UserId, followee_id: UserId) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .followees
            .entry(follower_id)
            .or_default()
            .insert(followee_id);
        tables.follow_count += 1;

        tracing::trace!(follower_id, followee_id, "follow inserted");
        Ok(())
    }

    async fn all_follower_ids(&self) -> StorageResult<Vec<UserId>> {
        let tables = self.tables.read().await;
        Ok(tables.followees.keys().copied().collect())
    }

    async fn followee_ids(&self, follower_id: UserId) -> StorageResult<Vec<UserId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .followees
            .get(&follower_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn posts_by_author(&self, author_id: UserId, limit: usize) -> StorageResult<Vec<Post>> {
        // Precondition
        assert!(
            limit <= POSTS_BY_AUTHOR_LIMIT_MAX,
            "limit {limit} exceeds max {POSTS_BY_AUTHOR_LIMIT_MAX}"
        );

        let tables = self.tables.read().await;
        let posts: Vec<Post> = tables
            .posts_by_author
            .get(&author_id)
            .map(|posts| posts.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default();

        // Postcondition
        assert!(posts.len() <= limit, "result exceeds limit");

        Ok(posts)
    }

    async fn post_count(&self) -> StorageResult<usize> {
        Ok(self.tables.read().await.post_count)
    }

    async fn follow_count(&self) -> StorageResult<usize> {
        Ok(self.tables.read().await.follow_count)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::DEFAULT_SCHEMA;

    async fn backend() -> MemoryBackend {
        MemoryBackend::initialize(DEFAULT_SCHEMA).await.unwrap()
    }

    #[tokio::test]
    async fn test_initialize_empty() {
        let store = backend().await;

        assert_eq!(store.name(), "memory");
        assert_eq!(store.post_count().await.unwrap(), 0);
        assert_eq!(store.follow_count().await.unwrap(), 0);
        assert!(store.all_follower_ids().await.unwrap().is_empty());
        assert!(store.schema().table("posts").is_some());
    }

    #[tokio::test]
    async fn test_initialize_rejects_bad_schema() {
        let err = MemoryBackend::initialize("CREATE TABLE posts (seq INTEGER);")
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingColumn { .. }));
    }

    #[tokio::test]
    async fn test_initialize_rejects_index_before_table() {
        let err = MemoryBackend::initialize(
            "CREATE INDEX idx_early ON posts (author_id);
             CREATE TABLE posts (seq INTEGER PRIMARY KEY, author_id INTEGER, text TEXT);
             CREATE TABLE follows (follower_id INTEGER, followee_id INTEGER);",
        )
        .await
        .unwrap_err();
        assert_eq!(err, SchemaError::MissingTable("posts".to_string()));
    }

    #[tokio::test]
    async fn test_sequence_monotonic_from_first() {
        let store = backend().await;

        let a = store.insert_post(1, "a").await.unwrap();
        let b = store.insert_post(2, "b").await.unwrap();
        let c = store.insert_post(1, "c").await.unwrap();

        assert_eq!(a, SEQUENCE_FIRST);
        assert!(a < b && b < c);
    }

    #[tokio::test]
    async fn test_posts_by_author_most_recent_first() {
        let store = backend().await;
        for i in 0..5 {
            store.insert_post(9, &format!("post {i}")).await.unwrap();
            store.insert_post(8, "noise").await.unwrap();
        }

        let posts = store.posts_by_author(9, 10).await.unwrap();
        let texts: Vec<&str> = posts.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, ["post 4", "post 3", "post 2", "post 1", "post 0"]);
        assert!(posts.windows(2).all(|w| w[0].sequence > w[1].sequence));

        let bounded = store.posts_by_author(9, 2).await.unwrap();
        assert_eq!(bounded.len(), 2);
        assert_eq!(bounded[0].text, "post 4");

        assert!(store.posts_by_author(404, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_follows_stored_but_set_deduplicated() {
        let store = backend().await;
        store.insert_follow(1, 2).await.unwrap();
        store.insert_follow(1, 2).await.unwrap();
        store.insert_follow(1, 1).await.unwrap();
        store.insert_follow(3, 2).await.unwrap();

        assert_eq!(store.follow_count().await.unwrap(), 4);
        assert_eq!(store.followee_ids(1).await.unwrap(), vec![1, 2]);
        assert_eq!(store.all_follower_ids().await.unwrap(), vec![1, 3]);
        assert!(store.followee_ids(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_keep_sequences_unique() {
        let store = Arc::new(backend().await);

        let mut handles = Vec::new();
        for author in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    store.insert_post(author, &format!("{i}")).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.post_count().await.unwrap(), 400);
        for author in 0..8 {
            let posts = store.posts_by_author(author, 100).await.unwrap();
            assert_eq!(posts.len(), 50);
            assert!(posts.windows(2).all(|w| w[0].sequence > w[1].sequence));
            assert_eq!(posts[0].text, "49");
        }
    }

    #[tokio::test]
    #[should_panic(expected = "exceeds max")]
    async fn test_posts_by_author_limit_above_max() {
        let store = backend().await;
        let _ = store
            .posts_by_author(1, POSTS_BY_AUTHOR_LIMIT_MAX + 1)
            .await;
    }
}
