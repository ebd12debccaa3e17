//! SqliteBackend - Relational storage
//!
//! TigerStyle: Real SQL engine, schema from the script, explicit sequence.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SqliteBackend                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pool: sqlx::SqlitePool over sqlite::memory: (1 connection)  │
//! │  Table: posts (seq, author_id, text)                         │
//! │  Table: follows (follower_id, followee_id)                   │
//! │  Index: B-tree on follows(follower_id), posts(author_id,seq) │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sequence is not an autoincrement column: the backend owns the counter
//! and holds its mutex across the insert, so a sequence is only consumed by a
//! row that was actually written.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tokio::sync::Mutex;

use crate::constants::{POSTS_BY_AUTHOR_LIMIT_MAX, SEQUENCE_FIRST, SQLITE_POOL_CONNECTIONS_MAX};

use super::backend::StorageBackend;
use super::entity::{Post, Sequence, UserId};
use super::error::{SchemaError, StorageError, StorageResult};
use super::schema::Schema;

/// In-memory SQLite URL. Each connection gets a private database.
const SQLITE_MEMORY_URL: &str = "sqlite::memory:";

// =============================================================================
// SqliteBackend
// =============================================================================

/// SQLite storage backend.
#[derive(Debug)]
pub struct SqliteBackend {
    pool: SqlitePool,
    next_sequence: Mutex<Sequence>,
}

impl SqliteBackend {
    /// Get the connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool. The in-memory database is dropped with it.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn open() -> Result<SqlitePool, SchemaError> {
        let options = SqliteConnectOptions::from_str(SQLITE_MEMORY_URL)
            .map_err(|e| SchemaError::Apply(format!("invalid sqlite url: {e}")))?;

        // The single connection must outlive idle/lifetime reaping, or the
        // database disappears with it.
        SqlitePoolOptions::new()
            .max_connections(SQLITE_POOL_CONNECTIONS_MAX)
            .min_connections(SQLITE_POOL_CONNECTIONS_MAX)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| SchemaError::Apply(format!("failed to open sqlite: {e}")))
    }

    async fn count(&self, sql: &str) -> StorageResult<usize> {
        let count: i64 = sqlx::query_scalar(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::read(format!("failed to count: {e}")))?;

        // Postcondition
        assert!(count >= 0, "count cannot be negative");

        usize::try_from(count).map_err(|e| StorageError::internal(e.to_string()))
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

/// Parse a database row into a Post.
fn row_to_post(row: &SqliteRow) -> StorageResult<Post> {
    let sequence: i64 = row
        .try_get("seq")
        .map_err(|e| StorageError::internal(e.to_string()))?;
    let author_id: i64 = row
        .try_get("author_id")
        .map_err(|e| StorageError::internal(e.to_string()))?;
    let text: String = row
        .try_get("text")
        .map_err(|e| StorageError::internal(e.to_string()))?;

    Ok(Post {
        author_id,
        text,
        sequence,
    })
}

// =============================================================================
// StorageBackend Implementation
// =============================================================================

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn initialize(schema_source: &str) -> Result<Self, SchemaError> {
        let schema = Schema::parse(schema_source)?;
        let pool = Self::open().await?;

        for (i, statement) in schema.statements().iter().enumerate() {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| SchemaError::Apply(format!("statement {}: {e}", i + 1)))?;
        }

        let backend = Self {
            pool,
            next_sequence: Mutex::new(SEQUENCE_FIRST),
        };

        // Postcondition: both relations exist and are empty
        let posts = backend
            .post_count()
            .await
            .map_err(|e| SchemaError::Apply(e.to_string()))?;
        let follows = backend
            .follow_count()
            .await
            .map_err(|e| SchemaError::Apply(e.to_string()))?;
        assert_eq!(posts + follows, 0, "fresh store must be empty");

        tracing::info!(
            statements = schema.statements().len(),
            "sqlite store initialized"
        );

        Ok(backend)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert_post(&self, author_id: UserId, text: &str) -> StorageResult<Sequence> {
        let mut next = self.next_sequence.lock().await;
        let sequence = *next;

        sqlx::query("INSERT INTO posts (seq, author_id, text) VALUES (?, ?, ?)")
            .bind(sequence)
            .bind(author_id)
            .bind(text)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::write(format!("failed to insert post: {e}")))?;

        *next = sequence
            .checked_add(1)
            .ok_or_else(|| StorageError::write("sequence counter exhausted"))?;

        tracing::trace!(author_id, sequence, "post inserted");
        Ok(sequence)
    }

    async fn insert_follow(&self, follower_id: UserId, followee_id: UserId) -> StorageResult<()> {
        sqlx::query("INSERT INTO follows (follower_id, followee_id) VALUES (?, ?)")
            .bind(follower_id)
            .bind(followee_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::write(format!("failed to insert follow: {e}")))?;

        tracing::trace!(follower_id, followee_id, "follow inserted");
        Ok(())
    }

    async fn all_follower_ids(&self) -> StorageResult<Vec<UserId>> {
        sqlx::query_scalar::<_, UserId>("SELECT DISTINCT follower_id FROM follows ORDER BY follower_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::read(format!("failed to list followers: {e}")))
    }

    async fn followee_ids(&self, follower_id: UserId) -> StorageResult<Vec<UserId>> {
        sqlx::query_scalar::<_, UserId>(
            r#"
            SELECT DISTINCT followee_id FROM follows
            WHERE follower_id = ?
            ORDER BY followee_id
            "#,
        )
        .bind(follower_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::read(format!("failed to list followees: {e}")))
    }

    async fn posts_by_author(&self, author_id: UserId, limit: usize) -> StorageResult<Vec<Post>> {
        // Precondition
        assert!(
            limit <= POSTS_BY_AUTHOR_LIMIT_MAX,
            "limit {limit} exceeds max {POSTS_BY_AUTHOR_LIMIT_MAX}"
        );

        let bound = i64::try_from(limit).map_err(|e| StorageError::internal(e.to_string()))?;
        let rows = sqlx::query(
            r#"
            SELECT seq, author_id, text FROM posts
            WHERE author_id = ?
            ORDER BY seq DESC
            LIMIT ?
            "#,
        )
        .bind(author_id)
        .bind(bound)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::read(format!("failed to read posts: {e}")))?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in &rows {
            posts.push(row_to_post(row)?);
        }

        // Postcondition
        assert!(
            posts.len() <= limit,
            "result count {} exceeds limit {}",
            posts.len(),
            limit
        );

        Ok(posts)
    }

    async fn post_count(&self) -> StorageResult<usize> {
        self.count("SELECT COUNT(*) FROM posts").await
    }

    async fn follow_count(&self) -> StorageResult<usize> {
        self.count("SELECT COUNT(*) FROM follows").await
    }
}

// =============================================================================
// Tests
// =============================================================================
