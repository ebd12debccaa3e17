//! FaultyBackend - Fault-injecting StorageBackend wrapper
//!
//! TigerStyle: Same contract as the wrapped backend, except that any
//! operation may fail with `StorageError::FaultInjected`. A failed write
//! never reaches the inner store.

use async_trait::async_trait;

use crate::storage::{Post, SchemaError, Sequence, StorageBackend, StorageError, StorageResult, UserId};

use super::fault::{FaultInjector, FaultType};

/// Wraps a backend and fails operations according to a [`FaultInjector`].
#[derive(Debug)]
pub struct FaultyBackend<B> {
    inner: B,
    injector: FaultInjector,
}

impl<B: StorageBackend> FaultyBackend<B> {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: B, injector: FaultInjector) -> Self {
        Self { inner, injector }
    }

    /// The injector, for fault counts.
    #[must_use]
    pub fn injector(&self) -> &FaultInjector {
        &self.injector
    }

    /// The wrapped backend.
    #[must_use]
    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn check(&self, fault_type: FaultType) -> StorageResult<()> {
        if self.injector.should_fail(fault_type) {
            tracing::debug!(operation = fault_type.operation(), "injecting fault");
            return Err(StorageError::FaultInjected {
                operation: fault_type.operation(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<B: StorageBackend> StorageBackend for FaultyBackend<B> {
    /// Initialize the inner backend with faults disabled.
    async fn initialize(schema_source: &str) -> Result<Self, SchemaError> {
        let inner = B::initialize(schema_source).await?;
        Ok(Self::new(inner, FaultInjector::disabled()))
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn insert_post(&self, author_id: UserId, text: &str) -> StorageResult<Sequence> {
        self.check(FaultType::PostWrite)?;
        self.inner.insert_post(author_id, text).await
    }

    async fn insert_follow(&self, follower_id: UserId, followee_id: UserId) -> StorageResult<()> {
        self.check(FaultType::FollowWrite)?;
        self.inner.insert_follow(follower_id, followee_id).await
    }

    async fn all_follower_ids(&self) -> StorageResult<Vec<UserId>> {
        self.check(FaultType::Read)?;
        self.inner.all_follower_ids().await
    }

    async fn followee_ids(&self, follower_id: UserId) -> StorageResult<Vec<UserId>> {
        self.check(FaultType::Read)?;
        self.inner.followee_ids(follower_id).await
    }

    async fn posts_by_author(&self, author_id: UserId, limit: usize) -> StorageResult<Vec<Post>> {
        self.check(FaultType::Read)?;
        self.inner.posts_by_author(author_id, limit).await
    }

    async fn post_count(&self) -> StorageResult<usize> {
        self.inner.post_count().await
    }

    async fn follow_count(&self) -> StorageResult<usize> {
        self.inner.follow_count().await
    }
}
