//! Timeline - Fan-out-on-read home timelines
//!
//! TigerStyle: Bounded reads, explicit merge, checked postconditions.
//!
//! ```text
//! follower ──► followee_ids (deduplicated set)
//!                 │
//!                 ├─► posts_by_author(b, limit) ─┐
//!                 ├─► posts_by_author(c, limit) ─┼─► k-way merge by seq DESC ─► first `limit`
//!                 └─► posts_by_author(d, limit) ─┘
//! ```
//!
//! At most `limit` posts can survive the merge, so no followee is ever asked
//! for more than `limit`. Read cost is `O(followees * limit)` regardless of
//! how many posts a followee has written.

use std::collections::BinaryHeap;
use std::sync::Arc;

use futures::future::try_join_all;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::constants::{TIMELINE_BATCH_CONCURRENCY_MAX, TIMELINE_POSTS_COUNT_MAX};
use crate::storage::{Post, Sequence, StorageBackend, StorageResult, UserId};

/// A follower together with their computed timeline.
pub type UserTimeline = (UserId, Vec<Post>);

/// Computes home timelines over any [`StorageBackend`].
///
/// The engine only reads. Build it after ingestion has finished.
#[derive(Debug)]
pub struct TimelineEngine<B> {
    backend: Arc<B>,
    limit: usize,
}

impl<B> Clone for TimelineEngine<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            limit: self.limit,
        }
    }
}

impl<B: StorageBackend> TimelineEngine<B> {
    /// Create an engine returning up to `TIMELINE_POSTS_COUNT_MAX` posts.
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            limit: TIMELINE_POSTS_COUNT_MAX,
        }
    }

    /// Use a smaller timeline size.
    ///
    /// # Panics
    /// Panics if `limit` is zero or above `TIMELINE_POSTS_COUNT_MAX`.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        assert!(
            (1..=TIMELINE_POSTS_COUNT_MAX).contains(&limit),
            "timeline limit {limit} outside 1..={TIMELINE_POSTS_COUNT_MAX}"
        );
        self.limit = limit;
        self
    }

    /// Maximum posts per timeline.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The backend being read.
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Most recent posts by anyone `follower_id` follows, newest first.
    ///
    /// A follower with no followees gets an empty timeline.
    ///
    /// # Errors
    /// Propagates the first `StorageError` from the backend.
    pub async fn retrieve_timeline(&self, follower_id: UserId) -> StorageResult<Vec<Post>> {
        let followees = self.backend.followee_ids(follower_id).await?;
        if followees.is_empty() {
            tracing::debug!(follower_id, "no followees, empty timeline");
            return Ok(Vec::new());
        }

        let per_followee = try_join_all(
            followees
                .iter()
                .map(|&followee_id| self.backend.posts_by_author(followee_id, self.limit)),
        )
        .await?;

        let timeline = merge_recent(per_followee, self.limit);

        // Postconditions
        assert!(
            timeline.len() <= self.limit,
            "timeline has {} posts, limit {}",
            timeline.len(),
            self.limit
        );
        assert!(
            timeline.windows(2).all(|w| w[0].sequence > w[1].sequence),
            "timeline must be strictly recency ordered"
        );

        tracing::debug!(
            follower_id,
            followees = followees.len(),
            posts = timeline.len(),
            "timeline retrieved"
        );
        Ok(timeline)
    }

    /// Timelines for a batch of followers, in input order.
    ///
    /// Up to `concurrency` timelines are computed at once.
    ///
    /// # Panics
    /// Panics if `concurrency` is zero or above `TIMELINE_BATCH_CONCURRENCY_MAX`.
    ///
    /// # Errors
    /// Stops at the first `StorageError`.
    pub async fn retrieve_timelines(
        &self,
        follower_ids: &[UserId],
        concurrency: usize,
    ) -> StorageResult<Vec<UserTimeline>> {
        // Precondition
        assert!(
            (1..=TIMELINE_BATCH_CONCURRENCY_MAX).contains(&concurrency),
            "concurrency {concurrency} outside 1..={TIMELINE_BATCH_CONCURRENCY_MAX}"
        );

        let timelines: Vec<UserTimeline> = stream::iter(follower_ids.iter().copied())
            .map(|follower_id| async move {
                self.retrieve_timeline(follower_id)
                    .await
                    .map(|timeline| (follower_id, timeline))
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        // Postcondition
        assert_eq!(
            timelines.len(),
            follower_ids.len(),
            "one timeline per follower"
        );

        Ok(timelines)
    }
}

/// Merge lists that are each sorted by sequence descending into one list of
/// at most `limit` posts, sorted by sequence descending.
#[must_use]
pub fn merge_recent(lists: Vec<Vec<Post>>, limit: usize) -> Vec<Post> {
    let mut cursors: Vec<std::vec::IntoIter<Post>> =
        lists.into_iter().map(Vec::into_iter).collect();
    let mut heads: Vec<Option<Post>> = Vec::with_capacity(cursors.len());
    let mut heap: BinaryHeap<(Sequence, usize)> = BinaryHeap::with_capacity(cursors.len());

    for (i, cursor) in cursors.iter_mut().enumerate() {
        let head = cursor.next();
        if let Some(post) = &head {
            heap.push((post.sequence, i));
        }
        heads.push(head);
    }

    let mut merged = Vec::with_capacity(limit.min(heap.len() * limit));
    while merged.len() < limit {
        let Some((_, i)) = heap.pop() else {
            break;
        };
        if let Some(post) = heads[i].take() {
            merged.push(post);
        }
        heads[i] = cursors[i].next();
        if let Some(post) = &heads[i] {
            heap.push((post.sequence, i));
        }
    }

    merged
}

// =============================================================================
// Tests
// =============================================================================
