//! Entity - Posts and Follow edges
//!
//! TigerStyle: Plain immutable records, fields public, no behavior.

use serde::{Deserialize, Serialize};

/// User identifier. Users exist only by appearing in a post or a follow edge.
pub type UserId = i64;

/// Recency key assigned by the store at insert time.
pub type Sequence = i64;

// =============================================================================
// Post
// =============================================================================

/// A short text post.
///
/// `sequence` is assigned by the storage backend, never by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Post {
    /// Author of the post
    pub author_id: UserId,
    /// Body, stored verbatim
    pub text: String,
    /// Insertion order, strictly increasing per store
    pub sequence: Sequence,
}

impl Post {
    /// Build a post value. Used by backends when materializing rows.
    #[must_use]
    pub fn new(author_id: UserId, text: impl Into<String>, sequence: Sequence) -> Self {
        Self {
            author_id,
            text: text.into(),
            sequence,
        }
    }
}

// =============================================================================
// Follow
// =============================================================================

/// A directed follow edge: `follower_id` follows `followee_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Follow {
    /// The user doing the following
    pub follower_id: UserId,
    /// The user being followed
    pub followee_id: UserId,
}

impl Follow {
    /// Build an edge.
    #[must_use]
    pub fn new(follower_id: UserId, followee_id: UserId) -> Self {
        Self {
            follower_id,
            followee_id,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_new() {
        let post = Post::new(2, "hello", 1);

        assert_eq!(post.author_id, 2);
        assert_eq!(post.text, "hello");
        assert_eq!(post.sequence, 1);
    }

    #[test]
    fn test_follow_self_loop_allowed() {
        let follow = Follow::new(7, 7);
        assert_eq!(follow.follower_id, follow.followee_id);
    }
}
