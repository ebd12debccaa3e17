//! Workload - Seeded synthetic corpus
//!
//! Generates users, follow edges and posts from a [`DeterministicRng`].
//! Duplicate edges and self-loops are produced on purpose: both are legal
//! input and the timeline must tolerate them.

use std::fmt::Write as _;

use crate::storage::{Follow, UserId};

use super::rng::DeterministicRng;

/// Size of a synthetic corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadConfig {
    /// Distinct user ids, numbered `1..=users`
    pub users: usize,
    /// Posts to generate
    pub posts: usize,
    /// Follow edges to generate
    pub follows: usize,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            users: 100,
            posts: 10_000,
            follows: 2_000,
        }
    }
}

/// A generated corpus, in ingestion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    /// `(author_id, text)` in insertion order
    pub posts: Vec<(UserId, String)>,
    /// Follow edges in insertion order
    pub follows: Vec<Follow>,
}

impl Workload {
    /// Generate a corpus.
    ///
    /// # Panics
    /// Panics if `config.users` is zero.
    #[must_use]
    pub fn generate(config: &WorkloadConfig, rng: &mut DeterministicRng) -> Self {
        // Precondition
        assert!(config.users > 0, "workload needs at least one user");

        let users = i64::try_from(config.users).unwrap_or(i64::MAX);
        let pick = |rng: &mut DeterministicRng| rng.gen_range(1..=users);

        let follows = (0..config.follows)
            .map(|_| Follow::new(pick(rng), pick(rng)))
            .collect();

        let posts = (0..config.posts)
            .map(|i| {
                let author = pick(rng);
                // Some texts carry the record delimiter.
                let text = if rng.gen_bool(0.1) {
                    format!("post {i}, by {author}")
                } else {
                    format!("post {i} by {author}")
                };
                (author, text)
            })
            .collect();

        Self { posts, follows }
    }

    /// Posts as delimited records with a header line.
    #[must_use]
    pub fn posts_records(&self) -> String {
        let mut out = String::from("author_id,text\n");
        for (author, text) in &self.posts {
            let _ = writeln!(out, "{author},{text}");
        }
        out
    }

    /// Follows as delimited records with a header line.
    #[must_use]
    pub fn follows_records(&self) -> String {
        let mut out = String::from("follower_id,followee_id\n");
        for follow in &self.follows {
            let _ = writeln!(out, "{},{}", follow.follower_id, follow.followee_id);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_deterministic() {
        let config = WorkloadConfig {
            users: 10,
            posts: 50,
            follows: 20,
        };
        let a = Workload::generate(&config, &mut DeterministicRng::new(11));
        let b = Workload::generate(&config, &mut DeterministicRng::new(11));

        assert_eq!(a, b);
        assert_eq!(a.posts.len(), 50);
        assert_eq!(a.follows.len(), 20);
        assert!(a.posts.iter().all(|(author, _)| (1..=10).contains(author)));
    }

    #[test]
    fn test_records_have_header() {
        let config = WorkloadConfig {
            users: 2,
            posts: 3,
            follows: 1,
        };
        let workload = Workload::generate(&config, &mut DeterministicRng::new(1));

        let posts = workload.posts_records();
        assert!(posts.starts_with("author_id,text\n"));
        assert_eq!(posts.lines().count(), 4);
        assert_eq!(workload.follows_records().lines().count(), 2);
    }
}
