//! Timeline properties, checked against every backend.

use std::sync::Arc;

use chirp_core::{
    DeterministicRng, Post, Sequence, StorageBackend, TimelineEngine, UserId, Workload,
    WorkloadConfig, DEFAULT_SCHEMA, TIMELINE_POSTS_COUNT_MAX,
};

async fn store<B: StorageBackend>() -> B {
    B::initialize(DEFAULT_SCHEMA).await.expect("default schema must apply")
}

fn sequences(posts: &[Post]) -> Vec<Sequence> {
    posts.iter().map(|p| p.sequence).collect()
}

fn summary(posts: &[Post]) -> Vec<(UserId, &str)> {
    posts.iter().map(|p| (p.author_id, p.text.as_str())).collect()
}

async fn ordering_invariant<B: StorageBackend>() {
    let store = store::<B>().await;
    let mut inserted = Vec::new();
    for i in 0..25 {
        let seq = store.insert_post(7, &format!("p{i}")).await.unwrap();
        inserted.push(seq);
        store.insert_post(8, "interleaved").await.unwrap();
    }

    let posts = store.posts_by_author(7, 100).await.unwrap();
    inserted.reverse();
    assert_eq!(sequences(&posts), inserted);
    assert!(posts.windows(2).all(|w| w[0].sequence > w[1].sequence));
}

async fn bounded_result<B: StorageBackend>() {
    let store = store::<B>().await;
    for followee in 2..=30 {
        store.insert_follow(1, followee).await.unwrap();
        for i in 0..15 {
            store.insert_post(followee, &format!("{followee}/{i}")).await.unwrap();
        }
    }

    let engine = TimelineEngine::new(Arc::new(store));
    let timeline = engine.retrieve_timeline(1).await.unwrap();

    assert_eq!(timeline.len(), TIMELINE_POSTS_COUNT_MAX);
    // The last ten inserted posts all belong to followee 30.
    assert!(timeline.iter().all(|p| p.author_id == 30));
}

async fn empty_followee_case<B: StorageBackend>() {
    let store = store::<B>().await;
    store.insert_post(1, "my own post").await.unwrap();
    store.insert_follow(2, 1).await.unwrap();

    let engine = TimelineEngine::new(Arc::new(store));
    assert!(engine.retrieve_timeline(1).await.unwrap().is_empty());
    assert!(engine.retrieve_timeline(999).await.unwrap().is_empty());
}

async fn dedup_invariant<B: StorageBackend>() {
    let store = store::<B>().await;
    store.insert_follow(1, 2).await.unwrap();
    store.insert_follow(1, 2).await.unwrap();
    for text in ["one", "two", "three"] {
        store.insert_post(2, text).await.unwrap();
    }

    let engine = TimelineEngine::new(Arc::new(store));
    let timeline = engine.retrieve_timeline(1).await.unwrap();

    assert_eq!(summary(&timeline), vec![(2, "three"), (2, "two"), (2, "one")]);
}

async fn recency_merge<B: StorageBackend>() {
    let store = store::<B>().await;
    store.insert_follow(1, 2).await.unwrap();
    store.insert_follow(1, 3).await.unwrap();
    for i in 0..3 {
        assert_eq!(store.insert_post(2, &format!("b{i}")).await.unwrap(), 2 * i + 1);
        assert_eq!(store.insert_post(3, &format!("c{i}")).await.unwrap(), 2 * i + 2);
    }

    let engine = TimelineEngine::new(Arc::new(store));
    let timeline = engine.retrieve_timeline(1).await.unwrap();

    assert_eq!(sequences(&timeline), vec![6, 5, 4, 3, 2, 1]);
}

async fn idempotent_reads<B: StorageBackend>() {
    let store = store::<B>().await;
    let workload = Workload::generate(
        &WorkloadConfig {
            users: 20,
            posts: 500,
            follows: 120,
        },
        &mut DeterministicRng::new(2024),
    );
    for follow in &workload.follows {
        store.insert_follow(follow.follower_id, follow.followee_id).await.unwrap();
    }
    for (author, text) in &workload.posts {
        store.insert_post(*author, text).await.unwrap();
    }

    let engine = TimelineEngine::new(Arc::new(store));
    let followers = engine.backend().all_follower_ids().await.unwrap();
    assert!(followers.windows(2).all(|w| w[0] < w[1]));

    let first = engine.retrieve_timelines(&followers, 4).await.unwrap();
    let second = engine.retrieve_timelines(&followers, 1).await.unwrap();
    assert_eq!(first, second);
    for (_, timeline) in &first {
        assert!(timeline.len() <= TIMELINE_POSTS_COUNT_MAX);
    }
}

async fn scenario<B: StorageBackend>() {
    let store = store::<B>().await;
    store.insert_follow(1, 2).await.unwrap();
    store.insert_follow(1, 3).await.unwrap();
    assert_eq!(store.insert_post(2, "hello").await.unwrap(), 1);
    assert_eq!(store.insert_post(3, "world").await.unwrap(), 2);
    assert_eq!(store.insert_post(2, "again").await.unwrap(), 3);

    let engine = TimelineEngine::new(Arc::new(store));
    let timeline = engine.retrieve_timeline(1).await.unwrap();

    assert_eq!(
        summary(&timeline),
        vec![(2, "again"), (3, "world"), (2, "hello")]
    );
}

macro_rules! backend_properties {
    ($module:ident, $backend:ty) => {
        mod $module {
            use super::*;

            #[tokio::test]
            async fn test_ordering_invariant() {
                ordering_invariant::<$backend>().await;
            }

            #[tokio::test]
            async fn test_bounded_result() {
                bounded_result::<$backend>().await;
            }

            #[tokio::test]
            async fn test_empty_followee_case() {
                empty_followee_case::<$backend>().await;
            }

            #[tokio::test]
            async fn test_dedup_invariant() {
                dedup_invariant::<$backend>().await;
            }

            #[tokio::test]
            async fn test_recency_merge() {
                recency_merge::<$backend>().await;
            }

            #[tokio::test]
            async fn test_idempotent_reads() {
                idempotent_reads::<$backend>().await;
            }

            #[tokio::test]
            async fn test_scenario() {
                scenario::<$backend>().await;
            }
        }
    };
}

backend_properties!(memory, chirp_core::MemoryBackend);

#[cfg(feature = "sqlite")]
backend_properties!(sqlite, chirp_core::SqliteBackend);
