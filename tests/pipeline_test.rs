//! End-to-end runs over on-disk record files.

use std::io::Write;
use std::sync::Arc;

use chirp::ingest::{open_records, IngestError};
use chirp::pipeline::{self, PipelineError, PipelineOptions, PipelineOutput};
use chirp_core::{
    DeterministicRng, FaultConfig, FaultInjectorBuilder, FaultType, FaultyBackend,
    MemoryBackend, SqliteBackend, StorageBackend, DEFAULT_SCHEMA,
};
use tempfile::NamedTempFile;

const SCENARIO_POSTS: &str = "author_id,text\n2,hello\n3,world\n2,again\n";
const SCENARIO_FOLLOWS: &str = "follower_id,followee_id\n1,2\n1,3\n";

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

fn records(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write records");
    file
}

async fn run_files<B: StorageBackend>(
    backend: B,
    posts: &str,
    follows: &str,
) -> Result<PipelineOutput, PipelineError> {
    let posts = records(posts);
    let follows = records(follows);

    pipeline::run(
        Arc::new(backend),
        open_records(posts.path()).await?,
        open_records(follows.path()).await?,
        PipelineOptions { concurrency: 4 },
    )
    .await
}

fn texts(output: &PipelineOutput, follower: i64) -> Vec<&str> {
    output
        .timelines
        .iter()
        .find(|(id, _)| *id == follower)
        .map(|(_, posts)| posts.iter().map(|p| p.text.as_str()).collect())
        .unwrap_or_default()
}

async fn scenario<B: StorageBackend>() {
    init_logging();
    let backend = B::initialize(DEFAULT_SCHEMA).await.unwrap();

    let output = run_files(backend, SCENARIO_POSTS, SCENARIO_FOLLOWS)
        .await
        .unwrap();

    assert_eq!(output.report.posts.inserted, 3);
    assert_eq!(output.report.follows.inserted, 2);
    assert_eq!(output.report.followers, 1);
    assert_eq!(texts(&output, 1), vec!["again", "world", "hello"]);
}

#[tokio::test]
async fn test_scenario_memory() {
    scenario::<MemoryBackend>().await;
}

#[tokio::test]
async fn test_scenario_sqlite() {
    scenario::<SqliteBackend>().await;
}

#[tokio::test]
async fn test_malformed_records_do_not_abort() {
    init_logging();
    let backend = MemoryBackend::initialize(DEFAULT_SCHEMA).await.unwrap();
    let posts = "author_id,text\n2,first\nbroken\nx,nope\n2,second, with comma\n";
    let follows = "follower_id,followee_id\n1,2\n1,2,3\n\n4,2\n";

    let output = run_files(backend, posts, follows).await.unwrap();

    let report = &output.report;
    assert_eq!(report.posts.inserted, 2);
    assert_eq!(report.posts.parse_failures, 2);
    assert_eq!(report.follows.inserted, 2);
    assert_eq!(report.follows.parse_failures, 1);

    let followers: Vec<i64> = output.timelines.iter().map(|(id, _)| *id).collect();
    assert_eq!(followers, vec![1, 4]);
    assert_eq!(texts(&output, 4), vec!["second, with comma", "first"]);
}

#[tokio::test]
async fn test_missing_record_file_is_io_error() {
    let missing = std::path::Path::new("/nonexistent/chirp/posts.csv");
    assert!(matches!(
        open_records(missing).await,
        Err(IngestError::Io(_))
    ));
}

#[tokio::test]
async fn test_storage_faults_do_not_abort() {
    init_logging();
    let injector = FaultInjectorBuilder::new(DeterministicRng::new(42))
        .with_fault(FaultConfig::new(FaultType::PostWrite, 1.0))
        .build();
    let backend = FaultyBackend::new(
        MemoryBackend::initialize(DEFAULT_SCHEMA).await.unwrap(),
        injector,
    );

    let output = run_files(backend, SCENARIO_POSTS, SCENARIO_FOLLOWS)
        .await
        .unwrap();

    assert_eq!(output.report.posts.inserted, 0);
    assert_eq!(output.report.posts.storage_failures, 3);
    assert_eq!(output.report.follows.inserted, 2);
    assert!(texts(&output, 1).is_empty());
}

#[tokio::test]
async fn test_report_json_round_trips_counts() {
    let backend = SqliteBackend::initialize(DEFAULT_SCHEMA).await.unwrap();
    let output = run_files(backend, SCENARIO_POSTS, SCENARIO_FOLLOWS)
        .await
        .unwrap();

    let json: serde_json::Value = serde_json::from_str(&output.report.to_json().unwrap()).unwrap();
    assert_eq!(json["backend"], "sqlite");
    assert_eq!(json["posts"]["records"], 3);
    assert_eq!(json["followers"], 1);
}
