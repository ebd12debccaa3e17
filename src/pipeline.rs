//! Pipeline - Ingest, then serve
//!
//! TigerStyle: Two strict phases. Every record is ingested before the first
//! timeline is computed; the timeline engine only exists after ingestion.

use std::sync::Arc;
use std::time::Instant;

use chirp_core::{StorageBackend, StorageError, TimelineEngine, UserTimeline};
use tokio::io::AsyncBufRead;
use tracing::Instrument;

use crate::ingest::{ingest_follows, ingest_posts, IngestError};
use crate::report::RunReport;

/// Pipeline failures. Per-record problems are not errors; see `IngestSummary`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// Knobs for one run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Concurrent timeline computations
    pub concurrency: usize,
}

/// Result of a run.
#[derive(Debug)]
pub struct PipelineOutput {
    /// Throughput numbers
    pub report: RunReport,
    /// One timeline per distinct follower, ascending follower id
    pub timelines: Vec<UserTimeline>,
}

/// Ingest posts then follows into `backend`, then compute every follower's
/// home timeline.
///
/// # Errors
/// `PipelineError` if a record source is unreadable or a timeline read fails.
pub async fn run<B, P, F>(
    backend: Arc<B>,
    posts: P,
    follows: F,
    options: PipelineOptions,
) -> Result<PipelineOutput, PipelineError>
where
    B: StorageBackend,
    P: AsyncBufRead + Unpin,
    F: AsyncBufRead + Unpin,
{
    let report = RunReport::new(backend.name());
    let span = tracing::info_span!("pipeline", run_id = %report.run_id, backend = backend.name());

    run_phases(backend, posts, follows, options, report)
        .instrument(span)
        .await
}

async fn run_phases<B, P, F>(
    backend: Arc<B>,
    posts: P,
    follows: F,
    options: PipelineOptions,
    mut report: RunReport,
) -> Result<PipelineOutput, PipelineError>
where
    B: StorageBackend,
    P: AsyncBufRead + Unpin,
    F: AsyncBufRead + Unpin,
{
    // Phase 1: populate
    let start = Instant::now();
    let post_summary = ingest_posts(posts, backend.as_ref()).await?;
    report.record_posts(post_summary, start.elapsed());

    let follow_summary = ingest_follows(follows, backend.as_ref()).await?;
    report.record_follows(follow_summary);

    // Phase 2: read only
    let engine = TimelineEngine::new(backend);
    let followers = engine.backend().all_follower_ids().await?;

    let start = Instant::now();
    let timelines = engine
        .retrieve_timelines(&followers, options.concurrency)
        .await?;
    report.record_timelines(followers.len(), start.elapsed());

    tracing::info!(
        followers = followers.len(),
        timeline_avg_ms = report.timeline_avg_ms,
        "timelines computed"
    );

    Ok(PipelineOutput { report, timelines })
}
