//! Run Report
//!
//! Throughput numbers for one ingestion + timeline run. Rates come from
//! float seconds, so sub-second phases still report a rate, and a zero
//! duration reports zero instead of dividing by it.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::ingest::IngestSummary;

/// Operations per second over `elapsed`. Zero when `elapsed` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rate_per_sec(count: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// Average milliseconds per operation. Zero when `count` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn avg_ms(elapsed: Duration, count: usize) -> f64 {
    if count > 0 {
        elapsed.as_secs_f64() * 1000.0 / count as f64
    } else {
        0.0
    }
}

/// Everything measured in one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Correlates log lines with this report
    pub run_id: Uuid,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Backend name
    pub backend: String,
    /// Post ingestion outcome
    pub posts: IngestSummary,
    /// Time spent ingesting posts
    pub post_ingest_ms: f64,
    /// Post insert throughput
    pub posts_per_sec: f64,
    /// Follow ingestion outcome
    pub follows: IngestSummary,
    /// Distinct followers, one timeline each
    pub followers: usize,
    /// Time spent computing all timelines
    pub timeline_total_ms: f64,
    /// Average time per timeline
    pub timeline_avg_ms: f64,
    /// Timeline throughput
    pub timelines_per_sec: f64,
    /// Faults injected during a simulation run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faults_injected: Option<u64>,
}

impl RunReport {
    /// Start a report for `backend`.
    #[must_use]
    pub fn new(backend: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            backend: backend.to_string(),
            posts: IngestSummary::default(),
            post_ingest_ms: 0.0,
            posts_per_sec: 0.0,
            follows: IngestSummary::default(),
            followers: 0,
            timeline_total_ms: 0.0,
            timeline_avg_ms: 0.0,
            timelines_per_sec: 0.0,
            faults_injected: None,
        }
    }

    /// Record the post ingestion phase.
    pub fn record_posts(&mut self, summary: IngestSummary, elapsed: Duration) {
        self.posts = summary;
        self.post_ingest_ms = elapsed.as_secs_f64() * 1000.0;
        self.posts_per_sec = rate_per_sec(summary.inserted, elapsed);
    }

    /// Record the follow ingestion phase.
    pub fn record_follows(&mut self, summary: IngestSummary) {
        self.follows = summary;
    }

    /// Record the timeline phase.
    pub fn record_timelines(&mut self, followers: usize, elapsed: Duration) {
        self.followers = followers;
        self.timeline_total_ms = elapsed.as_secs_f64() * 1000.0;
        self.timeline_avg_ms = avg_ms(elapsed, followers);
        self.timelines_per_sec = rate_per_sec(followers, elapsed);
    }

    /// Pretty JSON.
    ///
    /// # Errors
    /// Propagates serialization errors.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {} ({} backend)", self.run_id, self.backend)?;
        writeln!(
            f,
            "posts:     {} stored, {} rejected, {} failed in {:.1} ms ({:.0} posts/s)",
            self.posts.inserted,
            self.posts.parse_failures,
            self.posts.storage_failures,
            self.post_ingest_ms,
            self.posts_per_sec
        )?;
        writeln!(
            f,
            "follows:   {} stored, {} rejected, {} failed",
            self.follows.inserted, self.follows.parse_failures, self.follows.storage_failures
        )?;
        write!(
            f,
            "timelines: {} in {:.1} ms (avg {:.3} ms, {:.0} timelines/s)",
            self.followers, self.timeline_total_ms, self.timeline_avg_ms, self.timelines_per_sec
        )?;
        if let Some(faults) = self.faults_injected {
            write!(f, "\nfaults:    {faults} injected")?;
        }
        Ok(())
    }
}
