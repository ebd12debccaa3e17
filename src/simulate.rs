//! Simulation - Seeded corpus through a faulty backend
//!
//! TigerStyle: Generate, inject, verify. The same seed replays the same
//! corpus and the same faults.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chirp_core::{
    DeterministicRng, FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType,
    FaultyBackend, Post, SchemaError, SimConfig, StorageBackend, StorageError, UserId, Workload,
    WorkloadConfig, DEFAULT_SCHEMA, SEQUENCE_FIRST, TIMELINE_POSTS_COUNT_MAX,
};

use crate::pipeline::{self, PipelineError, PipelineOptions, PipelineOutput};

/// Simulation failures.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("storage error during verification: {0}")]
    Storage(#[from] StorageError),

    #[error("invariant violated (seed {seed}): {message}")]
    Invariant { seed: u64, message: String },
}

/// Parameters of one simulation.
#[derive(Debug, Clone, Copy)]
pub struct SimulationOptions {
    /// Seed source
    pub config: SimConfig,
    /// Corpus size
    pub workload: WorkloadConfig,
    /// Per-insert failure probability
    pub fault_rate: f64,
    /// Concurrent timeline computations
    pub concurrency: usize,
}

/// Generate a corpus, ingest it through `FaultyBackend<B>` and verify the
/// store and every timeline against a model replayed from the workload.
///
/// # Errors
/// `SimulationError::Invariant` names the seed to replay.
pub async fn simulate<B: StorageBackend + 'static>(
    options: SimulationOptions,
) -> Result<PipelineOutput, SimulationError> {
    let seed = options.config.seed();
    let mut rng = DeterministicRng::new(seed);
    let workload = Workload::generate(&options.workload, &mut rng);
    let fault_rng = rng.fork();

    let backend = Arc::new(FaultyBackend::new(
        B::initialize(DEFAULT_SCHEMA).await?,
        write_faults(fault_rng.clone(), options.fault_rate),
    ));

    let posts = workload.posts_records();
    let follows = workload.follows_records();
    let mut output = pipeline::run(
        Arc::clone(&backend),
        posts.as_bytes(),
        follows.as_bytes(),
        PipelineOptions {
            concurrency: options.concurrency,
        },
    )
    .await?;

    let model = Model::replay(
        &workload,
        &write_faults(fault_rng, options.fault_rate),
    );
    let injector = backend.injector();
    let invariant = |message: String| SimulationError::Invariant { seed, message };

    // Accounting
    let report = &output.report;
    if report.posts.parse_failures != 0 || report.follows.parse_failures != 0 {
        return Err(invariant("generated records failed to parse".to_string()));
    }
    let checks = [
        (
            "post failures vs injected",
            report.posts.storage_failures,
            count(injector.injected(FaultType::PostWrite)),
        ),
        (
            "follow failures vs injected",
            report.follows.storage_failures,
            count(injector.injected(FaultType::FollowWrite)),
        ),
        ("stored posts", backend.post_count().await?, report.posts.inserted),
        ("stored follows", backend.follow_count().await?, report.follows.inserted),
        ("model posts", model.post_count, report.posts.inserted),
        ("model follows", model.follow_count, report.follows.inserted),
    ];
    for (what, actual, expected) in checks {
        if actual != expected {
            return Err(invariant(format!("{what}: {actual} != {expected}")));
        }
    }

    // Timelines
    let followers: Vec<UserId> = output.timelines.iter().map(|(id, _)| *id).collect();
    let expected_followers: Vec<UserId> = model.followees.keys().copied().collect();
    if followers != expected_followers {
        return Err(invariant(format!(
            "{} followers computed, model has {}",
            followers.len(),
            expected_followers.len()
        )));
    }
    for (follower_id, timeline) in &output.timelines {
        if *timeline != model.timeline(*follower_id) {
            return Err(invariant(format!(
                "timeline of user {follower_id} differs from the model"
            )));
        }
    }

    output.report.faults_injected = Some(injector.injected_total());
    tracing::info!(
        seed,
        followers = output.timelines.len(),
        faults = injector.injected_total(),
        "simulation verified"
    );
    Ok(output)
}

fn write_faults(rng: DeterministicRng, fault_rate: f64) -> FaultInjector {
    FaultInjectorBuilder::new(rng)
        .with_fault(FaultConfig::new(FaultType::PostWrite, fault_rate))
        .with_fault(FaultConfig::new(FaultType::FollowWrite, fault_rate))
        .build()
}

fn count(injected: u64) -> usize {
    usize::try_from(injected).unwrap_or(usize::MAX)
}

// =============================================================================
// Model
// =============================================================================

/// What the store must contain, derived from the workload alone.
///
/// Ingestion is sequential and draws one fault roll per insert, posts first,
/// so an injector built from the same RNG replays exactly which inserts
/// failed. Sequences are consumed only by stored posts.
#[derive(Debug, Default)]
struct Model {
    posts: Vec<Post>,
    followees: BTreeMap<UserId, BTreeSet<UserId>>,
    post_count: usize,
    follow_count: usize,
}

impl Model {
    fn replay(workload: &Workload, faults: &FaultInjector) -> Self {
        let mut model = Self::default();
        let mut next = SEQUENCE_FIRST;

        for (author_id, text) in &workload.posts {
            if faults.should_fail(FaultType::PostWrite) {
                continue;
            }
            model.posts.push(Post::new(*author_id, text.clone(), next));
            next += 1;
            model.post_count += 1;
        }
        for follow in &workload.follows {
            if faults.should_fail(FaultType::FollowWrite) {
                continue;
            }
            model
                .followees
                .entry(follow.follower_id)
                .or_default()
                .insert(follow.followee_id);
            model.follow_count += 1;
        }
        model
    }

    /// Gather every post by every followee, sort, truncate.
    fn timeline(&self, follower_id: UserId) -> Vec<Post> {
        let Some(followees) = self.followees.get(&follower_id) else {
            return Vec::new();
        };
        let mut all: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| followees.contains(&p.author_id))
            .cloned()
            .collect();
        all.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        all.truncate(TIMELINE_POSTS_COUNT_MAX);
        all
    }
}
