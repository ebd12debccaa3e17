//! Chirp - Timeline benchmark driver
//!
//! `chirp run` ingests record files and times timeline retrieval.
//! `chirp simulate` does the same against a seeded corpus with injected
//! storage faults.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chirp::ingest::open_records;
use chirp::pipeline::{self, PipelineOptions, PipelineOutput};
use chirp::simulate::{simulate, SimulationOptions};
use chirp::{
    APP_NAME, APP_VERSION, SIMULATION_FAULT_RATE_DEFAULT, SIMULATION_FOLLOWS_DEFAULT,
    SIMULATION_POSTS_DEFAULT, SIMULATION_USERS_DEFAULT,
};
use chirp_core::{
    MemoryBackend, SimConfig, SqliteBackend, StorageBackend, UserId, WorkloadConfig,
    DEFAULT_SCHEMA, DST_FAULT_PROBABILITY_MAX, DST_FAULT_PROBABILITY_MIN,
    TIMELINE_BATCH_CONCURRENCY_DEFAULT, TIMELINE_BATCH_CONCURRENCY_MAX,
};
use clap::{Args, Parser, Subcommand, ValueEnum};

// =============================================================================
// CLI
// =============================================================================

/// Chirp - Social-graph timeline benchmark
#[derive(Parser, Debug)]
#[command(name = APP_NAME)]
#[command(about = "Ingest posts and follows, then compute every home timeline")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest record files and time timeline retrieval
    Run(RunArgs),
    /// Run a seeded corpus through a fault-injecting backend
    Simulate(SimulateArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    /// In-process maps
    Memory,
    /// In-memory SQLite database
    Sqlite,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// DDL script (embedded default when omitted)
    #[arg(long, env = "CHIRP_SCHEMA")]
    schema: Option<String>,

    /// Post records: author_id,text
    #[arg(long, env = "CHIRP_POSTS")]
    posts: String,

    /// Follow records: follower_id,followee_id
    #[arg(long, env = "CHIRP_FOLLOWS")]
    follows: String,

    /// Storage backend
    #[arg(long, env = "CHIRP_BACKEND", value_enum, default_value_t = BackendKind::Memory)]
    backend: BackendKind,

    /// Concurrent timeline computations
    #[arg(long, env = "CHIRP_CONCURRENCY", default_value_t = TIMELINE_BATCH_CONCURRENCY_DEFAULT)]
    concurrency: usize,

    /// Print the timeline of this user (repeatable)
    #[arg(long = "show-user")]
    show_users: Vec<UserId>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Seed (falls back to DST_SEED, then random)
    #[arg(long)]
    seed: Option<u64>,

    /// Distinct users
    #[arg(long, default_value_t = SIMULATION_USERS_DEFAULT)]
    users: usize,

    /// Posts to generate
    #[arg(long, default_value_t = SIMULATION_POSTS_DEFAULT)]
    posts: usize,

    /// Follow edges to generate
    #[arg(long, default_value_t = SIMULATION_FOLLOWS_DEFAULT)]
    follows: usize,

    /// Per-insert failure probability
    #[arg(long, default_value_t = SIMULATION_FAULT_RATE_DEFAULT)]
    fault_rate: f64,

    /// Storage backend
    #[arg(long, value_enum, default_value_t = BackendKind::Memory)]
    backend: BackendKind,

    /// Concurrent timeline computations
    #[arg(long, default_value_t = TIMELINE_BATCH_CONCURRENCY_DEFAULT)]
    concurrency: usize,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .init();

    tracing::info!("Chirp v{}", APP_VERSION);

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Simulate(args) => run_simulation(args).await,
    }
}

// =============================================================================
// Commands
// =============================================================================

fn check_concurrency(concurrency: usize) -> anyhow::Result<()> {
    anyhow::ensure!(
        (1..=TIMELINE_BATCH_CONCURRENCY_MAX).contains(&concurrency),
        "concurrency must be in 1..={}, got {}",
        TIMELINE_BATCH_CONCURRENCY_MAX,
        concurrency
    );
    Ok(())
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    check_concurrency(args.concurrency)?;

    let schema = match &args.schema {
        Some(path) => {
            let path = expand(path);
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read schema {}", path.display()))?
        }
        None => DEFAULT_SCHEMA.to_string(),
    };

    let output = match args.backend {
        BackendKind::Memory => run_with::<MemoryBackend>(&args, &schema).await?,
        BackendKind::Sqlite => run_with::<SqliteBackend>(&args, &schema).await?,
    };

    print_report(&output, args.json)?;
    for user in &args.show_users {
        print_timeline(&output, *user);
    }
    Ok(())
}

async fn run_with<B: StorageBackend + 'static>(
    args: &RunArgs,
    schema: &str,
) -> anyhow::Result<PipelineOutput> {
    let backend = B::initialize(schema)
        .await
        .context("failed to create the timeline store")?;

    let posts_path = expand(&args.posts);
    let follows_path = expand(&args.follows);
    let posts = open_records(&posts_path)
        .await
        .with_context(|| format!("failed to open {}", posts_path.display()))?;
    let follows = open_records(&follows_path)
        .await
        .with_context(|| format!("failed to open {}", follows_path.display()))?;

    let output = pipeline::run(
        Arc::new(backend),
        posts,
        follows,
        PipelineOptions {
            concurrency: args.concurrency,
        },
    )
    .await?;
    Ok(output)
}

async fn run_simulation(args: SimulateArgs) -> anyhow::Result<()> {
    check_concurrency(args.concurrency)?;
    anyhow::ensure!(
        (DST_FAULT_PROBABILITY_MIN..=DST_FAULT_PROBABILITY_MAX).contains(&args.fault_rate),
        "fault rate must be in {}..={}, got {}",
        DST_FAULT_PROBABILITY_MIN,
        DST_FAULT_PROBABILITY_MAX,
        args.fault_rate
    );
    anyhow::ensure!(args.users > 0, "a corpus needs at least one user");

    let config = match args.seed {
        Some(seed) => SimConfig::with_seed(seed),
        None => SimConfig::from_env_or_random(),
    };
    let options = SimulationOptions {
        config,
        workload: WorkloadConfig {
            users: args.users,
            posts: args.posts,
            follows: args.follows,
        },
        fault_rate: args.fault_rate,
        concurrency: args.concurrency,
    };

    let output = match args.backend {
        BackendKind::Memory => simulate::<MemoryBackend>(options).await?,
        BackendKind::Sqlite => simulate::<SqliteBackend>(options).await?,
    };

    print_report(&output, args.json)
}

// =============================================================================
// Output
// =============================================================================

fn print_report(output: &PipelineOutput, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", output.report.to_json()?);
    } else {
        println!("{}", output.report);
    }
    Ok(())
}

fn print_timeline(output: &PipelineOutput, user: UserId) {
    let posts = output
        .timelines
        .binary_search_by_key(&user, |(follower, _)| *follower)
        .map(|i| output.timelines[i].1.as_slice())
        .unwrap_or_default();

    println!("\ntimeline of user {user} ({} posts)", posts.len());
    for post in posts {
        println!("  #{:<8} {:>6}: {}", post.sequence, post.author_id, post.text);
    }
}
