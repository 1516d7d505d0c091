//! fzclus-extend CLI - extend an existing clustering with new digests.

use clap::Parser;
use fzclus_cli::{clustering_bar, init_tracing, JsonSummary};
use fzclus_core::{cluster, ClusterConfig, DigestStore, DEFAULT_THRESHOLD};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

/// Extend an existing clustering with a new digest set.
///
/// Digests already present in the existing set are dropped from the new set;
/// the remaining new digests are compared against each other and against the
/// existing digests, without re-clustering the existing set internally.
/// Emitted clusters contain every digest (new or existing) that joined one.
#[derive(Parser, Debug)]
#[command(name = "fzclus-extend")]
#[command(version, about = "Extend an existing clustering with a new digest set.", long_about = None)]
struct Cli {
    /// Digest list to add.
    #[arg(value_name = "NEW_FILE")]
    new: PathBuf,

    /// Digest list of the existing clustering.
    #[arg(value_name = "OLD_FILE")]
    existing: PathBuf,

    /// Similarity threshold (0-99); pairs scoring strictly above it are joined.
    #[arg(short = 't', long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: u32,

    /// Number of worker threads.
    #[arg(short = 'n', long, default_value_t = 1)]
    workers: usize,

    /// Progress tag (defaults to the new digest list path).
    #[arg(short = 'c', long)]
    comment: Option<String>,

    /// Seconds between progress updates.
    #[arg(short = 'i', long, default_value_t = 1)]
    interval: u64,

    /// Suppress progress output.
    #[arg(long)]
    no_progress: bool,

    /// Print a JSON run summary to standard error when done.
    #[arg(long)]
    json: bool,
}

fn main() {
    init_tracing();
    let args = Cli::parse();

    if args.threshold > 99 {
        eprintln!("error: threshold must be between 0 and 99");
        std::process::exit(1);
    }
    if args.workers < 1 {
        eprintln!("error: at least one worker thread is required");
        std::process::exit(1);
    }
    if args.interval < 1 {
        eprintln!("error: progress interval must be at least one second");
        std::process::exit(1);
    }

    if let Err(e) = run(&args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Cli) -> fzclus_core::Result<()> {
    let new = fzclus_core::read_digest_file(&args.new)?;
    let existing = fzclus_core::read_digest_file(&args.existing)?;
    let store = DigestStore::from_new_and_existing(new, existing)?;
    if store.fresh_len() == 0 {
        return Ok(()); // nothing new to cluster
    }

    let comment = args
        .comment
        .clone()
        .unwrap_or_else(|| args.new.display().to_string());
    let bar = clustering_bar(
        store.fresh_len() as u64,
        args.threshold,
        &comment,
        !args.no_progress,
    );

    let config = ClusterConfig {
        threshold: args.threshold,
        workers: args.workers,
        progress_interval: Duration::from_secs(args.interval),
    };
    let stats = cluster(&store, &config, |done| bar.set_position(done as u64))?;
    bar.finish();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    store.write_clusters(&mut out)?;
    out.flush()?;

    if args.json {
        JsonSummary {
            input: args.new.display().to_string(),
            base: Some(args.existing.display().to_string()),
            digests: stats.total,
            fresh: stats.fresh,
            clusters: stats.clusters,
            clustered_digests: stats.clustered,
            threshold: args.threshold,
            workers: args.workers,
            elapsed_secs: stats.elapsed_secs,
            throughput_digests_s: stats.fresh as f64 / stats.elapsed_secs.max(f64::EPSILON),
        }
        .print();
    }
    Ok(())
}
