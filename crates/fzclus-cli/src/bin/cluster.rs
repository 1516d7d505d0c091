//! fzclus-cluster CLI - cluster one set of ssdeep digests.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use fzclus_cli::{clustering_bar, init_tracing, JsonSummary};
use fzclus_core::{cluster, ClusterConfig, DigestStore, DEFAULT_THRESHOLD};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cluster one set of ssdeep digests.
///
/// Reads a digest list (one printable ssdeep digest per line), groups
/// digests whose pairwise similarity score exceeds the threshold into
/// clusters and prints them to standard output: one digest per line, a
/// blank line after each cluster. Digests that match nothing are omitted.
#[derive(Parser, Debug)]
#[command(name = "fzclus-cluster")]
#[command(version, about = "Cluster one set of ssdeep digests.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Digest list file.
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Similarity threshold (0-99); pairs scoring strictly above it are joined.
    #[arg(short = 't', long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: u32,

    /// Number of worker threads.
    #[arg(short = 'n', long, default_value_t = 1)]
    workers: usize,

    /// Progress tag (defaults to the input path).
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

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    init_tracing();
    let args = Cli::parse();

    if let Some(Commands::Completions { shell }) = args.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "fzclus-cluster", &mut io::stdout());
        return;
    }

    let Some(input) = args.input.clone() else {
        eprintln!("error: input file is required");
        std::process::exit(1);
    };
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

    if let Err(e) = run(&args, &input) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Cli, input: &Path) -> fzclus_core::Result<()> {
    let digests = fzclus_core::read_digest_file(input)?;
    if digests.is_empty() {
        return Ok(()); // no clusters to make
    }
    let store = DigestStore::from_digests(digests);

    let comment = args
        .comment
        .clone()
        .unwrap_or_else(|| input.display().to_string());
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
            input: input.display().to_string(),
            base: None,
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
