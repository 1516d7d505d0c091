//! fzclus-merge CLI - merge pre-clustered outputs on standard input.

use clap::Parser;
use fzclus_cli::{combining_bar, init_tracing};
use fzclus_core::TextCombiner;
use std::io::{self, BufWriter, Write};

/// Merge clusterings that share digests.
///
/// Reads blank-line-separated clusters of digest strings from standard
/// input (typically several clustering outputs concatenated), unions any
/// two clusters that share a digest, and writes the merged clusters to
/// standard output. Digests are treated as opaque strings.
#[derive(Parser, Debug)]
#[command(name = "fzclus-merge")]
#[command(version, about = "Merge clusterings that share digests.", long_about = None)]
struct Cli {
    /// Update progress every this many cluster boundaries.
    #[arg(short = 'i', long, default_value_t = 1000)]
    interval: u64,

    /// Progress tag.
    #[arg(short = 'c', long, default_value = "combining")]
    comment: String,

    /// Suppress progress output.
    #[arg(long)]
    no_progress: bool,
}

fn main() {
    init_tracing();
    let args = Cli::parse();

    if args.interval < 1 {
        eprintln!("error: progress interval must be at least one cluster");
        std::process::exit(1);
    }

    if let Err(e) = run(&args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Cli) -> io::Result<()> {
    let bar = combining_bar(&args.comment, !args.no_progress);

    let stdin = io::stdin();
    let mut combiner = TextCombiner::new();
    combiner.read_from(stdin.lock(), |boundaries| {
        if boundaries % args.interval == 0 {
            bar.set_position(boundaries);
        }
    })?;
    bar.finish();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    combiner.write_merged(&mut out)?;
    out.flush()
}
