//! fzclus-sort CLI - sort clusters for stable presentation.

use clap::Parser;
use fzclus_cli::init_tracing;
use std::io::{self, BufRead, BufWriter, Write};
use std::process;

/// Sort clusters read from standard input.
///
/// Digests inside each cluster are ordered by numeric blocksize prefix then
/// lexicographically; clusters are ordered by their first digest. Purely
/// presentational: the partition is unchanged.
#[derive(Parser, Debug)]
#[command(name = "fzclus-sort")]
#[command(version, about = "Sort clusters read from standard input.", long_about = None)]
struct Cli {}

/// A digest line with its parsed blocksize prefix as the primary sort key.
struct SortableDigest {
    block_size: u64,
    line: String,
}

impl SortableDigest {
    fn parse(line: &str, lineno: usize) -> Self {
        let prefix = line.split(':').next().unwrap_or("");
        let Ok(block_size) = prefix.parse::<u64>() else {
            eprintln!("error: malformed digest at line {lineno}");
            process::exit(1);
        };
        Self {
            block_size,
            line: line.to_string(),
        }
    }

    fn key(&self) -> (u64, &str) {
        (self.block_size, &self.line)
    }
}

fn main() {
    init_tracing();
    let _args = Cli::parse();

    if let Err(e) = run() {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run() -> io::Result<()> {
    let stdin = io::stdin();
    let mut clusters: Vec<Vec<SortableDigest>> = Vec::new();
    let mut current: Vec<SortableDigest> = Vec::new();
    for (n, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            if !current.is_empty() {
                clusters.push(std::mem::take(&mut current));
            }
        } else {
            current.push(SortableDigest::parse(&line, n + 1));
        }
    }
    if !current.is_empty() {
        clusters.push(current);
    }

    for cluster in &mut clusters {
        cluster.sort_by(|a, b| a.key().cmp(&b.key()));
    }
    clusters.sort_by(|a, b| a[0].key().cmp(&b[0].key()));

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for cluster in &clusters {
        for digest in cluster {
            writeln!(out, "{}", digest.line)?;
        }
        writeln!(out)?;
    }
    out.flush()
}
