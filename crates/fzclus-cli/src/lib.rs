//! Shared helpers for the fzclus command-line tools.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;

/// Initialise stderr logging from `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Progress bar for a clustering run: elapsed time, completed source slots
/// and the threshold/comment tag. Hidden when progress is suppressed.
#[must_use]
pub fn clustering_bar(len: u64, threshold: u32, comment: &str, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::with_draw_target(Some(len), ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{elapsed_precise} {pos:>12}/{len} {msg}")
            .unwrap(),
    );
    pb.set_message(format!("[(threshold={threshold}) {comment}]"));
    pb
}

/// Progress counter for the text combiner: elapsed time and cluster
/// boundaries seen. Hidden when progress is suppressed.
#[must_use]
pub fn combining_bar(comment: &str, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{elapsed_precise} {pos:>12} {msg}")
            .unwrap(),
    );
    pb.set_message(format!("[{comment}]"));
    pb
}

/// JSON run summary, written to standard error because standard output
/// carries the cluster data itself.
#[derive(Serialize)]
pub struct JsonSummary {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    pub digests: usize,
    pub fresh: usize,
    pub clusters: usize,
    pub clustered_digests: usize,
    pub threshold: u32,
    pub workers: usize,
    pub elapsed_secs: f64,
    pub throughput_digests_s: f64,
}

impl JsonSummary {
    pub fn print(&self) {
        eprintln!(
            "{}",
            serde_json::to_string_pretty(self).expect("summary serializes")
        );
    }
}
