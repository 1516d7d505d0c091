//! Parallel clustering engine.
//!
//! Workers claim source slots from a shared atomic counter. For each claimed
//! slot the worker builds the digest's position-array accelerator once, then
//! enumerates candidate partners restricted to the adjacent blocksize
//! buckets: nonzero similarity is only possible when blocksizes are equal,
//! doubled or halved, so everything else is never probed. A pair scoring
//! strictly above the threshold is joined through [`LabelSet`].

use crate::error::{ClusError, Result};
use crate::labels::LabelSet;
use crate::store::{DigestStore, LEVELS};
use ssdeep::FuzzyHashCompareTarget;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default similarity threshold.
pub const DEFAULT_THRESHOLD: u32 = 79;

/// Configuration for a clustering run.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Similarity threshold in `[0, 99]`. Two digests are joined iff their
    /// score is strictly greater than this.
    pub threshold: u32,
    /// Number of worker threads (at least 1).
    pub workers: usize,
    /// Delay between progress callbacks from the driver thread.
    pub progress_interval: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            workers: 1,
            progress_interval: Duration::from_secs(1),
        }
    }
}

impl ClusterConfig {
    /// Set the similarity threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.threshold > 99 {
            return Err(ClusError::Config(format!(
                "threshold {} is out of range 0..=99",
                self.threshold
            )));
        }
        if self.workers == 0 {
            return Err(ClusError::Config("at least one worker is required".into()));
        }
        Ok(())
    }
}

/// Summary of a finished clustering run.
#[derive(Debug, Clone, Default)]
pub struct ClusterStats {
    /// Total slots in the store.
    pub total: usize,
    /// Source slots driven by the workers (the fresh span).
    pub fresh: usize,
    /// Clusters with at least two members.
    pub clusters: usize,
    /// Slots that ended up in some cluster.
    pub clustered: usize,
    /// Wall-clock time of the run in seconds.
    pub elapsed_secs: f64,
}

/// Assign cluster labels into `store`.
///
/// Drives one task per worker over the fresh span. `on_progress` is invoked
/// from the calling thread with the number of completed source slots: once
/// immediately, then every `progress_interval` until the run completes, and
/// a final time with the full work size.
///
/// The equivalence partition produced is deterministic for a given input
/// set and threshold regardless of `workers`; the label ids themselves
/// depend on scheduling.
pub fn cluster(
    store: &DigestStore,
    config: &ClusterConfig,
    mut on_progress: impl FnMut(usize),
) -> Result<ClusterStats> {
    config.validate()?;
    let work_size = store.fresh_len();
    // The claim counter may run up to `work_size + workers`.
    work_size
        .checked_add(config.workers)
        .ok_or_else(|| ClusError::Capacity("too many signatures or workers".into()))?;

    let start = Instant::now();
    debug!(
        work_size,
        total = store.len(),
        threshold = config.threshold,
        workers = config.workers,
        "starting clustering run"
    );

    let run = Run {
        store,
        labels: LabelSet::new(store),
        threshold: config.threshold,
        next: AtomicUsize::new(0),
        finished: AtomicUsize::new(0),
    };

    if work_size > 0 {
        thread::scope(|scope| {
            for _ in 0..config.workers {
                scope.spawn(|| run.worker());
            }
            loop {
                let done = run.finished.load(Ordering::Relaxed);
                on_progress(done);
                if done == work_size {
                    break;
                }
                thread::sleep(config.progress_interval);
            }
        });
    } else {
        on_progress(0);
    }

    let clusters = store.clusters();
    Ok(ClusterStats {
        total: store.len(),
        fresh: work_size,
        clusters: clusters.len(),
        clustered: clusters.iter().map(Vec::len).sum(),
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}

/// Shared state of one clustering run.
struct Run<'a> {
    store: &'a DigestStore,
    labels: LabelSet<'a>,
    threshold: u32,
    /// Work counter: each fetch-add claims one source slot.
    next: AtomicUsize,
    /// Completed source slots, for progress reporting.
    finished: AtomicUsize,
}

impl Run<'_> {
    fn worker(&self) {
        let work_size = self.store.fresh_len();
        let sigs = self.store.sigs();
        let mut target = FuzzyHashCompareTarget::new();
        loop {
            let i = self.next.fetch_add(1, Ordering::Relaxed);
            if i >= work_size {
                break;
            }
            let level = sigs[i].level();
            target.init_from(&sigs[i].ndigest);
            if self.store.has_base() {
                self.scan_combined(&target, i, level);
            } else {
                self.scan_pure(&target, i, level);
            }
            self.finished.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Pure mode: compare `i` against later slots of its own bucket and the
    /// whole doubled bucket. Pairs where the partner has the smaller
    /// blocksize are visited by the worker that owns the partner.
    fn scan_pure(&self, target: &FuzzyHashCompareTarget, i: usize, level: usize) {
        let sigs = self.store.sigs();
        for j in (i + 1)..self.store.fresh_bucket(level).end {
            if self.labels.same(i, j) {
                continue;
            }
            if target.compare_near_eq(&sigs[j].ndigest) > self.threshold {
                self.labels.join(i, j);
            }
        }
        if level + 1 < LEVELS {
            for j in self.store.fresh_bucket(level + 1) {
                if self.labels.same(i, j) {
                    continue;
                }
                if target.compare_unequal_near_lt(&sigs[j].ndigest) > self.threshold {
                    self.labels.join(i, j);
                }
            }
        }
    }

    /// Combine mode: compare `i` against every slot of the three adjacent
    /// buckets in both spans, excluding `i` itself in the equal bucket.
    fn scan_combined(&self, target: &FuzzyHashCompareTarget, i: usize, level: usize) {
        let sigs = self.store.sigs();
        if level > 0 {
            let below = level - 1;
            for j in self
                .store
                .base_bucket(below)
                .chain(self.store.fresh_bucket(below))
            {
                if self.labels.same(i, j) {
                    continue;
                }
                if target.compare_unequal_near_gt(&sigs[j].ndigest) > self.threshold {
                    self.labels.join(i, j);
                }
            }
        }
        for j in self
            .store
            .base_bucket(level)
            .chain(self.store.fresh_bucket(level))
        {
            if j == i || self.labels.same(i, j) {
                continue;
            }
            if target.compare_near_eq(&sigs[j].ndigest) > self.threshold {
                self.labels.join(i, j);
            }
        }
        if level + 1 < LEVELS {
            let above = level + 1;
            for j in self
                .store
                .base_bucket(above)
                .chain(self.store.fresh_bucket(above))
            {
                if self.labels.same(i, j) {
                    continue;
                }
                if target.compare_unequal_near_lt(&sigs[j].ndigest) > self.threshold {
                    self.labels.join(i, j);
                }
            }
        }
    }
}
