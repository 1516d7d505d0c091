//! Text-level cluster combining.
//!
//! Reads pre-clustered output (digest lines grouped by blank lines) from any
//! number of concatenated runs and unions every pair of clusters that share
//! a digest string. No digest parsing happens here: a shared string is a
//! shared string. Clusters live in a dense arena and merging moves symbols
//! from the donor into the target, leaving the donor empty.

use crate::intern::{Interner, Symbol};
use std::io::{self, BufRead, Write};
use tracing::debug;

/// Incremental combiner over blank-line-separated cluster text.
#[derive(Debug)]
pub struct TextCombiner {
    interner: Interner,
    /// Cluster arena index per interned string, indexed by symbol.
    cluster_of: Vec<usize>,
    /// Dense cluster arena. Emptied entries are dead donors.
    clusters: Vec<Vec<Symbol>>,
    /// Arena index of the open cluster being filled.
    current: usize,
}

impl Default for TextCombiner {
    fn default() -> Self {
        Self::new()
    }
}

impl TextCombiner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            interner: Interner::new(),
            cluster_of: Vec::new(),
            clusters: vec![Vec::new()],
            current: 0,
        }
    }

    /// Add one digest line to the open cluster.
    ///
    /// A string seen for the first time joins the open cluster. A string
    /// seen before bridges the open cluster into the cluster that already
    /// owns it: every member of the open cluster moves over and the open
    /// cluster is replaced by the owner.
    pub fn add_digest(&mut self, digest: &str) {
        let (sym, fresh) = self.interner.intern(digest);
        if fresh {
            debug_assert_eq!(sym.index(), self.cluster_of.len());
            self.cluster_of.push(self.current);
            self.clusters[self.current].push(sym);
            return;
        }
        let target = self.cluster_of[sym.index()];
        if target == self.current {
            return;
        }
        let members = std::mem::take(&mut self.clusters[self.current]);
        for member in &members {
            self.cluster_of[member.index()] = target;
        }
        self.clusters[target].extend(members);
        self.current = target;
    }

    /// Close the open cluster and start a new one.
    ///
    /// Returns whether a non-empty cluster was actually closed; consecutive
    /// boundaries collapse into one.
    pub fn end_cluster(&mut self) -> bool {
        if self.clusters[self.current].is_empty() {
            return false;
        }
        self.clusters.push(Vec::new());
        self.current = self.clusters.len() - 1;
        true
    }

    /// Feed a whole cluster stream from a reader.
    ///
    /// `on_boundary` is invoked with the running count of blank lines seen,
    /// which is what the progress display tracks. The final cluster is
    /// closed implicitly at end of input.
    pub fn read_from<R: BufRead>(
        &mut self,
        reader: R,
        mut on_boundary: impl FnMut(u64),
    ) -> io::Result<()> {
        let mut boundaries = 0u64;
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                self.end_cluster();
                boundaries += 1;
                on_boundary(boundaries);
            } else {
                self.add_digest(&line);
            }
        }
        self.end_cluster();
        debug!(
            strings = self.interner.len(),
            clusters = self.live_clusters().count(),
            "combined cluster stream"
        );
        Ok(())
    }

    /// Surviving non-empty clusters, in arena order with members in
    /// insertion order.
    pub fn live_clusters(&self) -> impl Iterator<Item = Vec<&str>> {
        self.clusters.iter().filter(|c| !c.is_empty()).map(|c| {
            c.iter()
                .map(|&sym| self.interner.resolve(sym))
                .collect()
        })
    }

    /// Write the merged clusters: one digest per line, one blank line after
    /// each cluster.
    pub fn write_merged<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for cluster in self.live_clusters() {
            for digest in cluster {
                writeln!(w, "{digest}")?;
            }
            writeln!(w)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn combine(input: &str) -> TextCombiner {
        let mut combiner = TextCombiner::new();
        combiner.read_from(input.as_bytes(), |_| {}).unwrap();
        combiner
    }

    /// Clusters as order-independent sets of sets.
    fn partition(combiner: &TextCombiner) -> BTreeSet<BTreeSet<String>> {
        combiner
            .live_clusters()
            .map(|c| c.into_iter().map(str::to_owned).collect())
            .collect()
    }

    fn parts(groups: &[&[&str]]) -> BTreeSet<BTreeSet<String>> {
        groups
            .iter()
            .map(|g| g.iter().map(|s| (*s).to_owned()).collect())
            .collect()
    }

    #[test]
    fn test_disjoint_clusters_preserved() {
        let combiner = combine("X\nY\n\nZ\nW\n\n");
        assert_eq!(partition(&combiner), parts(&[&["X", "Y"], &["Z", "W"]]));
    }

    #[test]
    fn test_shared_digest_merges() {
        let combiner = combine("X\nY\n\nY\nZ\n\n");
        assert_eq!(partition(&combiner), parts(&[&["X", "Y", "Z"]]));
    }

    #[test]
    fn test_merge_is_transitive_across_many_clusters() {
        let combiner = combine("A\nB\n\nC\nD\n\nB\nC\n\nE\n\n");
        assert_eq!(
            partition(&combiner),
            parts(&[&["A", "B", "C", "D"], &["E"]])
        );
    }

    #[test]
    fn test_consecutive_blank_lines_collapse() {
        let combiner = combine("X\n\n\n\nY\n\n");
        assert_eq!(partition(&combiner), parts(&[&["X"], &["Y"]]));
    }

    #[test]
    fn test_missing_trailing_blank_line() {
        let combiner = combine("X\nY");
        assert_eq!(partition(&combiner), parts(&[&["X", "Y"]]));
    }

    #[test]
    fn test_duplicate_inside_one_cluster_is_noop() {
        let combiner = combine("X\nX\nY\n\n");
        assert_eq!(partition(&combiner), parts(&[&["X", "Y"]]));
    }

    #[test]
    fn test_repeat_reopens_and_extends_owner() {
        // The third cluster bridges into {X, Y}, then keeps filling it.
        let combiner = combine("X\nY\n\nZ\n\nY\nQ\n\n");
        assert_eq!(
            partition(&combiner),
            parts(&[&["X", "Y", "Q"], &["Z"]])
        );
    }

    #[test]
    fn test_cluster_count_equals_connected_components() {
        // Shares-a-string graph: {A,B}-{B,C} joined, {D,E} apart, {F} apart.
        let combiner = combine("A\nB\n\nB\nC\n\nD\nE\n\nF\n\n");
        assert_eq!(combiner.live_clusters().count(), 3);
    }

    #[test]
    fn test_idempotent_over_own_output() {
        let first = combine("A\nB\n\nB\nC\n\nD\nE\n\n");
        let mut out = Vec::new();
        first.write_merged(&mut out).unwrap();
        let second = combine(std::str::from_utf8(&out).unwrap());
        assert_eq!(partition(&second), partition(&first));
    }

    #[test]
    fn test_boundary_callback_counts_every_blank_line() {
        let mut combiner = TextCombiner::new();
        let mut seen = Vec::new();
        combiner
            .read_from("X\n\n\nY\n\n".as_bytes(), |n| seen.push(n))
            .unwrap();
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_input_produces_no_clusters() {
        let combiner = combine("");
        assert_eq!(combiner.live_clusters().count(), 0);
    }
}
