//! Digest store and blocksize index.
//!
//! The store owns the immutable array of parsed digests plus one mutable
//! cluster label per slot. Slots are sorted by blocksize ascending and a
//! per-span blocksize index maps each blocksize level to its half-open slot
//! range, so candidate enumeration during clustering is two array lookups.

use crate::error::{ClusError, Result};
use ssdeep::{BlockSize, FuzzyHash, RawFuzzyHash};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Number of blocksize levels in the digest library's ladder.
pub const LEVELS: usize = BlockSize::NUM_VALID;

/// One stored digest plus its current cluster label.
///
/// `0` means unassigned (a singleton that never joined anything); labels
/// `>= 1` identify an equivalence class. Two slots are in the same cluster
/// iff their labels are equal and nonzero.
pub struct FileSig {
    /// Unnormalized digest, preserved for output.
    pub udigest: RawFuzzyHash,
    /// Normalized digest used for comparison.
    pub ndigest: FuzzyHash,
    cluster_no: AtomicUsize,
}

impl FileSig {
    fn new(udigest: RawFuzzyHash) -> Self {
        Self {
            udigest,
            ndigest: udigest.normalize(),
            cluster_no: AtomicUsize::new(0),
        }
    }

    /// Current cluster label (best-effort outside the union lock).
    #[inline]
    pub fn label(&self) -> usize {
        self.cluster_no.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_label(&self, label: usize) {
        self.cluster_no.store(label, Ordering::Relaxed);
    }

    /// Blocksize level of this digest in the library's ladder.
    #[inline]
    pub fn level(&self) -> usize {
        self.ndigest.log_block_size() as usize
    }
}

/// Immutable digest array with per-span blocksize indexes.
///
/// The array holds two contiguous spans: the *fresh* span `[0, fresh_len)`
/// of digests to be clustered, and the *base* span `[fresh_len, len)` of
/// digests from an existing clustering. In pure (single-set) mode the base
/// span is empty. Both spans are independently sorted by blocksize
/// ascending; the slot order within a blocksize bucket is fixed for the run.
pub struct DigestStore {
    sigs: Vec<FileSig>,
    fresh_len: usize,
    fresh_index: Vec<usize>,
    base_index: Vec<usize>,
}

impl DigestStore {
    /// Build a pure-mode store from a deduplicated digest set.
    ///
    /// `BTreeSet<RawFuzzyHash>` iterates in the library's total order, which
    /// sorts primarily by blocksize, so the slot array comes out sorted.
    #[must_use]
    pub fn from_digests(digests: BTreeSet<RawFuzzyHash>) -> Self {
        let sigs: Vec<FileSig> = digests.into_iter().map(FileSig::new).collect();
        let fresh_len = sigs.len();
        let fresh_index = build_blocksize_index(&sigs, 0, fresh_len);
        let base_index = build_blocksize_index(&sigs, fresh_len, fresh_len);
        Self {
            sigs,
            fresh_len,
            fresh_index,
            base_index,
        }
    }

    /// Build a combine-mode store: digests of `new` not already present in
    /// `existing` form the fresh span, all of `existing` forms the base span.
    ///
    /// Fails with a capacity error if the total slot count would overflow.
    pub fn from_new_and_existing(
        new: BTreeSet<RawFuzzyHash>,
        existing: BTreeSet<RawFuzzyHash>,
    ) -> Result<Self> {
        let fresh: Vec<FileSig> = new
            .into_iter()
            .filter(|d| !existing.contains(d))
            .map(FileSig::new)
            .collect();
        let fresh_len = fresh.len();
        let total = fresh_len
            .checked_add(existing.len())
            .ok_or_else(|| ClusError::Capacity("too many signatures to match".into()))?;

        let mut sigs = fresh;
        sigs.reserve_exact(total - fresh_len);
        sigs.extend(existing.into_iter().map(FileSig::new));

        let fresh_index = build_blocksize_index(&sigs, 0, fresh_len);
        let base_index = build_blocksize_index(&sigs, fresh_len, total);
        Ok(Self {
            sigs,
            fresh_len,
            fresh_index,
            base_index,
        })
    }

    /// Total number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    /// Whether the store holds no slots at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }

    /// Number of slots in the fresh span (the clustering work size).
    #[must_use]
    pub fn fresh_len(&self) -> usize {
        self.fresh_len
    }

    /// Whether a base span of already-clustered digests is present.
    #[must_use]
    pub fn has_base(&self) -> bool {
        self.fresh_len < self.sigs.len()
    }

    /// All slots, fresh span first.
    #[must_use]
    pub fn sigs(&self) -> &[FileSig] {
        &self.sigs
    }

    /// Fresh-span slot range for one blocksize level.
    #[inline]
    #[must_use]
    pub fn fresh_bucket(&self, level: usize) -> Range<usize> {
        self.fresh_index[level]..self.fresh_index[level + 1]
    }

    /// Base-span slot range for one blocksize level.
    #[inline]
    #[must_use]
    pub fn base_bucket(&self, level: usize) -> Range<usize> {
        self.base_index[level]..self.base_index[level + 1]
    }

    /// Slot indices grouped into clusters, ordered by label ascending.
    ///
    /// Slots with label 0 are singletons and do not appear. Which label ids
    /// survive a run is scheduling-dependent, but the partition itself is
    /// deterministic for a given input and threshold.
    #[must_use]
    pub fn clusters(&self) -> Vec<Vec<usize>> {
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, sig) in self.sigs.iter().enumerate() {
            let label = sig.label();
            if label != 0 {
                groups.entry(label).or_default().push(i);
            }
        }
        groups.into_values().collect()
    }

    /// Write all clusters: one digest per line, one blank line after each
    /// cluster. Singletons are omitted.
    pub fn write_clusters<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for cluster in self.clusters() {
            for i in cluster {
                writeln!(w, "{}", self.sigs[i].udigest)?;
            }
            writeln!(w)?;
        }
        Ok(())
    }
}

/// Construct the blocksize index for the slot span `[lo, hi)`.
///
/// The result has `LEVELS + 1` entries; entry `k` is the smallest position
/// in the span whose blocksize level is `>= k`, and entry `LEVELS` is `hi`.
/// Slots of level `k` therefore occupy exactly `[index[k], index[k + 1])`.
/// Requires the span to be sorted by blocksize ascending.
fn build_blocksize_index(sigs: &[FileSig], lo: usize, hi: usize) -> Vec<usize> {
    let mut index = Vec::with_capacity(LEVELS + 1);
    let mut pos = lo;
    for level in 0..=LEVELS {
        while pos < hi && sigs[pos].level() < level {
            pos += 1;
        }
        index.push(pos);
    }
    index
}

/// Read a digest list: one printable ssdeep digest per line.
///
/// Surrounding whitespace is trimmed and blank lines are skipped; anything
/// else that does not parse as a digest is an error. The returned set is
/// deduplicated and ordered by blocksize ascending.
pub fn read_digest_file<P: AsRef<Path>>(path: P) -> Result<BTreeSet<RawFuzzyHash>> {
    let file = File::open(&path)?;
    read_digests(BufReader::new(file))
}

/// Read a digest list from any buffered reader. See [`read_digest_file`].
pub fn read_digests<R: BufRead>(reader: R) -> Result<BTreeSet<RawFuzzyHash>> {
    let mut digests = BTreeSet::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let digest: RawFuzzyHash = line
            .parse()
            .map_err(|source| ClusError::Parse { line: n + 1, source })?;
        digests.insert(digest);
    }
    info!(digests = digests.len(), "loaded digest set");
    Ok(digests)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(lines: &[&str]) -> BTreeSet<RawFuzzyHash> {
        lines.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_read_digests_dedups_and_sorts() {
        let input = "6:ABCDEFG:HIJ\n3:ABCDEFG:HIJ\n3:ABCDEFG:HIJ\n";
        let digests = read_digests(input.as_bytes()).unwrap();
        assert_eq!(digests.len(), 2);
        let levels: Vec<u8> = digests.iter().map(|d| d.log_block_size()).collect();
        assert_eq!(levels, vec![0, 1]);
    }

    #[test]
    fn test_read_digests_trims_and_skips_blank_lines() {
        let input = "  3:ABCDEFG:HIJ  \n\n\n6:ABCDEFG:HIJ\n";
        let digests = read_digests(input.as_bytes()).unwrap();
        assert_eq!(digests.len(), 2);
    }

    #[test]
    fn test_read_digests_reports_line_number() {
        let input = "3:ABCDEFG:HIJ\nnot a digest\n";
        let err = read_digests(input.as_bytes()).unwrap_err();
        match err {
            ClusError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blocksize_index_contract() {
        let store = DigestStore::from_digests(set(&[
            "3:ABCDEFG:HIJ",
            "3:ZYXWVUT:SRQ",
            "6:ABCDEFG:HIJ",
            "12:ABCDEFG:HIJ",
            "12:ZYXWVUT:SRQ",
        ]));
        // Level 0 holds two slots, level 1 one, level 2 two.
        assert_eq!(store.fresh_bucket(0), 0..2);
        assert_eq!(store.fresh_bucket(1), 2..3);
        assert_eq!(store.fresh_bucket(2), 3..5);
        // Unpopulated levels are empty ranges.
        for level in 3..LEVELS {
            assert!(store.fresh_bucket(level).is_empty());
        }
        // Slots of each level are exactly the indexed range.
        for level in 0..LEVELS {
            for i in store.fresh_bucket(level) {
                assert_eq!(store.sigs()[i].level(), level);
            }
        }
    }

    #[test]
    fn test_empty_store_index() {
        let store = DigestStore::from_digests(BTreeSet::new());
        assert!(store.is_empty());
        for level in 0..LEVELS {
            assert!(store.fresh_bucket(level).is_empty());
            assert!(store.base_bucket(level).is_empty());
        }
    }

    #[test]
    fn test_combined_store_layout() {
        let new = set(&["3:ABCDEFG:HIJ", "6:ABCDEFG:HIJ", "3:ZYXWVUT:SRQ"]);
        let existing = set(&["3:ABCDEFG:HIJ", "12:KLMNOPQ:RST"]);
        let store = DigestStore::from_new_and_existing(new, existing).unwrap();
        // "3:ABCDEFG:HIJ" is removed from the fresh span by set difference.
        assert_eq!(store.fresh_len(), 2);
        assert_eq!(store.len(), 4);
        assert!(store.has_base());
        // Both spans are independently sorted by blocksize.
        assert_eq!(store.sigs()[0].level(), 0);
        assert_eq!(store.sigs()[1].level(), 1);
        assert_eq!(store.sigs()[2].level(), 0);
        assert_eq!(store.sigs()[3].level(), 2);
        assert_eq!(store.base_bucket(0), 2..3);
        assert_eq!(store.base_bucket(2), 3..4);
    }

    #[test]
    fn test_all_new_digests_removed_by_difference() {
        let new = set(&["3:ABCDEFG:HIJ"]);
        let existing = set(&["3:ABCDEFG:HIJ", "3:ZYXWVUT:SRQ"]);
        let store = DigestStore::from_new_and_existing(new, existing).unwrap();
        assert_eq!(store.fresh_len(), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_clusters_skip_unassigned() {
        let store = DigestStore::from_digests(set(&[
            "3:ABCDEFG:HIJ",
            "3:ZYXWVUT:SRQ",
            "6:ABCDEFG:HIJ",
        ]));
        store.sigs()[0].set_label(2);
        store.sigs()[2].set_label(2);
        let clusters = store.clusters();
        assert_eq!(clusters, vec![vec![0, 2]]);
    }

    #[test]
    fn test_write_clusters_format() {
        let store = DigestStore::from_digests(set(&[
            "3:ABCDEFG:HIJ",
            "3:ZYXWVUT:SRQ",
            "6:ABCDEFG:HIJ",
            "6:ZYXWVUT:SRQ",
        ]));
        store.sigs()[0].set_label(5);
        store.sigs()[2].set_label(5);
        store.sigs()[1].set_label(3);
        store.sigs()[3].set_label(3);
        let mut out = Vec::new();
        store.write_clusters(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        // Label 3 group first, blank line between clusters and after the last.
        assert_eq!(
            text,
            "3:ZYXWVUT:SRQ\n6:ZYXWVUT:SRQ\n\n3:ABCDEFG:HIJ\n6:ABCDEFG:HIJ\n\n"
        );
    }

    #[test]
    fn test_write_clusters_empty_when_all_singletons() {
        let store = DigestStore::from_digests(set(&["3:ABCDEFG:HIJ"]));
        let mut out = Vec::new();
        store.write_clusters(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
