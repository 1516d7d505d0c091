//! Cluster label registry: direct labeling with a global union lock.
//!
//! Labels are not classical union-find parent pointers. Each slot carries a
//! plain cluster id and merging two live clusters rewrites every slot of the
//! donor id. The linear relabel is rare in practice (each occurrence kills
//! one id for good), so a single mutex around the allocator and all label
//! writes is cheap and makes every join linearizable.

use crate::store::DigestStore;
use std::sync::Mutex;
use tracing::debug;

/// Shared label registry for one clustering run.
///
/// All label writes, and all reads that inform a join decision, happen under
/// the internal mutex. Reads outside the lock ([`LabelSet::same`]) are
/// best-effort and serve only the fast-skip optimization.
pub struct LabelSet<'a> {
    store: &'a DigestStore,
    /// Next cluster id to allocate. Ids start at 1 and are never reused;
    /// 0 means "unassigned".
    next_id: Mutex<usize>,
}

impl<'a> LabelSet<'a> {
    /// Create a registry over a store whose labels are all zero.
    #[must_use]
    pub fn new(store: &'a DigestStore) -> Self {
        Self {
            store,
            next_id: Mutex::new(1),
        }
    }

    /// Best-effort check whether two slots already share a cluster.
    ///
    /// May race with concurrent joins; a false negative only costs one
    /// redundant comparison, never correctness.
    #[inline]
    pub fn same(&self, a: usize, b: usize) -> bool {
        let sigs = self.store.sigs();
        let la = sigs[a].label();
        let lb = sigs[b].label();
        lb != 0 && la == lb
    }

    /// Join the clusters of slots `a` and `b`.
    pub fn join(&self, a: usize, b: usize) {
        let mut next_id = self.next_id.lock().unwrap();
        let sigs = self.store.sigs();
        let la = sigs[a].label();
        let lb = sigs[b].label();
        if la == 0 && lb == 0 {
            let id = *next_id;
            *next_id += 1;
            sigs[a].set_label(id);
            sigs[b].set_label(id);
        } else if la != 0 && lb == 0 {
            sigs[b].set_label(la);
        } else if la == 0 && lb != 0 {
            sigs[a].set_label(lb);
        } else if la != lb {
            // Two live clusters: absorb `la` into `lb`, retiring `la`.
            debug!(from = la, into = lb, "merging live clusters");
            for sig in sigs {
                if sig.label() == la {
                    sig.set_label(lb);
                }
            }
        }
    }
}
