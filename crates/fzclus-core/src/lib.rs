//! # fzclus-core
//!
//! Parallel approximate-match clustering of ssdeep digests.
//!
//! Groups fuzzy digests whose pairwise similarity score exceeds a threshold
//! into equivalence classes. Provides:
//! - a digest store with blocksize-indexed candidate pruning
//! - a multi-threaded clustering engine over shared labels
//! - an incremental combine mode that extends an existing clustering
//! - a text-level combiner that merges clusterings from independent runs
//!
//! Digest parsing, ordering and scoring come from the `ffuzzy` crate
//! (imported as `ssdeep`); this crate treats scores as opaque values in
//! `[0, 100]`.

pub mod combine;
pub mod engine;
pub mod error;
pub mod intern;
pub mod labels;
pub mod store;

pub use combine::TextCombiner;
pub use engine::{cluster, ClusterConfig, ClusterStats, DEFAULT_THRESHOLD};
pub use error::{ClusError, Result};
pub use store::{read_digest_file, read_digests, DigestStore, FileSig};
