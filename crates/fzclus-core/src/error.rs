//! Error types for fzclus.

use thiserror::Error;

/// Result type alias for fzclus operations.
pub type Result<T> = std::result::Result<T, ClusError>;

/// Errors that can occur while loading digests or preparing a clustering run.
///
/// Every variant is fatal to the process: the tools report the error on
/// standard error and exit without producing partial output. Once a run has
/// been validated and started, the clustering engine itself cannot fail.
#[derive(Error, Debug)]
pub enum ClusError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A digest line could not be parsed.
    #[error("cannot parse digest at line {line}: {source}")]
    Parse {
        /// 1-based line number in the input.
        line: usize,
        /// Parse failure reported by the digest library.
        source: ssdeep::ParseError,
    },

    /// A size computation would overflow.
    #[error("capacity exceeded: {0}")]
    Capacity(String),

    /// Invalid run configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
