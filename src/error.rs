//! Error types for catalog loading, snapshot intake and the scheduler handle.
//!
//! Computational edge cases (zero prices, missing forecasts, empty categories)
//! are not errors; the analyzer resolves them with documented defaults.

use thiserror::Error;

/// Fatal load-time problems with the event catalog. No partial catalog is accepted.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("reading catalog from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing catalog: {0}")]
    Parse(String),

    #[error("event #{index} ({name}): malformed timestamp `{value}`")]
    MalformedTimestamp {
        index: usize,
        name: String,
        value: String,
    },

    #[error("event #{index} ({name}): unknown indicator `{value}`")]
    UnknownIndicator {
        index: usize,
        name: String,
        value: String,
    },

    #[error("event #{index} ({name}): unknown importance `{value}`")]
    UnknownImportance {
        index: usize,
        name: String,
        value: String,
    },

    #[error("duplicate event identity {0}")]
    DuplicateKey(String),
}

/// Structurally invalid snapshot input handed to the analyzer.
#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("snapshot must be a mapping of symbol to quote, got {0}")]
    NotAMapping(&'static str),

    #[error("snapshot entry `{0}` is not a mapping")]
    EntryNotAMapping(String),

    #[error("snapshot entry `{0}` has no numeric `price`")]
    MissingPrice(String),
}

/// Failures talking to the scheduler worker.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler worker is no longer running")]
    WorkerGone,

    #[error("scheduler did not stop within {0} ms")]
    StopTimeout(u64),
}
