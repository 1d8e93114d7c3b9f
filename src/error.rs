//! Error taxonomy for the confirmed-case pipeline.
//!
//! Per-record normalization problems are deliberately *not* here: they are
//! skip diagnostics tallied by the normalizer and never abort a batch. These
//! variants cover the feed and store boundaries, where a failure ends the
//! current location's run.

use thiserror::Error;

// ---

/// Errors surfaced across the pipeline boundary.
#[derive(Debug, Error)]
pub enum ConfirmError {
    /// The requested country has no confirmed-case dataset, or a USA query
    /// is missing its state/county narrowing.
    #[error("no confirmed-case dataset for the requested location")]
    NoDataset,

    /// The raw feed violated a structural assumption (shape-level
    /// corruption, as opposed to a single bad record).
    #[error("invalid confirmed-case feed: {0}")]
    InvalidDataset(String),

    /// A window read against the store failed or timed out. The underlying
    /// cause is logged where it occurs.
    #[error("fetch confirmed-case data failed")]
    DataFetch,

    /// A stored row could not be decoded back into canonical form.
    #[error("decode confirmed-case record failed")]
    Decode(#[source] sqlx::Error),

    /// A write hit the unique `(name, report_ts)` constraint. The bulk
    /// insert path swallows this as "already ingested".
    #[error("confirmed-case record already stored")]
    DuplicateRecord,

    /// A non-duplicate store write failure; aborts the current
    /// collection's run.
    #[error("write confirmed-case records failed")]
    StoreWrite(#[source] sqlx::Error),
}
