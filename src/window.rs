//! Continuous window reader.
//!
//! Reconstructs a bounded, time-ordered slice of one location's confirmation
//! history and reduces it to day-over-day case deltas for the scorer.

use sqlx::PgPool;

use crate::country::{self, CountryPolicy};
use crate::error::ConfirmError;
use crate::models::PoliticalLocation;
use crate::store::{self, CaseRow};

// ---

/// One day-over-day delta in a location's window. Transient: produced here,
/// consumed by the scorer, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSample {
    pub name: String,
    /// Cases added since the previous report. A window holding a single
    /// stored record carries that record's cumulative count verbatim.
    pub delta_cases: f64,
    pub report_ts: i64,
    pub report_date: String,
}

/// Resolve the strategy for a location, enforcing its filter requirements.
pub(crate) fn resolve_policy(
    loc: &PoliticalLocation,
) -> Result<&'static CountryPolicy, ConfirmError> {
    // ---
    let policy = country::policy_for(&loc.country).ok_or(ConfirmError::NoDataset)?;
    if policy.requires_state_county && (loc.state.is_empty() || loc.county.is_empty()) {
        return Err(ConfirmError::NoDataset);
    }
    Ok(policy)
}

/// Read a window of at most `size` day-over-day samples for `loc`, newest
/// report no later than `not_after` when supplied. Fetches `size + 1`
/// records so the oldest can anchor the final delta.
pub async fn continuous_window(
    pool: &PgPool,
    loc: &PoliticalLocation,
    size: i64,
    not_after: Option<i64>,
) -> Result<Vec<WindowSample>, ConfirmError> {
    // ---
    let policy = resolve_policy(loc)?;
    let filter = policy
        .requires_state_county
        .then(|| (loc.state.as_str(), loc.county.as_str()));
    let rows = store::fetch_window(pool, policy.collection, filter, not_after, size + 1).await?;
    Ok(reduce_deltas(rows))
}

/// Collapse a most-recent-first record run into deltas, oldest-to-newest.
///
/// Scanning newest to oldest, each adjacent pair emits `newer − older`
/// stamped with the newer record's identity; the oldest fetched record only
/// anchors the final delta and is never itself emitted. A run of exactly one
/// record is emitted verbatim instead; there is nothing to subtract.
fn reduce_deltas(rows: Vec<CaseRow>) -> Vec<WindowSample> {
    // ---
    let mut samples = Vec::new();
    let mut current: Option<CaseRow> = None;
    for row in rows {
        if let Some(newer) = current {
            samples.insert(
                0,
                WindowSample {
                    name: newer.name,
                    delta_cases: newer.cases - row.cases,
                    report_ts: newer.report_ts,
                    report_date: newer.report_date,
                },
            );
        }
        current = Some(row);
    }
    if samples.is_empty() {
        if let Some(only) = current {
            samples.push(WindowSample {
                name: only.name,
                delta_cases: only.cases,
                report_ts: only.report_ts,
                report_date: only.report_date,
            });
        }
    }
    samples
}
