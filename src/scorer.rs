//! Exponential trend scorer.
//!
//! Converts a window of day-over-day case deltas into a single 0–100 trend
//! score. Weights grow as `e^((i+1)/2)` across the window so the newest days
//! dominate; the `+1` in the denominator keeps an all-zero window finite.
//! A score near 0 means sustained growth, near 100 sustained decline.

use serde::Serialize;

use crate::models::{Level, PoliticalLocation};
use crate::window::WindowSample;

/// Samples per scoring window: two weeks of daily deltas.
pub const DEFAULT_WINDOW_SIZE: usize = 14;

// ---

/// One scored point for a location: the newest sample's identity plus the
/// weighted trend score. Constructed per scoring call, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreDataPoint {
    pub name: String,
    pub report_ts: i64,
    pub report_date: String,
    pub score: f64,
    pub country: String,
    pub state: String,
    pub county: String,
    pub level: Level,
}

/// Score one delta window. An empty window scores nothing. A window shorter
/// than `target_window` is left-padded with synthetic zero-delta days so the
/// real samples keep the heaviest weights; the returned point is labeled
/// with the newest real sample regardless of padding.
pub fn score(
    loc: &PoliticalLocation,
    level: Level,
    samples: &[WindowSample],
    target_window: usize,
) -> Option<ScoreDataPoint> {
    // ---
    let last = samples.last()?;

    let padding = target_window.saturating_sub(samples.len());
    let deltas = std::iter::repeat(0.0)
        .take(padding)
        .chain(samples.iter().map(|sample| sample.delta_cases));

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (idx, delta) in deltas.enumerate() {
        let weight = ((idx as f64 + 1.0) / 2.0).exp();
        numerator += weight * delta;
        denominator += weight * (delta + 1.0);
    }

    let score = if denominator == 0.0 {
        0.0
    } else {
        (1.0 - numerator / denominator) * 100.0
    };

    Some(ScoreDataPoint {
        name: last.name.clone(),
        report_ts: last.report_ts,
        report_date: last.report_date.clone(),
        score,
        country: loc.country.clone(),
        state: loc.state.clone(),
        county: loc.county.clone(),
        level,
    })
}
