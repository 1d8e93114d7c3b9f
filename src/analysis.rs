//! Pipeline orchestration: ingestion runs, the all-time score sweep, and
//! CSV export of scored points.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::anchor;
use crate::config::Config;
use crate::country::{self, CountryPolicy};
use crate::error::ConfirmError;
use crate::feed;
use crate::models::PoliticalLocation;
use crate::normalize;
use crate::scorer::{self, ScoreDataPoint, DEFAULT_WINDOW_SIZE};
use crate::store;
use crate::window;

/// File name of the scraper's history blob inside the data directory.
pub const HISTORY_FILE: &str = "timeseries-byLocation.json";

// ---

/// Ingest the history blob for every supported country. A country whose run
/// fails is logged and skipped; the others still ingest.
pub async fn ingest_history(pool: &PgPool, cfg: &Config) -> Result<()> {
    // ---
    let path = cfg.data_dir.join(HISTORY_FILE);
    let raw = feed::load_history_file(&path)?;

    for policy in country::SUPPORTED {
        if let Err(err) =
            ingest_history_country(pool, &raw, policy, cfg.history_not_earlier).await
        {
            error!("{} history ingestion failed: {}", policy.name, err);
        }
    }
    Ok(())
}

async fn ingest_history_country(
    pool: &PgPool,
    raw: &serde_json::Map<String, serde_json::Value>,
    policy: &CountryPolicy,
    not_earlier: Option<i64>,
) -> Result<(), ConfirmError> {
    // ---
    let outcome = normalize::normalize_history(raw, policy, not_earlier);
    info!(
        "{}: {} records from {} raw locations ({} skipped)",
        policy.name,
        outcome.records.len(),
        outcome.raw_location_count,
        outcome.skipped.len()
    );

    // The uniqueness constraint must exist before this collection's
    // records go in.
    store::ensure_collection(pool, policy.collection).await?;
    store::bulk_insert(pool, &outcome.records, policy.collection).await?;
    Ok(())
}

/// Ingest one daily snapshot batch through the correction path: rows whose
/// `(name, report_ts)` is already stored are fully replaced.
pub async fn ingest_daily(pool: &PgPool, raw: &[serde_json::Value]) -> Result<()> {
    // ---
    for policy in country::SUPPORTED {
        if let Err(err) = ingest_daily_country(pool, raw, policy).await {
            error!("{} daily ingestion failed: {}", policy.name, err);
        }
    }
    Ok(())
}

async fn ingest_daily_country(
    pool: &PgPool,
    raw: &[serde_json::Value],
    policy: &CountryPolicy,
) -> Result<(), ConfirmError> {
    // ---
    let outcome = normalize::normalize_daily(raw, policy);
    info!(
        "{}: {} daily records ({} skipped)",
        policy.name,
        outcome.records.len(),
        outcome.skipped.len()
    );
    if outcome.records.is_empty() {
        return Ok(());
    }

    store::ensure_collection(pool, policy.collection).await?;
    store::upsert_replace(pool, &outcome.records, policy.collection).await?;
    Ok(())
}

/// Score a location's full history, one point per report day, newest first.
///
/// Each pass reads a fourteen-day window bounded at `not_after`, scores it,
/// then steps the bound to one second before the newest scored report. The
/// sweep ends when a window comes back empty; a read error ends it early
/// with the points gathered so far.
pub async fn score_all_time(
    pool: &PgPool,
    loc: &PoliticalLocation,
) -> Result<Vec<ScoreDataPoint>, ConfirmError> {
    // ---
    let policy = window::resolve_policy(loc)?;
    let mut not_after = anchor::today_start_utc();
    let mut points = Vec::new();

    loop {
        let samples = match window::continuous_window(
            pool,
            loc,
            DEFAULT_WINDOW_SIZE as i64,
            Some(not_after),
        )
        .await
        {
            Ok(samples) => samples,
            Err(err) => {
                warn!("score sweep stopped at {}: {}", not_after, err);
                break;
            }
        };
        let Some(point) = scorer::score(loc, policy.level, &samples, DEFAULT_WINDOW_SIZE) else {
            break;
        };
        not_after = point.report_ts - 1;
        points.push(point);
    }

    info!("scored {} points for {}", points.len(), loc.country);
    Ok(points)
}

/// Write scored points as CSV under `dir`, named after the first point.
/// Returns the written path, or `None` when there is nothing to write.
pub fn save_scores_csv(dir: &Path, points: &[ScoreDataPoint]) -> Result<Option<PathBuf>> {
    // ---
    let Some(first) = points.first() else {
        return Ok(None);
    };

    let path = dir.join(format!("{}{}.csv", first.name, first.report_date));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("create score export {}", path.display()))?;

    writer.write_record([
        "name", "date", "timestamp", "score", "country", "state", "county", "level",
    ])?;
    for point in points {
        let timestamp = point.report_ts.to_string();
        let score = format!("{:.6}", point.score);
        writer.write_record([
            point.name.as_str(),
            point.report_date.as_str(),
            timestamp.as_str(),
            score.as_str(),
            point.country.as_str(),
            point.state.as_str(),
            point.county.as_str(),
            point.level.as_str(),
        ])?;
    }
    writer.flush().context("flush score export")?;

    info!("wrote {} scored points to {}", points.len(), path.display());
    Ok(Some(path))
}
