//! Application entry point for the `caseflow` pipeline.
//!
//! This binary orchestrates one full pipeline run, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool
//! - Ingesting the scraper's history blob for every supported country
//! - Pulling the daily correction feed when one is configured
//! - Scoring a configured location's history and exporting it as CSV
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `DB_POOL_MAX` (optional) – maximum number of DB connections (default: 5)
//! - `DATA_DIR` (optional) – feed/export directory (default: `data`)
//! - `DAILY_FEED_URL` (optional) – daily snapshot feed URL
//! - `SCORE_COUNTRY`/`SCORE_STATE`/`SCORE_COUNTY` (optional) – score target
//! - `CASEFLOW_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `CASEFLOW_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! Configuration parsing lives in `config`, the pipeline stages in the
//! library crate; this module only wires them together.

use std::{env, io::IsTerminal};

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

use caseflow::{analysis, config, feed};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    tracing::info!("Successfully connected to database");

    analysis::ingest_history(&pool, &cfg).await?;

    if let Some(url) = &cfg.daily_feed_url {
        let raw = feed::fetch_daily_online(url, cfg.feed_max_bytes).await?;
        analysis::ingest_daily(&pool, &raw).await?;
    }

    if let Some(loc) = cfg.score_location() {
        let points = analysis::score_all_time(&pool, &loc).await?;
        if let Some(path) = analysis::save_scores_csv(&cfg.data_dir, &points)? {
            tracing::info!("score export written to {}", path.display());
        }
    }

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `CASEFLOW_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `CASEFLOW_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked. It installs the subscriber globally
/// for the lifetime of the process.
fn init_tracing() {
    // ---
    let span_events = match env::var("CASEFLOW_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to CASEFLOW_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("CASEFLOW_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
