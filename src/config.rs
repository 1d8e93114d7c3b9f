//! Configuration loader for the `caseflow` pipeline.
//!
//! This module centralizes all runtime configuration values and their
//! defaults, loading from environment variables (with optional `.env` file
//! support provided by the caller). Consolidating configuration here keeps
//! `env::var` calls out of the rest of the codebase: the pipeline receives
//! one immutable snapshot as a parameter instead of reading ambient state.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::feed;
use crate::models::PoliticalLocation;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_int {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional integer environment variable with no default.
macro_rules! parse_env_int_opt {
    ($var_name:expr, $ty:ty) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent
/// configuration snapshot for the lifetime of the pipeline run.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Directory holding the history blob and receiving score exports.
    pub data_dir: PathBuf,

    /// Daily snapshot feed URL; the daily correction run is skipped when
    /// unset.
    pub daily_feed_url: Option<String>,

    /// Maximum accepted daily feed body, in bytes.
    pub feed_max_bytes: u64,

    /// Ingestion lower bound: history candidates anchored strictly earlier
    /// are dropped.
    pub history_not_earlier: Option<i64>,

    /// Location to score after ingestion; scoring is skipped when no
    /// country is set.
    pub score_country: Option<String>,
    pub score_state: String,
    pub score_county: String,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `DATA_DIR` – feed/export directory (default: `data`)
/// - `DAILY_FEED_URL` – daily snapshot feed to pull after the history run
/// - `FEED_MAX_BYTES` – daily feed size cap (default: 5 MiB)
/// - `HISTORY_NOT_EARLIER` – epoch-second lower bound for history records
/// - `SCORE_COUNTRY` / `SCORE_STATE` / `SCORE_COUNTY` – location to score
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env_int!("DB_POOL_MAX", u32, 5);
    let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
    let daily_feed_url = env::var("DAILY_FEED_URL").ok().filter(|v| !v.is_empty());
    let feed_max_bytes = parse_env_int!("FEED_MAX_BYTES", u64, feed::FEED_MAX_BYTES);
    let history_not_earlier = parse_env_int_opt!("HISTORY_NOT_EARLIER", i64);
    let score_country = env::var("SCORE_COUNTRY").ok().filter(|v| !v.is_empty());
    let score_state = env::var("SCORE_STATE").unwrap_or_default();
    let score_county = env::var("SCORE_COUNTY").unwrap_or_default();

    Ok(Config {
        db_url,
        db_pool_max,
        data_dir,
        daily_feed_url,
        feed_max_bytes,
        history_not_earlier,
        score_country,
        score_state,
        score_county,
    })
}

impl Config {
    /// The location to score after ingestion, when one is configured.
    pub fn score_location(&self) -> Option<PoliticalLocation> {
        // ---
        self.score_country.as_ref().map(|country| {
            PoliticalLocation::new(country, &self.score_state, &self.score_county)
        })
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords while showing
    /// all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        // Mask the password in the database URL for security
        let masked_db_url = if let Some(at_pos) = self.db_url.rfind('@') {
            if let Some(colon_pos) = self.db_url[..at_pos].rfind(':') {
                format!(
                    "{}:****{}",
                    &self.db_url[..colon_pos],
                    &self.db_url[at_pos..]
                )
            } else {
                self.db_url.clone()
            }
        } else {
            self.db_url.clone()
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL        : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX         : {}", self.db_pool_max);
        tracing::info!("  DATA_DIR            : {}", self.data_dir.display());
        tracing::info!("  DAILY_FEED_URL      : {:?}", self.daily_feed_url);
        tracing::info!("  FEED_MAX_BYTES      : {}", self.feed_max_bytes);
        tracing::info!("  HISTORY_NOT_EARLIER : {:?}", self.history_not_earlier);
        tracing::info!("  SCORE_COUNTRY       : {:?}", self.score_country);
    }
}
