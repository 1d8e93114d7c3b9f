//! Raw feed transport: local files and the size-capped daily HTTP path.
//!
//! These loaders only establish the top-level shape (a location-keyed
//! object for history, a snapshot list for daily) and hand the untyped
//! entries to the normalizer. A shape mismatch here is feed corruption
//! ([`ConfirmError::InvalidDataset`]), not a per-record skip.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ConfirmError;

/// Upper bound on a daily HTTP feed body, in bytes.
pub const FEED_MAX_BYTES: u64 = 5 * 1024 * 1024;

// ---

/// Load the location-keyed history blob from a local file.
pub fn load_history_file(path: &Path) -> Result<serde_json::Map<String, Value>> {
    // ---
    let file = File::open(path).with_context(|| format!("open history feed {}", path.display()))?;
    let raw: Value = serde_json::from_reader(BufReader::new(file))
        .map_err(|err| ConfirmError::InvalidDataset(format!("history feed is not valid JSON: {}", err)))?;
    match raw {
        Value::Object(map) => {
            info!("history feed: {} raw locations", map.len());
            Ok(map)
        }
        other => Err(ConfirmError::InvalidDataset(format!(
            "history feed must be a location-keyed object, got {}",
            json_kind(&other)
        ))
        .into()),
    }
}

/// Load a daily snapshot list from a local file.
pub fn load_daily_file(path: &Path) -> Result<Vec<Value>> {
    // ---
    let file = File::open(path).with_context(|| format!("open daily feed {}", path.display()))?;
    let raw: Value = serde_json::from_reader(BufReader::new(file))
        .map_err(|err| ConfirmError::InvalidDataset(format!("daily feed is not valid JSON: {}", err)))?;
    daily_list(raw)
}

/// Download the daily snapshot list, refusing bodies larger than
/// `max_bytes`.
pub async fn fetch_daily_online(url: &str, max_bytes: u64) -> Result<Vec<Value>> {
    // ---
    debug!("fetching daily feed from {}", url);
    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("fetch daily feed {}", url))?;

    if let Some(length) = response.content_length() {
        if length > max_bytes {
            return Err(ConfirmError::InvalidDataset(format!(
                "daily feed advertises {} bytes, cap is {}",
                length, max_bytes
            ))
            .into());
        }
    }

    let body = response.bytes().await.context("read daily feed body")?;
    if body.len() as u64 > max_bytes {
        return Err(ConfirmError::InvalidDataset(format!(
            "daily feed body is {} bytes, cap is {}",
            body.len(),
            max_bytes
        ))
        .into());
    }
    info!("daily feed: {} bytes", body.len());

    let raw: Value = serde_json::from_slice(&body)
        .map_err(|err| ConfirmError::InvalidDataset(format!("daily feed is not valid JSON: {}", err)))?;
    daily_list(raw)
}

fn daily_list(raw: Value) -> Result<Vec<Value>> {
    // ---
    match raw {
        Value::Array(items) => {
            info!("daily feed: {} snapshot entries", items.len());
            Ok(items)
        }
        other => Err(ConfirmError::InvalidDataset(format!(
            "daily feed must be a snapshot list, got {}",
            json_kind(&other)
        ))
        .into()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    // ---
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
