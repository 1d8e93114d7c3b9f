//! Source record normalizer.
//!
//! Turns the two raw feed shapes, the location-keyed history blob and the
//! flat daily snapshot list, into canonical [`ConfirmationRecord`]s for one
//! country policy. Every candidate is decoded independently: a bad record
//! skips that record only, tallied as a [`Skip`] diagnostic, and never aborts
//! the batch.

use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::anchor;
use crate::country::CountryPolicy;
use crate::models::{ConfirmationRecord, GeoPoint, Level};

// ---

/// Why one candidate record was dropped during normalization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Skip {
    #[error("entry is not a decodable location object")]
    MalformedEntry,
    #[error("empty or missing name")]
    EmptyName,
    #[error("empty or missing country")]
    EmptyCountry,
    #[error("level {0:?} does not match the requested level")]
    LevelMismatch(String),
    #[error("cases count missing or not numeric")]
    MissingCases,
    #[error("unparseable report date {0:?}")]
    BadDate(String),
    #[error("report date earlier than the ingestion lower bound")]
    TooEarly,
}

/// Outcome of one normalization pass.
#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    /// Records that passed every validation step, ready for the store.
    pub records: Vec<ConfirmationRecord>,
    /// Raw entries that matched the country key, before per-record
    /// validation.
    pub raw_location_count: usize,
    /// Dropped candidates, one entry per skip.
    pub skipped: Vec<Skip>,
}

/// Location fields as the feed supplies them. Everything is optional so one
/// absent or oddly typed field never poisons a sibling entry; validation is
/// an explicit step, not a decode failure.
#[derive(Debug, Deserialize)]
struct RawLocation {
    name: Option<String>,
    country: Option<String>,
    state: Option<String>,
    county: Option<String>,
    city: Option<String>,
    level: Option<String>,
    #[serde(rename = "countryId")]
    country_id: Option<String>,
    #[serde(rename = "stateId")]
    state_id: Option<String>,
    #[serde(rename = "countyId")]
    county_id: Option<String>,
    coordinates: Option<Vec<f64>>,
    tz: Option<Vec<String>>,
    /// History shape: per-date count objects keyed by `YYYY-MM-DD`.
    #[serde(default)]
    dates: HashMap<String, Value>,
    /// Daily shape: the single inline snapshot.
    #[serde(flatten)]
    counts: RawCounts,
}

/// Count fields of one snapshot. `cases` stays a raw value so "present but
/// not numeric" is distinguishable from "absent" when validating.
#[derive(Debug, Deserialize)]
struct RawCounts {
    cases: Option<Value>,
    deaths: Option<Value>,
    recovered: Option<Value>,
    active: Option<Value>,
}

// ---

/// Normalize the location-keyed history blob for one country policy.
///
/// Every top-level entry whose key contains the policy match key counts
/// toward `raw_location_count`; each of its `dates` entries is one candidate
/// record. `not_earlier` drops candidates anchored strictly before the bound
/// (used to bound reprocessing windows).
pub fn normalize_history(
    raw: &serde_json::Map<String, Value>,
    policy: &CountryPolicy,
    not_earlier: Option<i64>,
) -> NormalizeOutcome {
    // ---
    let mut out = NormalizeOutcome::default();
    let now = Utc::now().timestamp();

    for (key, value) in raw {
        if !key.contains(policy.match_key) {
            continue;
        }
        out.raw_location_count += 1;

        let loc: RawLocation = match serde_json::from_value(value.clone()) {
            Ok(loc) => loc,
            Err(err) => {
                debug!("skip location {:?}: {}", key, err);
                out.skipped.push(Skip::MalformedEntry);
                continue;
            }
        };

        for (date, counts_value) in &loc.dates {
            match history_candidate(&loc, date, counts_value, policy.level, not_earlier, now) {
                Ok(record) => out.records.push(record),
                Err(skip) => {
                    debug!("skip {:?} {}: {}", key, date, skip);
                    out.skipped.push(skip);
                }
            }
        }
    }
    out
}

/// Normalize the flat daily snapshot list for one country policy. The report
/// date is today in each record's own zone; counts are the inline snapshot
/// values.
pub fn normalize_daily(raw: &[Value], policy: &CountryPolicy) -> NormalizeOutcome {
    // ---
    let mut out = NormalizeOutcome::default();
    let now = Utc::now().timestamp();

    for value in raw {
        let loc: RawLocation = match serde_json::from_value(value.clone()) {
            Ok(loc) => loc,
            Err(err) => {
                debug!("skip daily entry: {}", err);
                out.skipped.push(Skip::MalformedEntry);
                continue;
            }
        };
        // The daily list carries every location worldwide; only entries
        // named for this country are candidates.
        if !non_empty(&loc.name).is_some_and(|n| n.contains(policy.match_key)) {
            continue;
        }
        out.raw_location_count += 1;

        match daily_candidate(&loc, policy.level, now) {
            Ok(record) => out.records.push(record),
            Err(skip) => {
                debug!("skip daily {:?}: {}", loc.name, skip);
                out.skipped.push(skip);
            }
        }
    }
    out
}

// ---

/// One `dates` entry of one history location.
fn history_candidate(
    loc: &RawLocation,
    date: &str,
    counts_value: &Value,
    requested: Level,
    not_earlier: Option<i64>,
    now: i64,
) -> Result<ConfirmationRecord, Skip> {
    // ---
    let counts: RawCounts =
        serde_json::from_value(counts_value.clone()).map_err(|_| Skip::MalformedEntry)?;
    let mut record = build_base(loc, &counts, requested)?;

    let report_ts =
        anchor::anchor(date, &record.tz).map_err(|_| Skip::BadDate(date.to_string()))?;
    if let Some(bound) = not_earlier {
        if report_ts < bound {
            return Err(Skip::TooEarly);
        }
    }

    record.report_ts = report_ts;
    record.report_date = date.to_string();
    record.update_ts = now;
    Ok(record)
}

/// One daily snapshot.
fn daily_candidate(loc: &RawLocation, requested: Level, now: i64) -> Result<ConfirmationRecord, Skip> {
    // ---
    let mut record = build_base(loc, &loc.counts, requested)?;

    let (report_date, report_ts) = anchor::today_in_zone(&record.tz);
    record.report_ts = report_ts;
    record.report_date = report_date;
    record.update_ts = now;
    Ok(record)
}

/// Validation steps shared by both shapes: identity, level, geometry, and
/// count handling. Timestamps are stamped by the shape-specific callers.
fn build_base(
    loc: &RawLocation,
    counts: &RawCounts,
    requested: Level,
) -> Result<ConfirmationRecord, Skip> {
    // ---
    let name = non_empty(&loc.name).ok_or(Skip::EmptyName)?.to_string();
    let country = non_empty(&loc.country).ok_or(Skip::EmptyCountry)?.to_string();

    let level = resolve_level(loc)?;
    if level != requested {
        return Err(Skip::LevelMismatch(level.as_str().to_string()));
    }

    let location = match &loc.coordinates {
        Some(coords) if !coords.is_empty() => GeoPoint::new(coords.clone()),
        _ => GeoPoint::default(),
    };
    let tz = match &loc.tz {
        Some(tz) if !tz.is_empty() => tz.clone(),
        _ => Vec::new(),
    };

    let cases = counts
        .cases
        .as_ref()
        .and_then(Value::as_f64)
        .ok_or(Skip::MissingCases)?;
    let deaths = numeric_or_zero(&counts.deaths).max(0.0);
    let recovered = numeric_or_zero(&counts.recovered).max(0.0);
    // An absent or non-positive active count is derived from the others.
    let active = match counts.active.as_ref().and_then(Value::as_f64) {
        Some(active) if active > 0.0 => active,
        _ => cases - deaths - recovered,
    };

    Ok(ConfirmationRecord {
        name,
        city: loc.city.clone().unwrap_or_default(),
        county: loc.county.clone().unwrap_or_default(),
        state: loc.state.clone().unwrap_or_default(),
        country,
        level,
        cases,
        deaths,
        recovered,
        active,
        report_ts: 0,
        update_ts: 0,
        report_date: String::new(),
        country_id: loc.country_id.clone().unwrap_or_default(),
        state_id: loc.state_id.clone().unwrap_or_default(),
        county_id: loc.county_id.clone().unwrap_or_default(),
        location,
        tz,
    })
}

/// Level resolution: an explicit non-empty source level wins verbatim; an
/// explicit level outside the recognized set can never match the requested
/// one. Otherwise infer from the identity fields, broadest first.
fn resolve_level(loc: &RawLocation) -> Result<Level, Skip> {
    // ---
    if let Some(explicit) = non_empty(&loc.level) {
        return Level::parse(explicit).ok_or_else(|| Skip::LevelMismatch(explicit.to_string()));
    }
    let level = if non_empty(&loc.state).is_none() {
        Level::Country
    } else if non_empty(&loc.county).is_none() {
        Level::State
    } else if non_empty(&loc.city).is_none() {
        Level::County
    } else {
        Level::City
    };
    Ok(level)
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

fn numeric_or_zero(field: &Option<Value>) -> f64 {
    field.as_ref().and_then(Value::as_f64).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::country;
    use serde_json::json;

    fn us_policy() -> &'static CountryPolicy {
        country::policy_for("United States").unwrap()
    }

    fn taiwan_policy() -> &'static CountryPolicy {
        country::policy_for("Taiwan").unwrap()
    }

    fn history_map(value: Value) -> serde_json::Map<String, Value> {
        // ---
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn county_entry() -> Value {
        // ---
        json!({
            "name": "Hillsborough County, Florida, United States",
            "country": "United States",
            "state": "Florida",
            "county": "Hillsborough County",
            "city": "",
            "level": "county",
            "countryId": "iso1:US",
            "stateId": "iso2:US-FL",
            "countyId": "fips:12057",
            "coordinates": [-82.3, 27.9],
            "tz": ["America/New_York"],
            "dates": {
                "2020-03-01": { "cases": 2, "deaths": 0, "recovered": 0, "active": 2 },
                "2020-03-02": { "cases": 5, "deaths": 1, "recovered": -3 }
            }
        })
    }

    #[test]
    fn history_emits_one_record_per_date() {
        // ---
        let raw = history_map(json!({
            "Hillsborough County, Florida, United States": county_entry(),
        }));
        let out = normalize_history(&raw, us_policy(), None);

        assert_eq!(out.raw_location_count, 1);
        assert_eq!(out.records.len(), 2);
        assert!(out.skipped.is_empty());

        let second = out
            .records
            .iter()
            .find(|r| r.report_date == "2020-03-02")
            .unwrap();
        assert_eq!(second.cases, 5.0);
        assert_eq!(second.deaths, 1.0);
        // Negative source counts clamp to zero.
        assert_eq!(second.recovered, 0.0);
        // Absent active derives from the clamped counts.
        assert_eq!(second.active, 5.0 - 1.0 - 0.0);
        assert_eq!(second.level, Level::County);
        // Anchored at local midnight: New York is UTC-5 on that date.
        assert_eq!(
            second.report_ts,
            crate::anchor::anchor("2020-03-02", &second.tz).unwrap()
        );
        assert!(second.update_ts > 0);
    }

    #[test]
    fn entries_outside_the_match_key_are_not_counted() {
        // ---
        let raw = history_map(json!({
            "Hsinchu County, Taiwan": {
                "name": "Hsinchu County, Taiwan",
                "country": "Taiwan",
                "dates": { "2020-03-01": { "cases": 1 } }
            },
            "Hillsborough County, Florida, United States": county_entry(),
        }));
        let out = normalize_history(&raw, us_policy(), None);
        assert_eq!(out.raw_location_count, 1);
        assert!(out.records.iter().all(|r| r.country == "United States"));
    }

    #[test]
    fn level_mismatches_are_dropped_not_fatal() {
        // ---
        // A state-level entry in a county-level pass is skipped per date.
        let raw = history_map(json!({
            "Florida, United States": {
                "name": "Florida, United States",
                "country": "United States",
                "state": "Florida",
                "dates": { "2020-03-01": { "cases": 100 } }
            },
            "Hillsborough County, Florida, United States": county_entry(),
        }));
        let out = normalize_history(&raw, us_policy(), None);
        assert_eq!(out.raw_location_count, 2);
        assert_eq!(out.records.len(), 2);
        assert_eq!(
            out.skipped,
            vec![Skip::LevelMismatch("state".to_string())]
        );
    }

    #[test]
    fn level_is_inferred_when_the_source_omits_it() {
        // ---
        let raw = history_map(json!({
            "Taiwan": {
                "name": "Taiwan",
                "country": "Taiwan",
                "dates": { "2020-03-01": { "cases": 40 } }
            }
        }));
        let out = normalize_history(&raw, taiwan_policy(), None);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].level, Level::Country);
    }

    #[test]
    fn unrecognized_explicit_levels_cannot_match() {
        // ---
        let raw = history_map(json!({
            "Taiwan": {
                "name": "Taiwan",
                "country": "Taiwan",
                "level": "zipcode",
                "dates": { "2020-03-01": { "cases": 40 } }
            }
        }));
        let out = normalize_history(&raw, taiwan_policy(), None);
        assert!(out.records.is_empty());
        assert_eq!(out.skipped, vec![Skip::LevelMismatch("zipcode".to_string())]);
    }

    #[test]
    fn missing_identity_fields_skip_the_candidate() {
        // ---
        let raw = history_map(json!({
            "United States somewhere": {
                "country": "United States",
                "county": "Nowhere County",
                "state": "Florida",
                "dates": { "2020-03-01": { "cases": 1 } }
            },
            "United States elsewhere": {
                "name": "Elsewhere",
                "country": "",
                "dates": { "2020-03-01": { "cases": 1 } }
            }
        }));
        let out = normalize_history(&raw, us_policy(), None);
        assert_eq!(out.raw_location_count, 2);
        assert!(out.records.is_empty());
        assert_eq!(out.skipped.len(), 2);
        assert!(out.skipped.contains(&Skip::EmptyName));
        assert!(out.skipped.contains(&Skip::EmptyCountry));
    }

    #[test]
    fn non_numeric_cases_skip_only_that_date() {
        // ---
        let raw = history_map(json!({
            "Taiwan": {
                "name": "Taiwan",
                "country": "Taiwan",
                "dates": {
                    "2020-03-01": { "cases": "not a number" },
                    "2020-03-02": { "cases": 7 }
                }
            }
        }));
        let out = normalize_history(&raw, taiwan_policy(), None);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].report_date, "2020-03-02");
        assert_eq!(out.skipped, vec![Skip::MissingCases]);
    }

    #[test]
    fn unparseable_dates_skip_only_that_date() {
        // ---
        let raw = history_map(json!({
            "Taiwan": {
                "name": "Taiwan",
                "country": "Taiwan",
                "dates": {
                    "03/01/2020": { "cases": 3 },
                    "2020-03-02": { "cases": 7 }
                }
            }
        }));
        let out = normalize_history(&raw, taiwan_policy(), None);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.skipped, vec![Skip::BadDate("03/01/2020".to_string())]);
    }

    #[test]
    fn not_earlier_bound_drops_older_dates() {
        // ---
        let raw = history_map(json!({
            "Taiwan": {
                "name": "Taiwan",
                "country": "Taiwan",
                "dates": {
                    "2020-03-01": { "cases": 3 },
                    "2020-03-10": { "cases": 7 }
                }
            }
        }));
        let bound = crate::anchor::anchor("2020-03-05", &[]).unwrap();
        let out = normalize_history(&raw, taiwan_policy(), Some(bound));
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].report_date, "2020-03-10");
        assert_eq!(out.skipped, vec![Skip::TooEarly]);
    }

    #[test]
    fn explicit_positive_active_is_preserved() {
        // ---
        let raw = history_map(json!({
            "Taiwan": {
                "name": "Taiwan",
                "country": "Taiwan",
                "dates": {
                    "2020-03-01": { "cases": 50, "deaths": 1, "recovered": 20, "active": 29 },
                    "2020-03-02": { "cases": 50, "deaths": 1, "recovered": 20, "active": 0 }
                }
            }
        }));
        let out = normalize_history(&raw, taiwan_policy(), None);
        let by_date = |date: &str| {
            out.records
                .iter()
                .find(|r| r.report_date == date)
                .unwrap()
        };
        assert_eq!(by_date("2020-03-01").active, 29.0);
        // An explicit zero is overwritten by the derived value.
        assert_eq!(by_date("2020-03-02").active, 29.0);
    }

    #[test]
    fn missing_geometry_defaults_to_an_empty_point() {
        // ---
        let raw = history_map(json!({
            "Taiwan": {
                "name": "Taiwan",
                "country": "Taiwan",
                "dates": { "2020-03-01": { "cases": 3 } }
            }
        }));
        let out = normalize_history(&raw, taiwan_policy(), None);
        let record = &out.records[0];
        assert_eq!(record.location, GeoPoint::default());
        assert!(record.tz.is_empty());
    }

    #[test]
    fn daily_snapshots_are_stamped_with_today() {
        // ---
        let raw = vec![
            json!({
                "name": "Taiwan",
                "country": "Taiwan",
                "tz": ["Asia/Taipei"],
                "cases": 153, "deaths": 2, "recovered": 28, "active": 123
            }),
            json!({
                "name": "Iceland",
                "country": "Iceland",
                "cases": 890
            }),
        ];
        let out = normalize_daily(&raw, taiwan_policy());

        assert_eq!(out.raw_location_count, 1);
        assert_eq!(out.records.len(), 1);
        let record = &out.records[0];
        assert_eq!(record.name, "Taiwan");
        assert_eq!(record.cases, 153.0);
        assert_eq!(record.active, 123.0);

        let (expected_date, expected_ts) =
            crate::anchor::today_in_zone(&["Asia/Taipei".to_string()]);
        assert_eq!(record.report_date, expected_date);
        assert_eq!(record.report_ts, expected_ts);
    }

    #[test]
    fn daily_entries_missing_cases_are_skipped() {
        // ---
        let raw = vec![json!({
            "name": "Taiwan",
            "country": "Taiwan"
        })];
        let out = normalize_daily(&raw, taiwan_policy());
        assert!(out.records.is_empty());
        assert_eq!(out.skipped, vec![Skip::MissingCases]);
    }
}
