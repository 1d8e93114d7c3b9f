//! Canonical data models for the confirmed-case pipeline.

use serde::{Deserialize, Serialize};

// ---

/// Administrative granularity of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Country,
    State,
    County,
    City,
}

impl Level {
    // ---
    pub fn as_str(self) -> &'static str {
        // ---
        match self {
            Level::Country => "country",
            Level::State => "state",
            Level::County => "county",
            Level::City => "city",
        }
    }

    /// Parse a source-supplied level string. Anything outside the four
    /// recognized levels is `None`.
    pub fn parse(s: &str) -> Option<Level> {
        // ---
        match s {
            "country" => Some(Level::Country),
            "state" => Some(Level::State),
            "county" => Some(Level::County),
            "city" => Some(Level::City),
            _ => None,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point geometry carried by every record. The coordinate list is empty
/// when the source supplies none; the structure itself is never absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub point_type: String,
    pub coordinates: Vec<f64>,
}

impl GeoPoint {
    // ---
    pub fn new(coordinates: Vec<f64>) -> Self {
        GeoPoint {
            point_type: "Point".to_string(),
            coordinates,
        }
    }
}

impl Default for GeoPoint {
    fn default() -> Self {
        GeoPoint::new(Vec::new())
    }
}

/// One observation of a location on one calendar day.
///
/// `(name, report_ts)` is unique per collection and is the idempotency key
/// for both duplicate-tolerant bulk inserts and upsert-replace targeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationRecord {
    // ---
    pub name: String,
    pub city: String,
    pub county: String,
    pub state: String,
    pub country: String,
    pub level: Level,
    pub cases: f64,
    pub deaths: f64,
    pub recovered: f64,
    pub active: f64,
    /// UTC epoch seconds at date-only granularity.
    pub report_ts: i64,
    /// Ingestion wall-clock, UTC epoch seconds.
    pub update_ts: i64,
    /// The original calendar-date string from the feed.
    pub report_date: String,
    #[serde(rename = "countryId")]
    pub country_id: String,
    #[serde(rename = "stateId")]
    pub state_id: String,
    #[serde(rename = "countyId")]
    pub county_id: String,
    pub location: GeoPoint,
    pub tz: Vec<String>,
}

/// Query key for the read/scoring path. `state` and `county` are mandatory
/// for "United States"; country-level locations leave them empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoliticalLocation {
    pub country: String,
    pub state: String,
    pub county: String,
}

impl PoliticalLocation {
    // ---
    pub fn new(country: &str, state: &str, county: &str) -> Self {
        PoliticalLocation {
            country: country.to_string(),
            state: state.to_string(),
            county: county.to_string(),
        }
    }

    /// A country-level location with no state/county narrowing.
    pub fn nationwide(country: &str) -> Self {
        PoliticalLocation::new(country, "", "")
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn level_round_trips_through_strings() {
        // ---
        for level in [Level::Country, Level::State, Level::County, Level::City] {
            assert_eq!(Level::parse(level.as_str()), Some(level));
        }
        assert_eq!(Level::parse("zipcode"), None);
        assert_eq!(Level::parse(""), None);
    }

    #[test]
    fn level_serde_is_lowercase() {
        // ---
        let json = serde_json::to_string(&Level::County).unwrap();
        assert_eq!(json, "\"county\"");

        let parsed: Level = serde_json::from_str("\"state\"").unwrap();
        assert_eq!(parsed, Level::State);
    }

    #[test]
    fn geo_point_defaults_to_empty_point() {
        // ---
        let point = GeoPoint::default();
        assert_eq!(point.point_type, "Point");
        assert!(point.coordinates.is_empty());
    }

    #[test]
    fn record_serializes_with_wire_field_names() {
        // ---
        let record = ConfirmationRecord {
            name: "Hillsborough County, Florida, United States".to_string(),
            city: String::new(),
            county: "Hillsborough County".to_string(),
            state: "Florida".to_string(),
            country: "United States".to_string(),
            level: Level::County,
            cases: 21.0,
            deaths: 1.0,
            recovered: 0.0,
            active: 20.0,
            report_ts: 1_583_020_800,
            update_ts: 1_583_107_200,
            report_date: "2020-03-01".to_string(),
            country_id: "iso1:US".to_string(),
            state_id: "iso2:US-FL".to_string(),
            county_id: "fips:12057".to_string(),
            location: GeoPoint::new(vec![-82.3, 27.9]),
            tz: vec!["America/New_York".to_string()],
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["countryId"], "iso1:US");
        assert_eq!(value["stateId"], "iso2:US-FL");
        assert_eq!(value["countyId"], "fips:12057");
        assert_eq!(value["level"], "county");
        assert_eq!(value["location"]["type"], "Point");
    }
}
