//! Per-country strategy table.
//!
//! Ingestion and the window reader both consume this table, so a country's
//! collection name, feed match key, ingestion level, and filter requirements
//! are defined exactly once.

use crate::models::Level;

// ---

/// Strategy for one supported country.
#[derive(Debug, Clone, Copy)]
pub struct CountryPolicy {
    /// Canonical country name used for query-path lookups.
    pub name: &'static str,
    /// Store collection (table) holding this country's records.
    pub collection: &'static str,
    /// Substring matched against raw feed entries to select this country.
    pub match_key: &'static str,
    /// Administrative level ingested for this country.
    pub level: Level,
    /// Whether window queries must carry a non-empty state and county.
    pub requires_state_county: bool,
}

/// Countries with a confirmed-case dataset.
pub const SUPPORTED: &[CountryPolicy] = &[
    CountryPolicy {
        name: "United States",
        collection: "confirm_us",
        match_key: "United States",
        level: Level::County,
        requires_state_county: true,
    },
    CountryPolicy {
        name: "Taiwan",
        collection: "confirm_taiwan",
        match_key: "Taiwan",
        level: Level::Country,
        requires_state_county: false,
    },
    CountryPolicy {
        name: "Iceland",
        collection: "confirm_iceland",
        match_key: "Iceland",
        level: Level::Country,
        requires_state_county: false,
    },
];

/// Look up the policy for a country by its canonical name.
pub fn policy_for(country: &str) -> Option<&'static CountryPolicy> {
    // ---
    SUPPORTED.iter().find(|policy| policy.name == country)
}
