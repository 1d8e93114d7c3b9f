//! Ingestion and trend-scoring pipeline for epidemiological case-count
//! feeds.
//!
//! The crate normalizes a third-party scraper's two raw JSON shapes into
//! canonical daily confirmation records, persists them idempotently (one
//! collection per country, keyed by `(name, report_ts)`), and derives a
//! recency-weighted 0–100 trend score per location from bounded day-over-day
//! case-delta windows.
//!
//! Pipeline order per run: normalize → persist → window-read → score, with
//! countries fully independent of one another.

pub mod analysis;
pub mod anchor;
pub mod config;
pub mod country;
pub mod error;
pub mod feed;
pub mod models;
pub mod normalize;
pub mod scorer;
pub mod store;
pub mod window;

pub use config::Config;
pub use error::ConfirmError;
pub use models::{ConfirmationRecord, GeoPoint, Level, PoliticalLocation};
pub use scorer::ScoreDataPoint;
pub use window::WindowSample;
