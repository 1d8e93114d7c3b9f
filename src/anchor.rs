//! Time anchoring: calendar dates to UTC epoch seconds.
//!
//! A record's report timestamp is midnight of its calendar date in the first
//! resolvable timezone the source lists for it, converted to UTC. Zone
//! resolution failure is a non-fatal fallback to UTC, never an error; only an
//! unparseable date fails.

use chrono::{LocalResult, NaiveDate, NaiveTime, ParseError, TimeZone, Utc};
use chrono_tz::Tz;

/// Calendar-date layout used by the feed.
const DATE_LAYOUT: &str = "%Y-%m-%d";

// ---

/// Resolve `date` (`YYYY-MM-DD`) to the UTC epoch second of its midnight in
/// the first resolvable zone of `tz_candidates`, or UTC midnight when no
/// candidate resolves. Deterministic; repeated calls with the same inputs
/// return identical values.
pub fn anchor(date: &str, tz_candidates: &[String]) -> Result<i64, ParseError> {
    // ---
    let day = NaiveDate::parse_from_str(date, DATE_LAYOUT)?;
    Ok(midnight_epoch(day, resolve_zone(tz_candidates)))
}

/// Today's calendar date and its midnight epoch in the first resolvable
/// candidate zone (UTC when none resolves). Stamps daily snapshots.
pub fn today_in_zone(tz_candidates: &[String]) -> (String, i64) {
    // ---
    let zone = resolve_zone(tz_candidates);
    let today = match zone {
        Some(tz) => Utc::now().with_timezone(&tz).date_naive(),
        None => Utc::now().date_naive(),
    };
    (today.format(DATE_LAYOUT).to_string(), midnight_epoch(today, zone))
}

/// UTC midnight of the current day; the upper bound for score sweeps.
pub fn today_start_utc() -> i64 {
    // ---
    midnight_epoch(Utc::now().date_naive(), None)
}

/// First candidate that names a real timezone, if any.
fn resolve_zone(candidates: &[String]) -> Option<Tz> {
    // ---
    let first = candidates.first()?;
    match first.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(_) => {
            tracing::debug!("unresolvable timezone {:?}, anchoring in UTC", first);
            None
        }
    }
}

/// Midnight of `day` in `zone` (UTC when absent), as a UTC epoch second.
fn midnight_epoch(day: NaiveDate, zone: Option<Tz>) -> i64 {
    // ---
    let midnight = day.and_time(NaiveTime::MIN);
    match zone {
        Some(tz) => match tz.from_local_datetime(&midnight) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc).timestamp(),
            // Fall-back overlap: take the earlier instant.
            LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc).timestamp(),
            // Spring-forward gap: conservative UTC midnight.
            LocalResult::None => Utc.from_utc_datetime(&midnight).timestamp(),
        },
        None => Utc.from_utc_datetime(&midnight).timestamp(),
    }
}
