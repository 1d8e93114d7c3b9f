//! Persistence layer for confirmed-case collections.
//!
//! One PostgreSQL table per country, bootstrapped idempotently before any
//! insert. The compound unique index on `(name, report_ts)` is the
//! idempotency key: the bulk insert path treats a duplicate-key violation as
//! "already ingested", and the daily-correction upsert replaces the full row
//! rather than merging.

use std::time::Duration;

use sqlx::postgres::PgArguments;
use sqlx::PgPool;
use tracing::{debug, error, info};

use crate::error::ConfirmError;
use crate::models::ConfirmationRecord;

/// Bound on one window read against the store.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// PostgreSQL SQLSTATE for a unique-constraint violation, the one write
/// error that means "already ingested" rather than failure.
const UNIQUE_VIOLATION: &str = "23505";

// ---

/// Create the collection table and its compound uniqueness constraint.
/// Idempotent; must complete before this collection's inserts.
pub async fn ensure_collection(pool: &PgPool, collection: &str) -> Result<(), ConfirmError> {
    // ---
    let mut tx = pool.begin().await.map_err(ConfirmError::StoreWrite)?;

    let create = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id          BIGSERIAL PRIMARY KEY,
            name        TEXT               NOT NULL,
            city        TEXT               NOT NULL DEFAULT '',
            county      TEXT               NOT NULL DEFAULT '',
            state       TEXT               NOT NULL DEFAULT '',
            country     TEXT               NOT NULL,
            level       TEXT               NOT NULL,
            cases       DOUBLE PRECISION   NOT NULL,
            deaths      DOUBLE PRECISION   NOT NULL,
            recovered   DOUBLE PRECISION   NOT NULL,
            active      DOUBLE PRECISION   NOT NULL,
            report_ts   BIGINT             NOT NULL,
            update_ts   BIGINT             NOT NULL,
            report_date TEXT               NOT NULL,
            country_id  TEXT               NOT NULL DEFAULT '',
            state_id    TEXT               NOT NULL DEFAULT '',
            county_id   TEXT               NOT NULL DEFAULT '',
            coordinates DOUBLE PRECISION[] NOT NULL DEFAULT '{{}}',
            tz          TEXT[]             NOT NULL DEFAULT '{{}}'
        );
        "#,
        collection
    );
    sqlx::query(&create)
        .execute(&mut *tx)
        .await
        .map_err(ConfirmError::StoreWrite)?;

    let index = format!(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_{}_name_report_ts
            ON {} (name, report_ts);
        "#,
        collection, collection
    );
    sqlx::query(&index)
        .execute(&mut *tx)
        .await
        .map_err(ConfirmError::StoreWrite)?;

    tx.commit().await.map_err(ConfirmError::StoreWrite)?;
    Ok(())
}

/// Counts from one bulk insert.
#[derive(Debug, Default, Clone, Copy)]
pub struct BulkOutcome {
    pub inserted: u64,
    pub duplicates: u64,
}

/// Unordered multi-insert. Rows hitting the unique `(name, report_ts)`
/// constraint are already ingested and only counted; any other failure
/// aborts this collection's run.
pub async fn bulk_insert(
    pool: &PgPool,
    records: &[ConfirmationRecord],
    collection: &str,
) -> Result<BulkOutcome, ConfirmError> {
    // ---
    let sql = format!(
        r#"
        INSERT INTO {} (
            name, city, county, state, country, level,
            cases, deaths, recovered, active,
            report_ts, update_ts, report_date,
            country_id, state_id, county_id, coordinates, tz
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
        collection
    );

    let mut outcome = BulkOutcome::default();
    for record in records {
        let result = bind_record(sqlx::query(&sql), record)
            .execute(pool)
            .await
            .map_err(classify_write_err);
        match result {
            Ok(_) => outcome.inserted += 1,
            Err(ConfirmError::DuplicateRecord) => {
                debug!("already stored: {} @ {}", record.name, record.report_ts);
                outcome.duplicates += 1;
            }
            Err(err) => return Err(err),
        }
    }
    info!(
        "{}: {} records inserted, {} already present",
        collection, outcome.inserted, outcome.duplicates
    );
    Ok(outcome)
}

/// Replace-if-matched-else-insert keyed by `(name, report_ts)`. The whole
/// row is overwritten, so re-running a day's corrections never duplicates
/// and never merges stale fields.
pub async fn upsert_replace(
    pool: &PgPool,
    records: &[ConfirmationRecord],
    collection: &str,
) -> Result<(), ConfirmError> {
    // ---
    let sql = format!(
        r#"
        INSERT INTO {} (
            name, city, county, state, country, level,
            cases, deaths, recovered, active,
            report_ts, update_ts, report_date,
            country_id, state_id, county_id, coordinates, tz
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        ON CONFLICT (name, report_ts) DO UPDATE SET
            city        = EXCLUDED.city,
            county      = EXCLUDED.county,
            state       = EXCLUDED.state,
            country     = EXCLUDED.country,
            level       = EXCLUDED.level,
            cases       = EXCLUDED.cases,
            deaths      = EXCLUDED.deaths,
            recovered   = EXCLUDED.recovered,
            active      = EXCLUDED.active,
            update_ts   = EXCLUDED.update_ts,
            report_date = EXCLUDED.report_date,
            country_id  = EXCLUDED.country_id,
            state_id    = EXCLUDED.state_id,
            county_id   = EXCLUDED.county_id,
            coordinates = EXCLUDED.coordinates,
            tz          = EXCLUDED.tz
        "#,
        collection
    );

    for record in records {
        bind_record(sqlx::query(&sql), record)
            .execute(pool)
            .await
            .map_err(ConfirmError::StoreWrite)?;
    }
    info!("{}: {} records replaced", collection, records.len());
    Ok(())
}

/// Row shape read back for the window path.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CaseRow {
    pub name: String,
    pub cases: f64,
    pub report_ts: i64,
    pub report_date: String,
}

/// Fetch up to `limit` rows for the window reader, most recent first.
/// `filter` narrows to one state/county pair; `not_after` bounds the newest
/// report timestamp. Reads are bounded by [`READ_TIMEOUT`]; a timeout
/// surfaces as a fetch failure.
pub async fn fetch_window(
    pool: &PgPool,
    collection: &str,
    filter: Option<(&str, &str)>,
    not_after: Option<i64>,
    limit: i64,
) -> Result<Vec<CaseRow>, ConfirmError> {
    // ---
    let mut clauses = Vec::new();
    let mut next_bind = 1;
    if filter.is_some() {
        clauses.push(format!("state = ${} AND county = ${}", next_bind, next_bind + 1));
        next_bind += 2;
    }
    if not_after.is_some() {
        clauses.push(format!("report_ts <= ${}", next_bind));
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT name, cases, report_ts, report_date FROM {} {} ORDER BY report_ts DESC LIMIT {}",
        collection, where_clause, limit
    );

    let mut query = sqlx::query_as::<_, CaseRow>(&sql);
    if let Some((state, county)) = filter {
        query = query.bind(state).bind(county);
    }
    if let Some(bound) = not_after {
        query = query.bind(bound);
    }

    match tokio::time::timeout(READ_TIMEOUT, query.fetch_all(pool)).await {
        Ok(Ok(rows)) => Ok(rows),
        Ok(Err(err)) => Err(classify_read_err(err)),
        Err(_) => {
            error!("window read on {} timed out after {:?}", collection, READ_TIMEOUT);
            Err(ConfirmError::DataFetch)
        }
    }
}

// ---

fn bind_record<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    record: &'q ConfirmationRecord,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    // ---
    query
        .bind(&record.name)
        .bind(&record.city)
        .bind(&record.county)
        .bind(&record.state)
        .bind(&record.country)
        .bind(record.level.as_str())
        .bind(record.cases)
        .bind(record.deaths)
        .bind(record.recovered)
        .bind(record.active)
        .bind(record.report_ts)
        .bind(record.update_ts)
        .bind(&record.report_date)
        .bind(&record.country_id)
        .bind(&record.state_id)
        .bind(&record.county_id)
        .bind(&record.location.coordinates)
        .bind(&record.tz)
}

fn classify_write_err(err: sqlx::Error) -> ConfirmError {
    // ---
    if let sqlx::Error::Database(ref db) = err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return ConfirmError::DuplicateRecord;
        }
    }
    ConfirmError::StoreWrite(err)
}

/// A row that cannot decode fails the whole read; everything else is a
/// fetch failure whose cause is logged here.
fn classify_read_err(err: sqlx::Error) -> ConfirmError {
    // ---
    match err {
        decode @ (sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)) => ConfirmError::Decode(decode),
        other => {
            error!("window read failed: {}", other);
            ConfirmError::DataFetch
        }
    }
}
