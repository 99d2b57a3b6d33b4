//! Storage layer for paperflow
//!
//! One SQLite file holds the skill catalog, the audit ledger, alerts, paper
//! sessions, artifacts and rewind history. Timestamps are RFC 3339 UTC text;
//! structured columns are JSON text.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub mod migrations;
pub mod sqlite;
pub mod tx;

pub use sqlite::Database;

use crate::error::Result;

/// Timestamp as stored in text columns (sortable, microsecond precision).
#[must_use]
pub fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn ts_from_sql(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

/// Read a required timestamp column.
pub fn ts_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    ts_from_sql(&raw, idx)
}

/// Read a nullable timestamp column.
pub fn opt_ts_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| ts_from_sql(&raw, idx)).transpose()
}

/// Read a JSON text column into `T`.
pub fn json_column<T: DeserializeOwned>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

/// Parse a text column through `FromStr` (enums stored by name).
pub fn parsed_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
