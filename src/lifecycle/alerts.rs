//! System alerts: the observability sink for operational conflicts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PfError, Result};
use crate::storage::{Database, json_column, opt_ts_column, parsed_column, to_json, ts_column, ts_to_sql};

pub const SKILL_RUNTIME_CONFLICT: &str = "skill_runtime_conflict";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = PfError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(PfError::Serialization(format!("unknown severity '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemAlert {
    pub id: i64,
    pub alert_type: String,
    pub severity: Severity,
    pub message: String,
    pub source: String,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Open map; shape depends on `alert_type`.
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub alert_type: String,
    pub severity: Severity,
    pub message: String,
    pub source: String,
    pub metadata: Value,
}

/// Insert one alert on `conn` (usually the caller's transaction).
pub fn insert_alert(conn: &Connection, alert: &NewAlert, now: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        "INSERT INTO system_alerts (alert_type, severity, message, source, resolved, metadata_json, created_at)
         VALUES (?, ?, ?, ?, 0, ?, ?)",
        params![
            alert.alert_type,
            alert.severity.as_str(),
            alert.message,
            alert.source,
            to_json(&alert.metadata)?,
            ts_to_sql(&now),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Open alerts, newest first.
pub fn list_unresolved(conn: &Connection, limit: usize) -> Result<Vec<SystemAlert>> {
    let mut stmt = conn.prepare(
        "SELECT id, alert_type, severity, message, source, resolved, resolved_at, metadata_json, created_at
         FROM system_alerts WHERE resolved = 0 ORDER BY id DESC LIMIT ?",
    )?;
    let rows = stmt.query_map([i64::try_from(limit).unwrap_or(i64::MAX)], alert_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Mark an alert resolved. Resolving twice is a no-op.
pub fn resolve_alert(db: &Database, id: i64) -> Result<SystemAlert> {
    db.write_tx("resolve_alert", |tx| {
        let changed = tx.execute(
            "UPDATE system_alerts SET resolved = 1, resolved_at = ? WHERE id = ? AND resolved = 0",
            params![ts_to_sql(&Utc::now()), id],
        )?;
        let alert = tx
            .query_row(
                "SELECT id, alert_type, severity, message, source, resolved, resolved_at, metadata_json, created_at
                 FROM system_alerts WHERE id = ?",
                [id],
                alert_from_row,
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => PfError::NotFound(format!("alert {id}")),
                other => other.into(),
            })?;
        if changed > 0 {
            tracing::info!(alert_id = id, "resolved alert");
        }
        Ok(alert)
    })
}

fn alert_from_row(row: &Row<'_>) -> rusqlite::Result<SystemAlert> {
    Ok(SystemAlert {
        id: row.get(0)?,
        alert_type: row.get(1)?,
        severity: parsed_column(row, 2)?,
        message: row.get(3)?,
        source: row.get(4)?,
        resolved: row.get::<_, i64>(5)? != 0,
        resolved_at: opt_ts_column(row, 6)?,
        metadata: json_column(row, 7)?,
        created_at: ts_column(row, 8)?,
    })
}
