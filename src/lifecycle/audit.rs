//! Append-only skill audit ledger.
//!
//! Rows are written only through [`append`], which takes the caller's open
//! transaction, so a state change and its audit row commit together. The table
//! itself refuses UPDATE and DELETE.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::stage::Stage;
use crate::core::validation::ValidationMetadata;
use crate::error::Result;
use crate::storage::{json_column, to_json, ts_column, ts_to_sql};

/// Audit metadata, keyed by action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AuditEvent {
    Create {
        stage_scope: Stage,
        source: String,
    },
    DraftSaved {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stage_scope: Option<Stage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        change_note: Option<String>,
        source: String,
    },
    Publish {
        validation: ValidationMetadata,
    },
    Activate {
        previous_active_versions: Vec<u32>,
        validation: ValidationMetadata,
    },
    Rollback {
        reason: String,
        previous_active_versions: Vec<u32>,
    },
    Archive,
    Enable,
    Disable,
    RuntimeConflict {
        rule: String,
        message: String,
        stage_scope: Stage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        #[serde(default)]
        extra: Value,
    },
}

impl AuditEvent {
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::DraftSaved { .. } => "draft_saved",
            Self::Publish { .. } => "publish",
            Self::Activate { .. } => "activate",
            Self::Rollback { .. } => "rollback",
            Self::Archive => "archive",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::RuntimeConflict { .. } => "runtime_conflict",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub skill_id: String,
    pub version: Option<u32>,
    pub action: String,
    pub actor_id: Option<String>,
    pub metadata: AuditEvent,
    pub created_at: DateTime<Utc>,
}

/// Append one row inside the caller's transaction. Returns the row id.
pub fn append(
    tx: &Transaction<'_>,
    skill_id: &str,
    version: Option<u32>,
    actor_id: Option<&str>,
    event: &AuditEvent,
    now: DateTime<Utc>,
) -> Result<i64> {
    tx.execute(
        "INSERT INTO skill_audit_log (skill_id, version, action, actor_id, metadata_json, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            skill_id,
            version,
            event.action(),
            actor_id,
            to_json(event)?,
            ts_to_sql(&now),
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Every entry for one skill, in creation order.
pub fn list_for_skill(conn: &Connection, skill_id: &str) -> Result<Vec<AuditLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, skill_id, version, action, actor_id, metadata_json, created_at
         FROM skill_audit_log WHERE skill_id = ? ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([skill_id], entry_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Latest runtime conflicts, newest first.
pub fn list_runtime_conflicts(conn: &Connection, limit: usize) -> Result<Vec<AuditLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, skill_id, version, action, actor_id, metadata_json, created_at
         FROM skill_audit_log WHERE action = 'runtime_conflict' ORDER BY id DESC LIMIT ?",
    )?;
    let rows = stmt.query_map([i64::try_from(limit).unwrap_or(i64::MAX)], entry_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn get_entry(conn: &Connection, id: i64) -> Result<Option<AuditLogEntry>> {
    let entry = conn
        .query_row(
            "SELECT id, skill_id, version, action, actor_id, metadata_json, created_at
             FROM skill_audit_log WHERE id = ?",
            [id],
            entry_from_row,
        )
        .optional()?;
    Ok(entry)
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<AuditLogEntry> {
    Ok(AuditLogEntry {
        id: row.get(0)?,
        skill_id: row.get(1)?,
        version: row.get(2)?,
        action: row.get(3)?,
        actor_id: row.get(4)?,
        metadata: json_column(row, 5)?,
        created_at: ts_column(row, 6)?,
    })
}
