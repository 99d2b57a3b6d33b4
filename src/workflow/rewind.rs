//! Rewind planning and the append-only rewind history.
//!
//! A rewind to stage S invalidates every stage strictly after S: their
//! artifacts, digest entries and stage entries. The history row lists only the
//! stages the session had actually reached. The state changes on the session itself are
//! pure functions here; the engine runs them together with artifact
//! invalidation and the history row in one write transaction.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, Transaction, params};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::digest::supersede_entries_for_stages;
use crate::core::session::{PaperSession, StageStatus};
use crate::core::stage::{Stage, StagePosition};
use crate::error::{PfError, Result};
use crate::storage::{json_column, parsed_column, to_json, ts_column, ts_to_sql};

/// What happens to the target stage's revision counter on rewind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionCountPolicy {
    Preserve,
    Reset,
}

/// How a rewind treats the stage it lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewindPolicy {
    pub target_revision_count: RevisionCountPolicy,
    /// Also supersede the target stage's own digest entries.
    pub supersede_target_digest: bool,
}

pub const DEFAULT_REWIND_POLICY: RewindPolicy = RewindPolicy {
    target_revision_count: RevisionCountPolicy::Preserve,
    supersede_target_digest: false,
};

impl Default for RewindPolicy {
    fn default() -> Self {
        DEFAULT_REWIND_POLICY
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewindPlan {
    pub from: StagePosition,
    pub to: Stage,
    /// Reached stages after the target, as recorded in history.
    pub invalidated_stages: Vec<Stage>,
    /// Every stage after the target; artifacts, digest and entries are cleared over this.
    pub cascade_stages: Vec<Stage>,
    /// Artifact ids recorded on the cascaded stages' entries.
    pub entry_artifact_ids: Vec<String>,
}

/// Check that `target` is reachable backwards and list what it invalidates.
pub fn plan_rewind(session: &PaperSession, target: Stage) -> Result<RewindPlan> {
    let from = session.current_stage;
    if target.index() > from.ordinal() {
        return Err(PfError::StateConflict(format!(
            "cannot rewind session {} forward from {from} to {target}",
            session.session_id
        )));
    }

    let invalidated_stages = target.stages_after_through(from.reached_stage()).to_vec();
    let cascade_stages = target.stages_after().to_vec();
    let entry_artifact_ids = cascade_stages
        .iter()
        .filter_map(|stage| session.entry(*stage))
        .filter_map(|entry| entry.artifact_id.clone())
        .collect();

    Ok(RewindPlan {
        from,
        to: target,
        invalidated_stages,
        cascade_stages,
        entry_artifact_ids,
    })
}

/// Apply a plan to the in-memory session.
pub fn apply_rewind(
    session: &mut PaperSession,
    plan: &RewindPlan,
    policy: RewindPolicy,
    now: DateTime<Utc>,
) {
    supersede_entries_for_stages(&mut session.paper_memory_digest, &plan.cascade_stages);
    if policy.supersede_target_digest {
        supersede_entries_for_stages(&mut session.paper_memory_digest, &[plan.to]);
    }

    for stage in &plan.cascade_stages {
        if let Some(entry) = session.stage_data.get_mut(stage) {
            entry.superseded = true;
        }
    }

    if policy.target_revision_count == RevisionCountPolicy::Reset {
        if let Some(entry) = session.stage_data.get_mut(&plan.to) {
            entry.revision_count = 0;
        }
    }

    session.current_stage = StagePosition::Stage(plan.to);
    session.stage_status = StageStatus::Revision;
    session.completed_at = None;
    session.is_dirty = false;
    session.updated_at = now;
}

/// One row of rewind history.
///
/// This is the audit row for a rewind. Rewinds never write to the skill audit
/// log; `rewind_history` is the session-side ledger and is append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewindRecord {
    pub rewind_id: String,
    pub session_id: String,
    pub from_stage: StagePosition,
    pub to_stage: Stage,
    pub invalidated_artifact_ids: Vec<String>,
    pub invalidated_stages: Vec<Stage>,
    pub created_at: DateTime<Utc>,
}

impl RewindRecord {
    #[must_use]
    pub fn new(
        session_id: &str,
        plan: &RewindPlan,
        invalidated_artifact_ids: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            rewind_id: format!("rw_{}", Uuid::new_v4().simple()),
            session_id: session_id.to_string(),
            from_stage: plan.from,
            to_stage: plan.to,
            invalidated_artifact_ids,
            invalidated_stages: plan.invalidated_stages.clone(),
            created_at: now,
        }
    }
}

pub fn insert_record(tx: &Transaction<'_>, record: &RewindRecord) -> Result<()> {
    let seq: i64 = tx.query_row(
        "SELECT COALESCE(MAX(seq), 0) + 1 FROM rewind_history WHERE session_id = ?",
        [&record.session_id],
        |row| row.get(0),
    )?;
    tx.execute(
        "INSERT INTO rewind_history (rewind_id, seq, session_id, from_stage, to_stage,
                                     invalidated_artifact_ids_json, invalidated_stages_json, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            record.rewind_id,
            seq,
            record.session_id,
            record.from_stage.as_str(),
            record.to_stage.as_str(),
            to_json(&record.invalidated_artifact_ids)?,
            to_json(&record.invalidated_stages)?,
            ts_to_sql(&record.created_at),
        ],
    )?;
    Ok(())
}

/// Rewinds of one session, oldest first.
pub fn list_records(conn: &Connection, session_id: &str) -> Result<Vec<RewindRecord>> {
    let mut stmt = conn.prepare(
        "SELECT rewind_id, session_id, from_stage, to_stage, invalidated_artifact_ids_json,
                invalidated_stages_json, created_at
         FROM rewind_history WHERE session_id = ? ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map([session_id], record_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<RewindRecord> {
    Ok(RewindRecord {
        rewind_id: row.get(0)?,
        session_id: row.get(1)?,
        from_stage: parsed_column(row, 2)?,
        to_stage: parsed_column(row, 3)?,
        invalidated_artifact_ids: json_column(row, 4)?,
        invalidated_stages: json_column(row, 5)?,
        created_at: ts_column(row, 6)?,
    })
}
