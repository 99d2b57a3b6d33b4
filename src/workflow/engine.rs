//! Paper session state machine.
//!
//! Every action loads the session inside one immediate write transaction,
//! checks ownership, changes the in-memory [`PaperSession`] and writes it back.
//! Rewind adds artifact invalidation and a history row to that same
//! transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::core::digest::{append_decision, supersede_entries_for_stages};
use crate::core::session::{PaperSession, StageStatus};
use crate::core::stage::{Stage, StagePosition};
use crate::error::{PfError, Result};
use crate::storage::{Database, json_column, opt_ts_column, parsed_column, to_json, ts_column, ts_to_sql};
use crate::workflow::artifacts::invalidate_artifacts_for_stages;
use crate::workflow::rewind::{
    DEFAULT_REWIND_POLICY, RewindPolicy, RewindRecord, apply_rewind, insert_record, list_records,
    plan_rewind,
};

/// Result of a successful approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveOutcome {
    pub approved_stage: Stage,
    pub next_stage: StagePosition,
    pub is_completed: bool,
    pub session: PaperSession,
}

/// Result of a rewind: the updated session and its history row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewindOutcome {
    pub session: PaperSession,
    pub record: RewindRecord,
}

#[derive(Clone)]
pub struct StageWorkflowEngine {
    db: Arc<Database>,
    policy: RewindPolicy,
}

impl StageWorkflowEngine {
    pub const fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            policy: DEFAULT_REWIND_POLICY,
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: RewindPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn policy(&self) -> RewindPolicy {
        self.policy
    }

    /// Session for `conversation_id`, created at the first stage if absent.
    pub fn create_session(
        &self,
        actor: &str,
        conversation_id: &str,
        initial_idea: Option<&str>,
    ) -> Result<PaperSession> {
        if conversation_id.trim().is_empty() {
            return Err(PfError::InvalidInput("conversation id is required".to_string()));
        }
        let (session, created) = self.db.write_tx("create_session", |tx| {
            if let Some(existing) = session_by_conversation(tx, conversation_id)? {
                existing.ensure_owner(actor)?;
                return Ok((existing, false));
            }

            let mut session = PaperSession::new(
                format!("ps_{}", Uuid::new_v4().simple()),
                actor,
                conversation_id,
                Utc::now(),
            );
            if let Some(idea) = initial_idea.map(str::trim).filter(|idea| !idea.is_empty()) {
                session
                    .entry_mut(Stage::Gagasan)
                    .fields
                    .insert("ideKasar".to_string(), Value::String(idea.to_string()));
            }
            insert_session(tx, &session)?;
            Ok((session, true))
        })?;

        if created {
            tracing::info!(session_id = %session.session_id, conversation_id, "created paper session");
        }
        Ok(session)
    }

    /// Shallow-merge `data` into the current stage's entry.
    pub fn update_stage_data(
        &self,
        actor: &str,
        session_id: &str,
        stage: Stage,
        data: &Map<String, Value>,
    ) -> Result<PaperSession> {
        self.mutate("update_stage_data", actor, session_id, |_, session, _| {
            let current = session.active_stage()?;
            if current != stage {
                return Err(PfError::StateConflict(format!(
                    "session is on {current}, cannot write data for {stage}"
                )));
            }
            if session.stage_status == StageStatus::PendingValidation {
                return Err(PfError::StateConflict(format!(
                    "{stage} is pending validation"
                )));
            }
            let entry = session.entry_mut(stage);
            entry.merge(stage, data)?;
            entry.superseded = false;
            Ok(())
        })
        .map(|((), session)| session)
    }

    pub fn mark_dirty(&self, actor: &str, session_id: &str) -> Result<PaperSession> {
        self.mutate("mark_dirty", actor, session_id, |_, session, _| {
            session.is_dirty = true;
            Ok(())
        })
        .map(|((), session)| session)
    }

    pub fn submit_for_validation(&self, actor: &str, session_id: &str) -> Result<PaperSession> {
        let ((), session) = self.mutate("submit_for_validation", actor, session_id, |_, session, _| {
            let stage = session.active_stage()?;
            if !matches!(
                session.stage_status,
                StageStatus::Drafting | StageStatus::Revision
            ) {
                return Err(PfError::StateConflict(format!(
                    "cannot submit {stage} from status {}",
                    session.stage_status
                )));
            }
            let missing = session
                .entry(stage)
                .map_or_else(|| stage.required_fields().to_vec(), |e| e.missing_required(stage));
            if !missing.is_empty() {
                return Err(PfError::InvalidInput(format!(
                    "{stage} is missing required fields: {}",
                    missing.join(", ")
                )));
            }
            session.stage_status = StageStatus::PendingValidation;
            Ok(())
        })?;
        tracing::info!(session_id, stage = %session.current_stage, "stage submitted for validation");
        Ok(session)
    }

    /// Approve the pending stage and advance.
    pub fn approve(&self, actor: &str, session_id: &str) -> Result<ApproveOutcome> {
        let (stage, session) = self.mutate("approve", actor, session_id, |_, session, now| {
            let stage = session.active_stage()?;
            if session.stage_status != StageStatus::PendingValidation {
                return Err(PfError::StateConflict(format!(
                    "cannot approve {stage} from status {}",
                    session.stage_status
                )));
            }

            let entry = session.entry_mut(stage);
            entry.validated_at = Some(now);
            let decision = entry.ringkasan().unwrap_or_default().to_string();
            // One live decision per stage; a re-approval replaces the earlier one.
            supersede_entries_for_stages(&mut session.paper_memory_digest, &[stage]);
            append_decision(&mut session.paper_memory_digest, stage, decision, now);

            let next = stage.next();
            session.current_stage = next;
            if next.is_completed() {
                session.stage_status = StageStatus::Approved;
                session.completed_at = Some(now);
            } else {
                session.stage_status = StageStatus::Drafting;
            }
            Ok(stage)
        })?;

        tracing::info!(session_id, approved = %stage, next = %session.current_stage, "stage approved");
        Ok(ApproveOutcome {
            approved_stage: stage,
            next_stage: session.current_stage,
            is_completed: session.current_stage.is_completed(),
            session,
        })
    }

    pub fn request_revision(
        &self,
        actor: &str,
        session_id: &str,
        feedback: &str,
    ) -> Result<PaperSession> {
        let ((), session) = self.mutate("request_revision", actor, session_id, |_, session, _| {
            let stage = session.active_stage()?;
            if session.stage_status != StageStatus::PendingValidation {
                return Err(PfError::StateConflict(format!(
                    "cannot request revision of {stage} from status {}",
                    session.stage_status
                )));
            }
            session.entry_mut(stage).revision_count += 1;
            session.stage_status = StageStatus::Revision;
            Ok(())
        })?;
        tracing::info!(
            session_id,
            stage = %session.current_stage,
            feedback_len = feedback.len(),
            "revision requested"
        );
        Ok(session)
    }

    /// Move back to `target`, invalidating everything after it.
    pub fn rewind(&self, actor: &str, session_id: &str, target: Stage) -> Result<RewindOutcome> {
        let policy = self.policy;
        let result = self.mutate("rewind", actor, session_id, |tx, session, now| {
            let plan = plan_rewind(session, target)?;
            let invalidated = invalidate_artifacts_for_stages(
                tx,
                &session.conversation_id,
                &plan.cascade_stages,
                target,
                &plan.entry_artifact_ids,
                now,
            )?;
            apply_rewind(session, &plan, policy, now);
            let record = RewindRecord::new(&session.session_id, &plan, invalidated, now);
            insert_record(tx, &record)?;
            Ok(record)
        });

        match result {
            Ok((record, session)) => {
                tracing::info!(
                    session_id,
                    from = %record.from_stage,
                    to = %record.to_stage,
                    stages = record.invalidated_stages.len(),
                    artifacts = record.invalidated_artifact_ids.len(),
                    "session rewound"
                );
                Ok(RewindOutcome { session, record })
            }
            Err(err) => {
                tracing::warn!(session_id, target = %target, error = %err, "rewind rejected");
                Err(err)
            }
        }
    }

    pub fn get_session(&self, actor: &str, session_id: &str) -> Result<PaperSession> {
        let session = self.db.read_tx(|tx| require_session(tx, session_id))?;
        session.ensure_owner(actor)?;
        Ok(session)
    }

    pub fn get_by_conversation(
        &self,
        actor: &str,
        conversation_id: &str,
    ) -> Result<Option<PaperSession>> {
        let session = self
            .db
            .read_tx(|tx| session_by_conversation(tx, conversation_id))?;
        if let Some(session) = &session {
            session.ensure_owner(actor)?;
        }
        Ok(session)
    }

    /// The actor's sessions, most recently updated first.
    pub fn list_by_user(&self, actor: &str) -> Result<Vec<PaperSession>> {
        self.db.read_tx(|tx| {
            let mut stmt = tx.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM paper_sessions
                 WHERE user_id = ? ORDER BY updated_at DESC, session_id DESC"
            ))?;
            let rows = stmt.query_map([actor], session_from_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn rewind_history(&self, actor: &str, session_id: &str) -> Result<Vec<RewindRecord>> {
        self.db.read_tx(|tx| {
            require_session(tx, session_id)?.ensure_owner(actor)?;
            list_records(tx, session_id)
        })
    }

    fn mutate<T, F>(
        &self,
        label: &str,
        actor: &str,
        session_id: &str,
        f: F,
    ) -> Result<(T, PaperSession)>
    where
        F: FnOnce(&Transaction<'_>, &mut PaperSession, DateTime<Utc>) -> Result<T>,
    {
        self.db.write_tx(label, |tx| {
            let mut session = require_session(tx, session_id)?;
            session.ensure_owner(actor)?;
            let now = Utc::now();
            let value = f(tx, &mut session, now)?;
            session.updated_at = now;
            save_session(tx, &session)?;
            Ok((value, session))
        })
    }
}

const SESSION_COLUMNS: &str = "session_id, user_id, conversation_id, current_stage, stage_status, \
     stage_data_json, digest_json, is_dirty, created_at, updated_at, completed_at";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<PaperSession> {
    Ok(PaperSession {
        session_id: row.get(0)?,
        user_id: row.get(1)?,
        conversation_id: row.get(2)?,
        current_stage: parsed_column(row, 3)?,
        stage_status: parsed_column(row, 4)?,
        stage_data: json_column(row, 5)?,
        paper_memory_digest: json_column(row, 6)?,
        is_dirty: row.get(7)?,
        created_at: ts_column(row, 8)?,
        updated_at: ts_column(row, 9)?,
        completed_at: opt_ts_column(row, 10)?,
    })
}

fn session_by_id(conn: &Connection, session_id: &str) -> Result<Option<PaperSession>> {
    let found = conn
        .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM paper_sessions WHERE session_id = ?"),
            [session_id],
            session_from_row,
        )
        .optional()?;
    Ok(found)
}

fn require_session(conn: &Connection, session_id: &str) -> Result<PaperSession> {
    session_by_id(conn, session_id)?
        .ok_or_else(|| PfError::NotFound(format!("session {session_id}")))
}

fn session_by_conversation(conn: &Connection, conversation_id: &str) -> Result<Option<PaperSession>> {
    let found = conn
        .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM paper_sessions WHERE conversation_id = ?"),
            [conversation_id],
            session_from_row,
        )
        .optional()?;
    Ok(found)
}

fn insert_session(tx: &Transaction<'_>, session: &PaperSession) -> Result<()> {
    tx.execute(
        &format!(
            "INSERT INTO paper_sessions ({SESSION_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ),
        params![
            session.session_id,
            session.user_id,
            session.conversation_id,
            session.current_stage.as_str(),
            session.stage_status.as_str(),
            to_json(&session.stage_data)?,
            to_json(&session.paper_memory_digest)?,
            session.is_dirty,
            ts_to_sql(&session.created_at),
            ts_to_sql(&session.updated_at),
            session.completed_at.as_ref().map(ts_to_sql),
        ],
    )?;
    Ok(())
}

/// Write back every mutable column of an existing session.
pub fn save_session(tx: &Transaction<'_>, session: &PaperSession) -> Result<()> {
    let changed = tx.execute(
        "UPDATE paper_sessions
         SET current_stage = ?, stage_status = ?, stage_data_json = ?, digest_json = ?,
             is_dirty = ?, updated_at = ?, completed_at = ?
         WHERE session_id = ?",
        params![
            session.current_stage.as_str(),
            session.stage_status.as_str(),
            to_json(&session.stage_data)?,
            to_json(&session.paper_memory_digest)?,
            session.is_dirty,
            ts_to_sql(&session.updated_at),
            session.completed_at.as_ref().map(ts_to_sql),
            session.session_id,
        ],
    )?;
    if changed == 0 {
        return Err(PfError::NotFound(format!("session {}", session.session_id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::core::digest::replay;
    use crate::workflow::artifacts::{ArtifactRegistry, NewArtifact};
    use crate::workflow::rewind::RevisionCountPolicy;

    fn engine() -> StageWorkflowEngine {
        StageWorkflowEngine::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn required_data(stage: Stage) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("ringkasan".into(), json!(format!("{stage} summary")));
        match stage {
            Stage::Topik => {
                map.insert("definitif".into(), json!("Definitive topic"));
            }
            Stage::Outline => {
                map.insert("sections".into(), json!([{"id": "bab1", "judul": "Pendahuluan"}]));
            }
            Stage::Judul => {
                map.insert("judulTerpilih".into(), json!("A Title"));
            }
            _ => {}
        }
        map
    }

    fn advance(engine: &StageWorkflowEngine, session_id: &str, stage: Stage) {
        engine
            .update_stage_data("alice", session_id, stage, &required_data(stage))
            .unwrap();
        engine.submit_for_validation("alice", session_id).unwrap();
        engine.approve("alice", session_id).unwrap();
    }

    #[test]
    fn test_create_is_idempotent_per_conversation() {
        let engine = engine();
        let first = engine
            .create_session("alice", "conv-1", Some("  Urban heat islands  "))
            .unwrap();
        let again = engine.create_session("alice", "conv-1", None).unwrap();
        assert_eq!(first.session_id, again.session_id);
        assert!(first.session_id.starts_with("ps_"));
        assert_eq!(
            first.entry(Stage::Gagasan).unwrap().fields["ideKasar"],
            json!("Urban heat islands")
        );

        let err = engine.create_session("bob", "conv-1", None).unwrap_err();
        assert_eq!(err.code(), "authorization_error");
    }

    #[test]
    fn test_update_rejects_other_stage_and_bad_keys() {
        let engine = engine();
        let session = engine.create_session("alice", "conv-1", None).unwrap();
        let err = engine
            .update_stage_data("alice", &session.session_id, Stage::Topik, &required_data(Stage::Topik))
            .unwrap_err();
        assert_eq!(err.code(), "state_conflict");

        let err = engine
            .update_stage_data(
                "alice",
                &session.session_id,
                Stage::Gagasan,
                &data(json!({"revisionCount": 9})),
            )
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn test_submit_requires_fields_and_status() {
        let engine = engine();
        let session = engine.create_session("alice", "conv-1", None).unwrap();
        let err = engine
            .submit_for_validation("alice", &session.session_id)
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");

        engine
            .update_stage_data("alice", &session.session_id, Stage::Gagasan, &required_data(Stage::Gagasan))
            .unwrap();
        let pending = engine.submit_for_validation("alice", &session.session_id).unwrap();
        assert_eq!(pending.stage_status, StageStatus::PendingValidation);

        let err = engine
            .submit_for_validation("alice", &session.session_id)
            .unwrap_err();
        assert_eq!(err.code(), "state_conflict");
        let err = engine
            .update_stage_data("alice", &session.session_id, Stage::Gagasan, &required_data(Stage::Gagasan))
            .unwrap_err();
        assert_eq!(err.code(), "state_conflict");
    }

    #[test]
    fn test_approve_advances_and_records_digest() {
        let engine = engine();
        let session = engine.create_session("alice", "conv-1", None).unwrap();
        engine
            .update_stage_data("alice", &session.session_id, Stage::Gagasan, &required_data(Stage::Gagasan))
            .unwrap();
        engine.submit_for_validation("alice", &session.session_id).unwrap();
        let outcome = engine.approve("alice", &session.session_id).unwrap();

        assert_eq!(outcome.approved_stage, Stage::Gagasan);
        assert_eq!(outcome.next_stage, StagePosition::Stage(Stage::Topik));
        assert_eq!(outcome.session.stage_status, StageStatus::Drafting);
        assert!(outcome.session.entry(Stage::Gagasan).unwrap().validated_at.is_some());
        assert_eq!(outcome.session.paper_memory_digest[0].decision, "gagasan summary");
    }

    #[test]
    fn test_revision_increments_counter() {
        let engine = engine();
        let session = engine.create_session("alice", "conv-1", None).unwrap();
        engine
            .update_stage_data("alice", &session.session_id, Stage::Gagasan, &required_data(Stage::Gagasan))
            .unwrap();
        engine.submit_for_validation("alice", &session.session_id).unwrap();
        let revised = engine
            .request_revision("alice", &session.session_id, "tighten the scope")
            .unwrap();
        assert_eq!(revised.stage_status, StageStatus::Revision);
        assert_eq!(revised.entry(Stage::Gagasan).unwrap().revision_count, 1);
        engine.submit_for_validation("alice", &session.session_id).unwrap();
    }

    #[test]
    fn test_full_run_completes() {
        let engine = engine();
        let session = engine.create_session("alice", "conv-1", None).unwrap();
        for stage in Stage::ALL {
            advance(&engine, &session.session_id, stage);
        }
        let done = engine.get_session("alice", &session.session_id).unwrap();
        assert_eq!(done.current_stage, StagePosition::Completed);
        assert_eq!(done.stage_status, StageStatus::Approved);
        assert!(done.completed_at.is_some());
        assert_eq!(replay(&done.paper_memory_digest).count(), 13);

        let err = engine.submit_for_validation("alice", &session.session_id).unwrap_err();
        assert_eq!(err.code(), "state_conflict");
    }

    #[test]
    fn test_rewind_cascades_in_one_step() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let engine = StageWorkflowEngine::new(db.clone());
        let artifacts = ArtifactRegistry::new(db);
        let session = engine.create_session("alice", "conv-1", None).unwrap();
        let id = session.session_id.clone();
        for stage in [Stage::Gagasan, Stage::Topik, Stage::Outline] {
            advance(&engine, &id, stage);
        }
        let new = |stage| NewArtifact {
            conversation_id: "conv-1".into(),
            stage: Some(stage),
            artifact_type: "section".into(),
            title: format!("{stage}"),
            content: "body".into(),
        };
        let topik_art = artifacts.create_artifact("alice", new(Stage::Topik)).unwrap();
        let outline_art = artifacts.create_artifact("alice", new(Stage::Outline)).unwrap();
        engine.mark_dirty("alice", &id).unwrap();

        let outcome = engine.rewind("alice", &id, Stage::Topik).unwrap();
        assert_eq!(outcome.record.from_stage, StagePosition::Stage(Stage::Abstrak));
        assert_eq!(outcome.record.invalidated_stages, vec![Stage::Outline, Stage::Abstrak]);
        assert_eq!(outcome.record.invalidated_artifact_ids, vec![outline_art.artifact_id.clone()]);
        assert_eq!(outcome.session.current_stage, StagePosition::Stage(Stage::Topik));
        assert_eq!(outcome.session.stage_status, StageStatus::Revision);
        assert!(!outcome.session.is_dirty);

        assert!(artifacts.get("alice", &outline_art.artifact_id).unwrap().is_invalidated());
        assert!(!artifacts.get("alice", &topik_art.artifact_id).unwrap().is_invalidated());
        let history = engine.rewind_history("alice", &id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].rewind_id, outcome.record.rewind_id);
    }

    #[test]
    fn test_rewind_invalidates_artifacts_of_unreached_stages() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let engine = StageWorkflowEngine::new(db.clone());
        let artifacts = ArtifactRegistry::new(db);
        let session = engine.create_session("alice", "conv-1", None).unwrap();
        let id = session.session_id.clone();
        advance(&engine, &id, Stage::Gagasan);
        advance(&engine, &id, Stage::Topik);
        let early = artifacts
            .create_artifact(
                "alice",
                NewArtifact {
                    conversation_id: "conv-1".into(),
                    stage: Some(Stage::Hasil),
                    artifact_type: "section".into(),
                    title: "results sketch".into(),
                    content: "body".into(),
                },
            )
            .unwrap();

        let outcome = engine.rewind("alice", &id, Stage::Topik).unwrap();
        assert_eq!(outcome.record.invalidated_stages, vec![Stage::Outline]);
        assert_eq!(outcome.record.invalidated_artifact_ids, vec![early.artifact_id.clone()]);
        let hasil = artifacts.get("alice", &early.artifact_id).unwrap();
        assert_eq!(hasil.invalidated_by_rewind_to_stage, Some(Stage::Topik));
        assert!(artifacts.list_current("alice", "conv-1").unwrap().is_empty());
    }

    #[test]
    fn test_reapproval_leaves_one_live_decision_per_stage() {
        let engine = engine();
        let session = engine.create_session("alice", "conv-1", None).unwrap();
        let id = session.session_id;
        advance(&engine, &id, Stage::Gagasan);
        advance(&engine, &id, Stage::Topik);
        engine.rewind("alice", &id, Stage::Topik).unwrap();

        let mut data = required_data(Stage::Topik);
        data.insert("ringkasan".into(), json!("narrowed topic"));
        engine.update_stage_data("alice", &id, Stage::Topik, &data).unwrap();
        engine.submit_for_validation("alice", &id).unwrap();
        let outcome = engine.approve("alice", &id).unwrap();

        let digest = &outcome.session.paper_memory_digest;
        let live_topik: Vec<_> = replay(digest).filter(|e| e.stage == Stage::Topik).collect();
        assert_eq!(live_topik.len(), 1);
        assert_eq!(live_topik[0].decision, "narrowed topic");
        assert_eq!(digest.iter().filter(|e| e.stage == Stage::Topik).count(), 2);
        assert_eq!(replay(digest).count(), 2);
    }

    #[test]
    fn test_forward_rewind_leaves_session_untouched() {
        let engine = engine();
        let session = engine.create_session("alice", "conv-1", None).unwrap();
        advance(&engine, &session.session_id, Stage::Gagasan);
        let before = engine.get_session("alice", &session.session_id).unwrap();
        let err = engine
            .rewind("alice", &session.session_id, Stage::Hasil)
            .unwrap_err();
        assert_eq!(err.code(), "state_conflict");
        assert_eq!(engine.get_session("alice", &session.session_id).unwrap(), before);
        assert!(engine.rewind_history("alice", &session.session_id).unwrap().is_empty());
    }

    #[test]
    fn test_configured_policy_resets_target_counter() {
        let engine = engine().with_policy(RewindPolicy {
            target_revision_count: RevisionCountPolicy::Reset,
            supersede_target_digest: true,
        });
        let session = engine.create_session("alice", "conv-1", None).unwrap();
        let id = session.session_id;
        engine
            .update_stage_data("alice", &id, Stage::Gagasan, &required_data(Stage::Gagasan))
            .unwrap();
        engine.submit_for_validation("alice", &id).unwrap();
        engine.request_revision("alice", &id, "again").unwrap();
        engine.submit_for_validation("alice", &id).unwrap();
        engine.approve("alice", &id).unwrap();

        let outcome = engine.rewind("alice", &id, Stage::Gagasan).unwrap();
        assert_eq!(outcome.session.entry(Stage::Gagasan).unwrap().revision_count, 0);
        assert_eq!(replay(&outcome.session.paper_memory_digest).count(), 0);
    }

    #[test]
    fn test_reads_enforce_ownership() {
        let engine = engine();
        let session = engine.create_session("alice", "conv-1", None).unwrap();
        engine.create_session("alice", "conv-2", None).unwrap();
        assert_eq!(
            engine.get_session("bob", &session.session_id).unwrap_err().code(),
            "authorization_error"
        );
        assert!(engine.get_by_conversation("bob", "conv-1").is_err());
        assert!(engine.get_by_conversation("bob", "conv-9").unwrap().is_none());
        assert_eq!(engine.list_by_user("alice").unwrap().len(), 2);
        assert!(engine.list_by_user("bob").unwrap().is_empty());
        assert_eq!(
            engine.mark_dirty("alice", "ps_missing").unwrap_err().code(),
            "not_found"
        );
    }
}
