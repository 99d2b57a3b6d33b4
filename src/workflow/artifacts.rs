//! Stage artifacts and their rewind invalidation.
//!
//! Updates never overwrite: each one inserts a new version linked to its
//! parent, and the new version starts without invalidation. Rewinds only ever
//! stamp `invalidated_at`; nothing here deletes rows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::stage::Stage;
use crate::error::{PfError, Result};
use crate::storage::{Database, opt_ts_column, ts_column, ts_to_sql};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact_id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub stage: Option<Stage>,
    pub artifact_type: String,
    pub title: String,
    pub content: String,
    pub version: u32,
    pub parent_id: Option<String>,
    pub invalidated_at: Option<DateTime<Utc>>,
    pub invalidated_by_rewind_to_stage: Option<Stage>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    #[must_use]
    pub const fn is_invalidated(&self) -> bool {
        self.invalidated_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub conversation_id: String,
    pub stage: Option<Stage>,
    pub artifact_type: String,
    pub title: String,
    pub content: String,
}

/// Mark artifacts of `stages` (or listed in `extra_ids`) invalidated by a
/// rewind to `target`. Already-invalidated artifacts are left alone.
///
/// Returns the ids stamped by this call.
pub fn invalidate_artifacts_for_stages(
    tx: &Transaction<'_>,
    conversation_id: &str,
    stages: &[Stage],
    target: Stage,
    extra_ids: &[String],
    now: DateTime<Utc>,
) -> Result<Vec<String>> {
    if stages.is_empty() && extra_ids.is_empty() {
        return Ok(Vec::new());
    }

    let candidates: Vec<(String, Option<String>)> = {
        let mut stmt = tx.prepare(
            "SELECT artifact_id, stage FROM artifacts
             WHERE conversation_id = ? AND invalidated_at IS NULL
             ORDER BY created_at, artifact_id",
        )?;
        let rows = stmt.query_map([conversation_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let stamp = ts_to_sql(&now);
    let mut invalidated = Vec::new();
    for (artifact_id, stage) in candidates {
        let stage_match = stage
            .as_deref()
            .and_then(|raw| raw.parse::<Stage>().ok())
            .is_some_and(|stage| stages.contains(&stage));
        if !stage_match && !extra_ids.contains(&artifact_id) {
            continue;
        }
        tx.execute(
            "UPDATE artifacts SET invalidated_at = ?, invalidated_by_rewind_to_stage = ?
             WHERE artifact_id = ? AND invalidated_at IS NULL",
            params![stamp, target.as_str(), artifact_id],
        )?;
        invalidated.push(artifact_id);
    }
    Ok(invalidated)
}

/// Artifact registry used by the chat and export surfaces.
#[derive(Clone)]
pub struct ArtifactRegistry {
    db: Arc<Database>,
}

impl ArtifactRegistry {
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create_artifact(&self, actor: &str, new: NewArtifact) -> Result<Artifact> {
        let artifact = Artifact {
            artifact_id: new_artifact_id(),
            conversation_id: new.conversation_id,
            user_id: actor.to_string(),
            stage: new.stage,
            artifact_type: new.artifact_type,
            title: new.title.trim().to_string(),
            content: new.content,
            version: 1,
            parent_id: None,
            invalidated_at: None,
            invalidated_by_rewind_to_stage: None,
            created_at: Utc::now(),
        };
        self.db.write_tx("create_artifact", |tx| insert_artifact(tx, &artifact))?;
        tracing::info!(artifact_id = %artifact.artifact_id, stage = ?artifact.stage, "created artifact");
        Ok(artifact)
    }

    /// New version of `artifact_id`. Stage is inherited; invalidation is not.
    pub fn update_artifact(
        &self,
        actor: &str,
        artifact_id: &str,
        title: Option<&str>,
        content: &str,
    ) -> Result<Artifact> {
        let artifact = self.db.write_tx("update_artifact", |tx| {
            let parent = owned_artifact(tx, actor, artifact_id)?;
            let next = Artifact {
                artifact_id: new_artifact_id(),
                conversation_id: parent.conversation_id.clone(),
                user_id: parent.user_id.clone(),
                stage: parent.stage,
                artifact_type: parent.artifact_type.clone(),
                title: title
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map_or_else(|| parent.title.clone(), ToString::to_string),
                content: content.to_string(),
                version: parent.version + 1,
                parent_id: Some(parent.artifact_id),
                invalidated_at: None,
                invalidated_by_rewind_to_stage: None,
                created_at: Utc::now(),
            };
            insert_artifact(tx, &next)?;
            Ok(next)
        })?;
        tracing::info!(
            artifact_id = %artifact.artifact_id,
            parent = ?artifact.parent_id,
            version = artifact.version,
            "updated artifact"
        );
        Ok(artifact)
    }

    pub fn clear_invalidation(&self, actor: &str, artifact_id: &str) -> Result<Artifact> {
        let artifact = self.db.write_tx("clear_invalidation", |tx| {
            owned_artifact(tx, actor, artifact_id)?;
            tx.execute(
                "UPDATE artifacts SET invalidated_at = NULL, invalidated_by_rewind_to_stage = NULL
                 WHERE artifact_id = ?",
                [artifact_id],
            )?;
            owned_artifact(tx, actor, artifact_id)
        })?;
        tracing::info!(artifact_id, "cleared artifact invalidation");
        Ok(artifact)
    }

    pub fn get(&self, actor: &str, artifact_id: &str) -> Result<Artifact> {
        self.db.read_tx(|tx| owned_artifact(tx, actor, artifact_id))
    }

    /// Latest valid version of each artifact chain in a conversation.
    pub fn list_current(&self, actor: &str, conversation_id: &str) -> Result<Vec<Artifact>> {
        self.db.read_tx(|tx| {
            list_where(
                tx,
                "a.conversation_id = ?1 AND a.user_id = ?2 AND a.invalidated_at IS NULL
                 AND NOT EXISTS (SELECT 1 FROM artifacts c WHERE c.parent_id = a.artifact_id)",
                conversation_id,
                actor,
            )
        })
    }

    pub fn list_invalidated(&self, actor: &str, conversation_id: &str) -> Result<Vec<Artifact>> {
        self.db.read_tx(|tx| {
            list_where(
                tx,
                "a.conversation_id = ?1 AND a.user_id = ?2 AND a.invalidated_at IS NOT NULL",
                conversation_id,
                actor,
            )
        })
    }
}

fn new_artifact_id() -> String {
    format!("art_{}", Uuid::new_v4().simple())
}

fn insert_artifact(tx: &Transaction<'_>, artifact: &Artifact) -> Result<()> {
    tx.execute(
        "INSERT INTO artifacts (artifact_id, conversation_id, user_id, stage, artifact_type, title,
                                content, version, parent_id, invalidated_at,
                                invalidated_by_rewind_to_stage, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?)",
        params![
            artifact.artifact_id,
            artifact.conversation_id,
            artifact.user_id,
            artifact.stage.map(Stage::as_str),
            artifact.artifact_type,
            artifact.title,
            artifact.content,
            artifact.version,
            artifact.parent_id,
            ts_to_sql(&artifact.created_at),
        ],
    )?;
    Ok(())
}

const ARTIFACT_COLUMNS: &str = "a.artifact_id, a.conversation_id, a.user_id, a.stage, a.artifact_type, \
     a.title, a.content, a.version, a.parent_id, a.invalidated_at, a.invalidated_by_rewind_to_stage, \
     a.created_at";

pub(crate) fn artifact_by_id(conn: &Connection, artifact_id: &str) -> Result<Option<Artifact>> {
    let found = conn
        .query_row(
            &format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts a WHERE a.artifact_id = ?"),
            [artifact_id],
            artifact_from_row,
        )
        .optional()?;
    Ok(found)
}

fn owned_artifact(conn: &Connection, actor: &str, artifact_id: &str) -> Result<Artifact> {
    let artifact = artifact_by_id(conn, artifact_id)?
        .ok_or_else(|| PfError::NotFound(format!("artifact {artifact_id}")))?;
    if artifact.user_id != actor {
        return Err(PfError::Authorization(format!(
            "artifact {artifact_id} does not belong to {actor}"
        )));
    }
    Ok(artifact)
}

fn list_where(
    conn: &Connection,
    predicate: &str,
    conversation_id: &str,
    actor: &str,
) -> Result<Vec<Artifact>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ARTIFACT_COLUMNS} FROM artifacts a WHERE {predicate} ORDER BY a.created_at, a.artifact_id"
    ))?;
    let rows = stmt.query_map(params![conversation_id, actor], artifact_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn opt_stage(raw: Option<String>, idx: usize) -> rusqlite::Result<Option<Stage>> {
    raw.map(|raw| {
        raw.parse::<Stage>().map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
        })
    })
    .transpose()
}

fn artifact_from_row(row: &Row<'_>) -> rusqlite::Result<Artifact> {
    Ok(Artifact {
        artifact_id: row.get(0)?,
        conversation_id: row.get(1)?,
        user_id: row.get(2)?,
        stage: opt_stage(row.get(3)?, 3)?,
        artifact_type: row.get(4)?,
        title: row.get(5)?,
        content: row.get(6)?,
        version: row.get(7)?,
        parent_id: row.get(8)?,
        invalidated_at: opt_ts_column(row, 9)?,
        invalidated_by_rewind_to_stage: opt_stage(row.get(10)?, 10)?,
        created_at: ts_column(row, 11)?,
    })
}
