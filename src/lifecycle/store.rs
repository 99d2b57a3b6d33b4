//! Stage skill catalog and version lifecycle.
//!
//! Every mutation checks the admin role, then runs as one immediate write
//! transaction that also appends its audit row(s). Publish, activate and
//! rollback validate the target content first and write nothing on failure.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde::{Deserialize, Serialize};

use crate::core::skill::{Skill, SkillVersion, VersionStatus, default_allowed_tools, normalize_tools};
use crate::core::stage::{SearchPolicy, Stage};
use crate::core::validation::{ValidationInput, ValidationReport, validate};
use crate::error::{PfError, Result};
use crate::lifecycle::audit::{self, AuditEvent, AuditLogEntry};
use crate::lifecycle::dry_run::{DryRunReport, run_pre_activation_dry_run};
use crate::security::{Permissions, Role};
use crate::storage::{
    Database, json_column, opt_ts_column, parsed_column, to_json, ts_column, ts_to_sql,
};

/// Explicit catalog entry creation.
#[derive(Debug, Clone)]
pub struct NewSkill {
    pub stage_scope: Stage,
    pub skill_id: Option<String>,
    pub name: String,
    pub description: String,
    pub allowed_tools: Option<Vec<String>>,
}

/// Draft saved against a stage, creating the skill if needed.
#[derive(Debug, Clone)]
pub struct DraftRequest {
    pub stage_scope: Stage,
    pub name: String,
    pub description: String,
    pub content: String,
    pub change_note: Option<String>,
    pub allowed_tools: Option<Vec<String>>,
}

/// Draft added to an existing skill. Blank metadata is left untouched.
#[derive(Debug, Clone, Default)]
pub struct DraftPatch {
    pub content: String,
    pub change_note: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub allowed_tools: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSaved {
    pub skill_id: String,
    pub stage_scope: Stage,
    pub version: u32,
}

/// Result of activate or rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub skill_id: String,
    pub version: u32,
    pub previous_active_versions: Vec<u32>,
    pub validation: ValidationReport,
}

/// One row of the per-stage catalog overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSkillSummary {
    pub stage: Stage,
    pub expected_search_policy: SearchPolicy,
    pub skill: Option<Skill>,
    pub latest_version: Option<u32>,
    pub latest_draft: Option<u32>,
    pub latest_published: Option<u32>,
    pub active_version: Option<u32>,
    pub versions_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionHistory {
    pub skill: Skill,
    pub active_version: Option<u32>,
    /// Newest first.
    pub versions: Vec<SkillVersion>,
}

/// Authoring API over the skill tables.
#[derive(Clone)]
pub struct VersionStore {
    db: Arc<Database>,
    permissions: Arc<dyn Permissions>,
}

impl VersionStore {
    pub fn new(db: Arc<Database>, permissions: Arc<dyn Permissions>) -> Self {
        Self { db, permissions }
    }

    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn shared_db(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    pub fn create_skill(&self, actor: &str, req: NewSkill) -> Result<Skill> {
        self.permissions.require_role(actor, Role::Admin)?;
        let skill_id = req
            .skill_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map_or_else(|| req.stage_scope.default_skill_id(), ToString::to_string);

        let skill = self.db.write_tx("create_skill", |tx| {
            let now = Utc::now();
            let skill = insert_skill(
                tx,
                &skill_id,
                req.stage_scope,
                &req.name,
                &req.description,
                req.allowed_tools.as_deref(),
                actor,
                now,
            )?;
            audit::append(
                tx,
                &skill.skill_id,
                None,
                Some(actor),
                &AuditEvent::Create {
                    stage_scope: req.stage_scope,
                    source: "create_skill".to_string(),
                },
                now,
            )?;
            Ok(skill)
        });
        let skill = skill.map_err(|err| rejected("create_skill", &skill_id, None, err))?;

        tracing::info!(skill_id = %skill.skill_id, stage = %skill.stage_scope, "created skill");
        Ok(skill)
    }

    pub fn create_or_update_draft(&self, actor: &str, req: DraftRequest) -> Result<DraftSaved> {
        self.permissions.require_role(actor, Role::Admin)?;

        let saved = self.db.write_tx("create_or_update_draft", |tx| {
            let now = Utc::now();
            let skill = match skill_by_stage(tx, req.stage_scope)? {
                Some(existing) => {
                    let tools = req
                        .allowed_tools
                        .as_deref()
                        .map_or_else(|| existing.allowed_tools.clone(), normalize_tools);
                    tx.execute(
                        "UPDATE skills SET name = ?, description = ?, allowed_tools_json = ?, updated_at = ?
                         WHERE skill_id = ?",
                        params![
                            req.name.trim(),
                            req.description.trim(),
                            to_json(&tools)?,
                            ts_to_sql(&now),
                            existing.skill_id,
                        ],
                    )?;
                    existing
                }
                None => {
                    let skill = insert_skill(
                        tx,
                        &req.stage_scope.default_skill_id(),
                        req.stage_scope,
                        &req.name,
                        &req.description,
                        req.allowed_tools.as_deref(),
                        actor,
                        now,
                    )?;
                    audit::append(
                        tx,
                        &skill.skill_id,
                        None,
                        Some(actor),
                        &AuditEvent::Create {
                            stage_scope: req.stage_scope,
                            source: "create_or_update_draft".to_string(),
                        },
                        now,
                    )?;
                    skill
                }
            };

            let version = insert_draft(
                tx,
                &skill.skill_id,
                &req.content,
                req.change_note.as_deref(),
                actor,
                now,
            )?;
            audit::append(
                tx,
                &skill.skill_id,
                Some(version),
                Some(actor),
                &AuditEvent::DraftSaved {
                    stage_scope: Some(req.stage_scope),
                    change_note: trimmed_note(req.change_note.as_deref()),
                    source: "create_or_update_draft".to_string(),
                },
                now,
            )?;

            Ok(DraftSaved {
                skill_id: skill.skill_id,
                stage_scope: req.stage_scope,
                version,
            })
        })?;

        tracing::info!(skill_id = %saved.skill_id, version = saved.version, "saved draft");
        Ok(saved)
    }

    pub fn create_draft_version(
        &self,
        actor: &str,
        skill_id: &str,
        patch: DraftPatch,
    ) -> Result<DraftSaved> {
        self.permissions.require_role(actor, Role::Admin)?;

        let saved = self.db.write_tx("create_draft_version", |tx| {
            let now = Utc::now();
            let skill = require_skill(tx, skill_id)?;

            let name = non_blank(patch.name.as_deref()).unwrap_or(&skill.name);
            let description =
                non_blank(patch.description.as_deref()).unwrap_or(&skill.description);
            let tools = patch
                .allowed_tools
                .as_deref()
                .map(normalize_tools)
                .filter(|tools| !tools.is_empty())
                .unwrap_or_else(|| skill.allowed_tools.clone());
            tx.execute(
                "UPDATE skills SET name = ?, description = ?, allowed_tools_json = ?, updated_at = ?
                 WHERE skill_id = ?",
                params![name, description, to_json(&tools)?, ts_to_sql(&now), skill.skill_id],
            )?;

            let version = insert_draft(
                tx,
                &skill.skill_id,
                &patch.content,
                patch.change_note.as_deref(),
                actor,
                now,
            )?;
            audit::append(
                tx,
                &skill.skill_id,
                Some(version),
                Some(actor),
                &AuditEvent::DraftSaved {
                    stage_scope: None,
                    change_note: trimmed_note(patch.change_note.as_deref()),
                    source: "create_draft_version".to_string(),
                },
                now,
            )?;

            Ok(DraftSaved {
                skill_id: skill.skill_id,
                stage_scope: skill.stage_scope,
                version,
            })
        })?;

        tracing::info!(skill_id = %saved.skill_id, version = saved.version, "saved draft");
        Ok(saved)
    }

    pub fn publish_version(
        &self,
        actor: &str,
        skill_id: &str,
        version: u32,
    ) -> Result<ValidationReport> {
        self.permissions.require_role(actor, Role::Admin)?;

        let report = self
            .db
            .write_tx("publish_version", |tx| {
                let now = Utc::now();
                let skill = require_skill(tx, skill_id)?;
                let target = require_version(tx, skill_id, version)?;
                match target.status {
                    VersionStatus::Archived => {
                        return Err(PfError::StateConflict(format!(
                            "{skill_id} v{version} is archived and cannot be published"
                        )));
                    }
                    VersionStatus::Active => {
                        return Err(PfError::StateConflict(format!(
                            "{skill_id} v{version} is already active"
                        )));
                    }
                    VersionStatus::Draft | VersionStatus::Published => {}
                }

                let report = validate_candidate(&skill, &target);
                if !report.ok {
                    return Err(PfError::Validation {
                        context: format!("publish {skill_id} v{version}"),
                        issues: report.issues,
                    });
                }

                tx.execute(
                    "UPDATE skill_versions SET status = 'published', published_at = ?1, updated_at = ?1
                     WHERE skill_id = ?2 AND version = ?3",
                    params![ts_to_sql(&now), skill_id, version],
                )?;
                touch_skill(tx, skill_id, now)?;
                audit::append(
                    tx,
                    skill_id,
                    Some(version),
                    Some(actor),
                    &AuditEvent::Publish {
                        validation: report.metadata.clone(),
                    },
                    now,
                )?;
                Ok(report)
            })
            .map_err(|err| rejected("publish_version", skill_id, Some(version), err))?;

        tracing::info!(skill_id, version, "published version");
        Ok(report)
    }

    pub fn activate_version(&self, actor: &str, skill_id: &str, version: u32) -> Result<Promotion> {
        self.permissions.require_role(actor, Role::Admin)?;

        let promotion = self
            .db
            .write_tx("activate_version", |tx| {
                let now = Utc::now();
                let (previous, report) = promote(tx, skill_id, version, "activate", now)?;
                audit::append(
                    tx,
                    skill_id,
                    Some(version),
                    Some(actor),
                    &AuditEvent::Activate {
                        previous_active_versions: previous.clone(),
                        validation: report.metadata.clone(),
                    },
                    now,
                )?;
                Ok(Promotion {
                    skill_id: skill_id.to_string(),
                    version,
                    previous_active_versions: previous,
                    validation: report,
                })
            })
            .map_err(|err| rejected("activate_version", skill_id, Some(version), err))?;

        tracing::info!(
            skill_id,
            version,
            previous = ?promotion.previous_active_versions,
            "activated version"
        );
        Ok(promotion)
    }

    pub fn rollback_version(
        &self,
        actor: &str,
        skill_id: &str,
        target_version: u32,
        reason: &str,
    ) -> Result<Promotion> {
        self.permissions.require_role(actor, Role::Admin)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PfError::InvalidInput(
                "rollback requires a non-empty reason".to_string(),
            ));
        }

        let promotion = self
            .db
            .write_tx("rollback_version", |tx| {
                let now = Utc::now();
                let (previous, report) = promote(tx, skill_id, target_version, "rollback", now)?;
                audit::append(
                    tx,
                    skill_id,
                    Some(target_version),
                    Some(actor),
                    &AuditEvent::Rollback {
                        reason: reason.to_string(),
                        previous_active_versions: previous.clone(),
                    },
                    now,
                )?;
                Ok(Promotion {
                    skill_id: skill_id.to_string(),
                    version: target_version,
                    previous_active_versions: previous,
                    validation: report,
                })
            })
            .map_err(|err| rejected("rollback_version", skill_id, Some(target_version), err))?;

        tracing::info!(
            skill_id,
            version = target_version,
            previous = ?promotion.previous_active_versions,
            reason,
            "rolled back"
        );
        Ok(promotion)
    }

    pub fn archive_version(&self, actor: &str, skill_id: &str, version: u32) -> Result<()> {
        self.permissions.require_role(actor, Role::Admin)?;

        self.db
            .write_tx("archive_version", |tx| {
                let now = Utc::now();
                require_skill(tx, skill_id)?;
                let target = require_version(tx, skill_id, version)?;
                if target.status == VersionStatus::Active {
                    return Err(PfError::StateConflict(format!(
                        "{skill_id} v{version} is active; activate another version before archiving it"
                    )));
                }
                tx.execute(
                    "UPDATE skill_versions SET status = 'archived', updated_at = ?
                     WHERE skill_id = ? AND version = ?",
                    params![ts_to_sql(&now), skill_id, version],
                )?;
                audit::append(tx, skill_id, Some(version), Some(actor), &AuditEvent::Archive, now)?;
                Ok(())
            })
            .map_err(|err| rejected("archive_version", skill_id, Some(version), err))?;

        tracing::info!(skill_id, version, "archived version");
        Ok(())
    }

    pub fn set_skill_enabled(&self, actor: &str, skill_id: &str, enabled: bool) -> Result<()> {
        self.permissions.require_role(actor, Role::Admin)?;

        self.db.write_tx("set_skill_enabled", |tx| {
            let now = Utc::now();
            require_skill(tx, skill_id)?;
            tx.execute(
                "UPDATE skills SET is_enabled = ?, updated_at = ? WHERE skill_id = ?",
                params![enabled, ts_to_sql(&now), skill_id],
            )?;
            let event = if enabled {
                AuditEvent::Enable
            } else {
                AuditEvent::Disable
            };
            audit::append(tx, skill_id, None, Some(actor), &event, now)?;
            Ok(())
        })?;

        tracing::info!(skill_id, enabled, "changed skill visibility");
        Ok(())
    }

    /// Catalog overview in canonical stage order, one row per stage.
    pub fn list_by_stage(&self, actor: &str) -> Result<Vec<StageSkillSummary>> {
        self.permissions.require_role(actor, Role::Admin)?;
        self.db.read_tx(|tx| {
            let mut out = Vec::with_capacity(Stage::ALL.len());
            for stage in Stage::ALL {
                let skill = skill_by_stage(tx, stage)?;
                let mut summary = StageSkillSummary {
                    stage,
                    expected_search_policy: stage.expected_search_policy(),
                    skill: None,
                    latest_version: None,
                    latest_draft: None,
                    latest_published: None,
                    active_version: None,
                    versions_count: 0,
                };
                if let Some(skill) = skill {
                    let versions = versions_for_skill(tx, &skill.skill_id)?;
                    let newest = |status: VersionStatus| {
                        versions
                            .iter()
                            .find(|v| v.status == status)
                            .map(|v| v.version)
                    };
                    summary.latest_version = versions.first().map(|v| v.version);
                    summary.latest_draft = newest(VersionStatus::Draft);
                    summary.latest_published = newest(VersionStatus::Published);
                    summary.active_version = newest(VersionStatus::Active);
                    summary.versions_count = u32::try_from(versions.len()).unwrap_or(u32::MAX);
                    summary.skill = Some(skill);
                }
                out.push(summary);
            }
            tracing::debug!(stages = out.len(), "listed skills by stage");
            Ok(out)
        })
    }

    pub fn get_skill(&self, actor: &str, skill_id: &str) -> Result<Skill> {
        self.permissions.require_role(actor, Role::Admin)?;
        self.db.read_tx(|tx| require_skill(tx, skill_id))
    }

    pub fn get_version_history(&self, actor: &str, skill_id: &str) -> Result<VersionHistory> {
        self.permissions.require_role(actor, Role::Admin)?;
        self.db.read_tx(|tx| {
            let skill = require_skill(tx, skill_id)?;
            let versions = versions_for_skill(tx, skill_id)?;
            let active_version = versions
                .iter()
                .find(|v| v.status == VersionStatus::Active)
                .map(|v| v.version);
            Ok(VersionHistory {
                skill,
                active_version,
                versions,
            })
        })
    }

    /// Run the validator on a stored version without changing anything.
    pub fn validate_version(
        &self,
        actor: &str,
        skill_id: &str,
        version: u32,
    ) -> Result<ValidationReport> {
        self.permissions.require_role(actor, Role::Admin)?;
        self.db.read_tx(|tx| {
            let skill = require_skill(tx, skill_id)?;
            let target = require_version(tx, skill_id, version)?;
            Ok(validate_candidate(&skill, &target))
        })
    }

    pub fn audit_log(&self, actor: &str, skill_id: &str) -> Result<Vec<AuditLogEntry>> {
        self.permissions.require_role(actor, Role::Admin)?;
        self.db.read_tx(|tx| audit::list_for_skill(tx, skill_id))
    }

    pub fn runtime_conflicts(&self, actor: &str, limit: usize) -> Result<Vec<AuditLogEntry>> {
        self.permissions.require_role(actor, Role::Admin)?;
        self.db.read_tx(|tx| audit::list_runtime_conflicts(tx, limit))
    }

    pub fn dry_run(&self, actor: &str) -> Result<DryRunReport> {
        self.permissions.require_role(actor, Role::Admin)?;
        run_pre_activation_dry_run(&self.db)
    }
}

/// Validate one stored version against its skill's metadata.
#[must_use]
pub fn validate_candidate(skill: &Skill, version: &SkillVersion) -> ValidationReport {
    validate(&ValidationInput {
        stage: skill.stage_scope,
        skill_id: &skill.skill_id,
        name: &skill.name,
        description: &skill.description,
        content: &version.content,
        allowed_tools: &skill.allowed_tools,
    })
}

/// Demote the current active version(s) and make `version` active.
fn promote(
    tx: &Transaction<'_>,
    skill_id: &str,
    version: u32,
    context: &str,
    now: DateTime<Utc>,
) -> Result<(Vec<u32>, ValidationReport)> {
    let skill = require_skill(tx, skill_id)?;
    let target = require_version(tx, skill_id, version)?;
    if target.status == VersionStatus::Archived {
        return Err(PfError::StateConflict(format!(
            "{skill_id} v{version} is archived and cannot be made active"
        )));
    }

    let report = validate_candidate(&skill, &target);
    if !report.ok {
        return Err(PfError::Validation {
            context: format!("{context} {skill_id} v{version}"),
            issues: report.issues,
        });
    }

    let previous: Vec<u32> = active_versions(tx, skill_id)?
        .into_iter()
        .filter(|v| *v != version)
        .collect();
    let stamp = ts_to_sql(&now);

    tx.execute(
        "UPDATE skill_versions SET status = 'published', updated_at = ?
         WHERE skill_id = ? AND status = 'active' AND version != ?",
        params![stamp, skill_id, version],
    )?;
    tx.execute(
        "UPDATE skill_versions
         SET status = 'active', activated_at = ?1, published_at = COALESCE(published_at, ?1), updated_at = ?1
         WHERE skill_id = ?2 AND version = ?3",
        params![stamp, skill_id, version],
    )?;
    tx.execute(
        "UPDATE skills SET is_enabled = 1, updated_at = ? WHERE skill_id = ?",
        params![stamp, skill_id],
    )?;

    Ok((previous, report))
}

#[allow(clippy::too_many_arguments)]
fn insert_skill(
    tx: &Transaction<'_>,
    skill_id: &str,
    stage_scope: Stage,
    name: &str,
    description: &str,
    allowed_tools: Option<&[String]>,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Skill> {
    if skill_by_id(tx, skill_id)?.is_some() {
        return Err(PfError::StateConflict(format!("skill {skill_id} already exists")));
    }
    if let Some(existing) = skill_by_stage(tx, stage_scope)? {
        return Err(PfError::StateConflict(format!(
            "stage {stage_scope} already has skill {}",
            existing.skill_id
        )));
    }

    let skill = Skill {
        skill_id: skill_id.to_string(),
        stage_scope,
        name: name.trim().to_string(),
        description: description.trim().to_string(),
        allowed_tools: allowed_tools.map_or_else(default_allowed_tools, normalize_tools),
        is_enabled: true,
        created_by: actor.to_string(),
        created_at: now,
        updated_at: now,
    };
    tx.execute(
        "INSERT INTO skills (skill_id, stage_scope, name, description, allowed_tools_json,
                             is_enabled, created_by, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)",
        params![
            skill.skill_id,
            skill.stage_scope.as_str(),
            skill.name,
            skill.description,
            to_json(&skill.allowed_tools)?,
            skill.created_by,
            ts_to_sql(&now),
            ts_to_sql(&now),
        ],
    )?;
    Ok(skill)
}

fn insert_draft(
    tx: &Transaction<'_>,
    skill_id: &str,
    content: &str,
    change_note: Option<&str>,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<u32> {
    let version = next_version(tx, skill_id)?;
    tx.execute(
        "INSERT INTO skill_versions (skill_id, version, content, status, change_note,
                                     created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'draft', ?4, ?5, ?6, ?6)",
        params![
            skill_id,
            version,
            content.trim(),
            trimmed_note(change_note),
            actor,
            ts_to_sql(&now),
        ],
    )?;
    Ok(version)
}

fn touch_skill(tx: &Transaction<'_>, skill_id: &str, now: DateTime<Utc>) -> Result<()> {
    tx.execute(
        "UPDATE skills SET updated_at = ? WHERE skill_id = ?",
        params![ts_to_sql(&now), skill_id],
    )?;
    Ok(())
}

fn rejected(op: &str, skill_id: &str, version: Option<u32>, err: PfError) -> PfError {
    if matches!(err, PfError::StateConflict(_) | PfError::Validation { .. }) {
        tracing::warn!(op, skill_id, ?version, code = err.code(), error = %err, "transition rejected");
    }
    err
}

fn trimmed_note(note: Option<&str>) -> Option<String> {
    non_blank(note).map(ToString::to_string)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

const SKILL_COLUMNS: &str = "skill_id, stage_scope, name, description, allowed_tools_json, \
     is_enabled, created_by, created_at, updated_at";

const VERSION_COLUMNS: &str = "skill_id, version, content, status, change_note, created_by, \
     created_at, updated_at, published_at, activated_at";

pub(crate) fn skill_by_id(conn: &Connection, skill_id: &str) -> Result<Option<Skill>> {
    let skill = conn
        .query_row(
            &format!("SELECT {SKILL_COLUMNS} FROM skills WHERE skill_id = ?"),
            [skill_id],
            skill_from_row,
        )
        .optional()?;
    Ok(skill)
}

pub(crate) fn skill_by_stage(conn: &Connection, stage: Stage) -> Result<Option<Skill>> {
    let skill = conn
        .query_row(
            &format!("SELECT {SKILL_COLUMNS} FROM skills WHERE stage_scope = ?"),
            [stage.as_str()],
            skill_from_row,
        )
        .optional()?;
    Ok(skill)
}

pub(crate) fn version_by_number(
    conn: &Connection,
    skill_id: &str,
    version: u32,
) -> Result<Option<SkillVersion>> {
    let found = conn
        .query_row(
            &format!("SELECT {VERSION_COLUMNS} FROM skill_versions WHERE skill_id = ? AND version = ?"),
            params![skill_id, version],
            version_from_row,
        )
        .optional()?;
    Ok(found)
}

/// Every version of a skill, newest first.
pub(crate) fn versions_for_skill(conn: &Connection, skill_id: &str) -> Result<Vec<SkillVersion>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VERSION_COLUMNS} FROM skill_versions WHERE skill_id = ? ORDER BY version DESC"
    ))?;
    let rows = stmt.query_map([skill_id], version_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Highest-numbered version with the given status.
pub(crate) fn latest_with_status(
    conn: &Connection,
    skill_id: &str,
    status: VersionStatus,
) -> Result<Option<SkillVersion>> {
    let found = conn
        .query_row(
            &format!(
                "SELECT {VERSION_COLUMNS} FROM skill_versions
                 WHERE skill_id = ? AND status = ? ORDER BY version DESC LIMIT 1"
            ),
            params![skill_id, status.as_str()],
            version_from_row,
        )
        .optional()?;
    Ok(found)
}

pub(crate) fn active_versions(conn: &Connection, skill_id: &str) -> Result<Vec<u32>> {
    let mut stmt = conn.prepare(
        "SELECT version FROM skill_versions WHERE skill_id = ? AND status = 'active' ORDER BY version",
    )?;
    let rows = stmt.query_map([skill_id], |row| row.get(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn next_version(conn: &Connection, skill_id: &str) -> Result<u32> {
    let max: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM skill_versions WHERE skill_id = ?",
        [skill_id],
        |row| row.get(0),
    )?;
    Ok(max + 1)
}

fn require_skill(conn: &Connection, skill_id: &str) -> Result<Skill> {
    skill_by_id(conn, skill_id)?.ok_or_else(|| PfError::NotFound(format!("skill {skill_id}")))
}

fn require_version(conn: &Connection, skill_id: &str, version: u32) -> Result<SkillVersion> {
    version_by_number(conn, skill_id, version)?
        .ok_or_else(|| PfError::NotFound(format!("{skill_id} v{version}")))
}

fn skill_from_row(row: &Row<'_>) -> rusqlite::Result<Skill> {
    Ok(Skill {
        skill_id: row.get(0)?,
        stage_scope: parsed_column(row, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        allowed_tools: json_column(row, 4)?,
        is_enabled: row.get::<_, i64>(5)? != 0,
        created_by: row.get(6)?,
        created_at: ts_column(row, 7)?,
        updated_at: ts_column(row, 8)?,
    })
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<SkillVersion> {
    Ok(SkillVersion {
        skill_id: row.get(0)?,
        version: row.get(1)?,
        content: row.get(2)?,
        status: parsed_column(row, 3)?,
        change_note: row.get(4)?,
        created_by: row.get(5)?,
        created_at: ts_column(row, 6)?,
        updated_at: ts_column(row, 7)?,
        published_at: opt_ts_column(row, 8)?,
        activated_at: opt_ts_column(row, 9)?,
    })
}
