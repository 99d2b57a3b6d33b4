//! Runtime-facing reads of the live skill for a stage.
//!
//! The AI runtime never sees drafts. It asks for the active version of the
//! current stage and falls back to built-in instructions when nothing usable
//! is live; every such fallback is reported as a runtime conflict.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::skill::ActiveSkill;
use crate::core::stage::{Stage, StagePosition};
use crate::core::validation::{ValidationInput, validate};
use crate::error::Result;
use crate::lifecycle::alerts::{self, NewAlert, SKILL_RUNTIME_CONFLICT, Severity};
use crate::lifecycle::audit::{self, AuditEvent};
use crate::lifecycle::store::skill_by_stage;
use crate::storage::{Database, json_column, parsed_column};

/// Active, enabled skill for `stage`, if any.
pub fn get_active_by_stage(conn: &Connection, stage: Stage) -> Result<Option<ActiveSkill>> {
    let found = conn
        .query_row(
            "SELECT s.skill_id, s.stage_scope, s.name, s.description, v.content,
                    s.allowed_tools_json, v.version, s.is_enabled
             FROM skills s
             JOIN skill_versions v ON v.skill_id = s.skill_id AND v.status = 'active'
             WHERE s.stage_scope = ? AND s.is_enabled = 1",
            [stage.as_str()],
            active_from_row,
        )
        .optional()?;
    Ok(found)
}

fn active_from_row(row: &Row<'_>) -> rusqlite::Result<ActiveSkill> {
    let stage_scope: Stage = parsed_column(row, 1)?;
    Ok(ActiveSkill {
        skill_id: row.get(0)?,
        stage_scope,
        name: row.get(2)?,
        description: row.get(3)?,
        content: row.get(4)?,
        allowed_tools: json_column(row, 5)?,
        version: row.get(6)?,
        is_enabled: row.get::<_, i64>(7)? != 0,
        expected_search_policy: stage_scope.expected_search_policy(),
    })
}

/// A runtime observation that the live configuration is not usable.
#[derive(Debug, Clone)]
pub struct RuntimeConflict {
    pub stage: Stage,
    pub skill_id: Option<String>,
    pub version: Option<u32>,
    pub rule: String,
    pub message: String,
    pub severity: Severity,
    pub request_id: Option<String>,
    pub extra: Value,
}

impl RuntimeConflict {
    #[must_use]
    pub fn new(stage: Stage, rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            skill_id: None,
            version: None,
            rule: rule.into(),
            message: message.into(),
            severity: Severity::Warning,
            request_id: None,
            extra: Value::Null,
        }
    }
}

/// Writes runtime conflicts to the audit ledger and the alert sink.
///
/// Reporting is best effort: a failure is logged and dropped so the caller
/// can keep serving with fallback instructions.
#[derive(Clone)]
pub struct RuntimeConflictReporter {
    db: Arc<Database>,
    source: String,
}

impl RuntimeConflictReporter {
    pub fn new(db: Arc<Database>, source: impl Into<String>) -> Self {
        Self {
            db,
            source: source.into(),
        }
    }

    /// Record one conflict. Returns the alert id, or `None` if nothing was written.
    pub fn report(&self, conflict: &RuntimeConflict) -> Option<i64> {
        match self.try_report(conflict) {
            Ok(alert_id) => {
                tracing::warn!(
                    stage = %conflict.stage,
                    rule = %conflict.rule,
                    alert_id,
                    "runtime conflict recorded"
                );
                Some(alert_id)
            }
            Err(err) => {
                tracing::error!(
                    stage = %conflict.stage,
                    rule = %conflict.rule,
                    error = %err,
                    "failed to record runtime conflict"
                );
                None
            }
        }
    }

    fn try_report(&self, conflict: &RuntimeConflict) -> Result<i64> {
        let skill_id = conflict
            .skill_id
            .clone()
            .unwrap_or_else(|| conflict.stage.default_skill_id());

        self.db.write_tx("report_runtime_conflict", |tx| {
            let now = Utc::now();
            audit::append(
                tx,
                &skill_id,
                conflict.version,
                None,
                &AuditEvent::RuntimeConflict {
                    rule: conflict.rule.clone(),
                    message: conflict.message.clone(),
                    stage_scope: conflict.stage,
                    request_id: conflict.request_id.clone(),
                    extra: conflict.extra.clone(),
                },
                now,
            )?;
            alerts::insert_alert(
                tx,
                &NewAlert {
                    alert_type: SKILL_RUNTIME_CONFLICT.to_string(),
                    severity: conflict.severity,
                    message: format!("[{}] {}: {}", conflict.stage, conflict.rule, conflict.message),
                    source: self.source.clone(),
                    metadata: json!({
                        "type": SKILL_RUNTIME_CONFLICT,
                        "stage": conflict.stage,
                        "skillId": skill_id,
                        "version": conflict.version,
                        "rule": conflict.rule,
                        "requestId": conflict.request_id,
                        "extra": conflict.extra,
                    }),
                },
                now,
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    CompletedStage,
    NoSkill,
    SkillDisabled,
    NoActiveVersion,
    SearchPolicyMismatch,
    RuntimeValidationFailed,
    ResolverError,
}

impl FallbackReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CompletedStage => "completed_stage",
            Self::NoSkill => "no_skill",
            Self::SkillDisabled => "skill_disabled",
            Self::NoActiveVersion => "no_active_version",
            Self::SearchPolicyMismatch => "search_policy_mismatch",
            Self::RuntimeValidationFailed => "runtime_validation_failed",
            Self::ResolverError => "resolver_error",
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionSource {
    Skill,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedInstructions {
    pub instructions: String,
    pub source: InstructionSource,
    pub skill_id: Option<String>,
    pub version: Option<u32>,
    pub fallback_reason: Option<FallbackReason>,
}

impl ResolvedInstructions {
    fn fallback(fallback: &str, reason: FallbackReason) -> Self {
        Self {
            instructions: fallback.to_string(),
            source: InstructionSource::Fallback,
            skill_id: None,
            version: None,
            fallback_reason: Some(reason),
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == InstructionSource::Fallback
    }
}

/// What the datastore says about a stage's skill.
enum Lookup {
    NoSkill,
    Disabled { skill_id: String },
    NoActive { skill_id: String },
    Live(ActiveSkill),
}

/// Picks the instructions the AI runtime uses for a stage.
#[derive(Clone)]
pub struct StageSkillResolver {
    db: Arc<Database>,
    reporter: RuntimeConflictReporter,
}

impl StageSkillResolver {
    pub fn new(db: Arc<Database>, reporter: RuntimeConflictReporter) -> Self {
        Self { db, reporter }
    }

    pub fn resolve_stage_instructions(
        &self,
        position: StagePosition,
        fallback: &str,
        request_id: Option<&str>,
    ) -> ResolvedInstructions {
        let StagePosition::Stage(stage) = position else {
            return ResolvedInstructions::fallback(fallback, FallbackReason::CompletedStage);
        };

        let lookup = match self.db.read_tx(|tx| lookup(tx, stage)) {
            Ok(lookup) => lookup,
            Err(err) => {
                tracing::error!(stage = %stage, error = %err, "failed to resolve stage skill");
                return ResolvedInstructions::fallback(fallback, FallbackReason::ResolverError);
            }
        };

        let conflict = |rule: &str, message: String| {
            let mut conflict = RuntimeConflict::new(stage, rule, message);
            conflict.request_id = request_id.map(ToString::to_string);
            conflict
        };

        let active = match lookup {
            Lookup::NoSkill => {
                let mut c = conflict("no_skill", format!("no skill registered for stage {stage}"));
                c.severity = Severity::Info;
                self.reporter.report(&c);
                return ResolvedInstructions::fallback(fallback, FallbackReason::NoSkill);
            }
            Lookup::Disabled { skill_id } => {
                let mut c = conflict("skill_disabled", format!("{skill_id} is disabled"));
                c.skill_id = Some(skill_id.clone());
                self.reporter.report(&c);
                let mut out = ResolvedInstructions::fallback(fallback, FallbackReason::SkillDisabled);
                out.skill_id = Some(skill_id);
                return out;
            }
            Lookup::NoActive { skill_id } => {
                let mut c = conflict("no_active_version", format!("{skill_id} has no usable active version"));
                c.skill_id = Some(skill_id.clone());
                self.reporter.report(&c);
                let mut out = ResolvedInstructions::fallback(fallback, FallbackReason::NoActiveVersion);
                out.skill_id = Some(skill_id);
                return out;
            }
            Lookup::Live(active) => active,
        };

        let report = validate(&ValidationInput {
            stage,
            skill_id: &active.skill_id,
            name: &active.name,
            description: &active.description,
            content: &active.content,
            allowed_tools: &active.allowed_tools,
        });

        if !report.ok {
            let (rule, reason) = if report.has_issue("search_policy_mismatch") {
                ("search_policy_mismatch", FallbackReason::SearchPolicyMismatch)
            } else {
                ("skill_validation_failed_runtime", FallbackReason::RuntimeValidationFailed)
            };
            let first = report
                .issues
                .iter()
                .find(|issue| issue.code == rule)
                .or_else(|| report.issues.first())
                .map_or_else(|| "validation failed".to_string(), |issue| issue.message.clone());
            let mut c = conflict(rule, first);
            c.skill_id = Some(active.skill_id.clone());
            c.version = Some(active.version);
            c.extra = json!({ "issueCodes": report.codes().collect::<Vec<_>>() });
            self.reporter.report(&c);

            let mut out = ResolvedInstructions::fallback(fallback, reason);
            out.skill_id = Some(active.skill_id);
            out.version = Some(active.version);
            return out;
        }

        tracing::debug!(stage = %stage, skill_id = %active.skill_id, version = active.version, "resolved stage skill");
        ResolvedInstructions {
            instructions: active.content,
            source: InstructionSource::Skill,
            skill_id: Some(active.skill_id),
            version: Some(active.version),
            fallback_reason: None,
        }
    }
}

fn lookup(conn: &Connection, stage: Stage) -> Result<Lookup> {
    let Some(skill) = skill_by_stage(conn, stage)? else {
        return Ok(Lookup::NoSkill);
    };
    if !skill.is_enabled {
        return Ok(Lookup::Disabled {
            skill_id: skill.skill_id,
        });
    }
    match get_active_by_stage(conn, stage)? {
        Some(active) if !active.content.trim().is_empty() => Ok(Lookup::Live(active)),
        _ => Ok(Lookup::NoActive {
            skill_id: skill.skill_id,
        }),
    }
}
