//! Versioned schema migrations, tracked with `PRAGMA user_version`.

use rusqlite::Connection;

use crate::error::Result;

/// Schema version after every migration has run.
pub const SCHEMA_VERSION: u32 = 2;

const MIGRATIONS: [&str; 2] = [MIGRATION_1_SKILLS, MIGRATION_2_WORKFLOW];

const MIGRATION_1_SKILLS: &str = r"
CREATE TABLE IF NOT EXISTS skills (
    skill_id TEXT PRIMARY KEY,
    stage_scope TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    allowed_tools_json TEXT NOT NULL DEFAULT '[]',
    is_enabled INTEGER NOT NULL DEFAULT 1,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS skill_versions (
    skill_id TEXT NOT NULL REFERENCES skills(skill_id),
    version INTEGER NOT NULL CHECK (version > 0),
    content TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('draft', 'published', 'active', 'archived')),
    change_note TEXT,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    published_at TEXT,
    activated_at TEXT,
    PRIMARY KEY (skill_id, version)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_skill_versions_one_active
    ON skill_versions(skill_id) WHERE status = 'active';
CREATE INDEX IF NOT EXISTS idx_skill_versions_status
    ON skill_versions(skill_id, status, version);

CREATE TABLE IF NOT EXISTS skill_audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    skill_id TEXT NOT NULL,
    version INTEGER,
    action TEXT NOT NULL,
    actor_id TEXT,
    metadata_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_skill_audit_log_skill ON skill_audit_log(skill_id, id);
CREATE INDEX IF NOT EXISTS idx_skill_audit_log_action ON skill_audit_log(action, id);

CREATE TRIGGER IF NOT EXISTS skill_audit_log_no_update
BEFORE UPDATE ON skill_audit_log
BEGIN
    SELECT RAISE(ABORT, 'skill_audit_log is append-only');
END;

CREATE TRIGGER IF NOT EXISTS skill_audit_log_no_delete
BEFORE DELETE ON skill_audit_log
BEGIN
    SELECT RAISE(ABORT, 'skill_audit_log is append-only');
END;

CREATE TABLE IF NOT EXISTS system_alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    alert_type TEXT NOT NULL,
    severity TEXT NOT NULL CHECK (severity IN ('info', 'warning', 'critical')),
    message TEXT NOT NULL,
    source TEXT NOT NULL,
    resolved INTEGER NOT NULL DEFAULT 0,
    resolved_at TEXT,
    metadata_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_system_alerts_open ON system_alerts(resolved, id);
";

const MIGRATION_2_WORKFLOW: &str = r"
CREATE TABLE IF NOT EXISTS paper_sessions (
    session_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    conversation_id TEXT NOT NULL UNIQUE,
    current_stage TEXT NOT NULL,
    stage_status TEXT NOT NULL
        CHECK (stage_status IN ('drafting', 'pending_validation', 'approved', 'revision')),
    stage_data_json TEXT NOT NULL DEFAULT '{}',
    digest_json TEXT NOT NULL DEFAULT '[]',
    is_dirty INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_paper_sessions_user ON paper_sessions(user_id, updated_at);

CREATE TABLE IF NOT EXISTS artifacts (
    artifact_id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    stage TEXT,
    artifact_type TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    parent_id TEXT REFERENCES artifacts(artifact_id),
    invalidated_at TEXT,
    invalidated_by_rewind_to_stage TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_artifacts_conversation ON artifacts(conversation_id, stage);
CREATE INDEX IF NOT EXISTS idx_artifacts_parent ON artifacts(parent_id);

CREATE TABLE IF NOT EXISTS rewind_history (
    rewind_id TEXT PRIMARY KEY,
    seq INTEGER NOT NULL,
    session_id TEXT NOT NULL REFERENCES paper_sessions(session_id),
    from_stage TEXT NOT NULL,
    to_stage TEXT NOT NULL,
    invalidated_artifact_ids_json TEXT NOT NULL DEFAULT '[]',
    invalidated_stages_json TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_rewind_history_session ON rewind_history(session_id, seq);

CREATE TRIGGER IF NOT EXISTS rewind_history_no_update
BEFORE UPDATE ON rewind_history
BEGIN
    SELECT RAISE(ABORT, 'rewind_history is append-only');
END;

CREATE TRIGGER IF NOT EXISTS rewind_history_no_delete
BEFORE DELETE ON rewind_history
BEGIN
    SELECT RAISE(ABORT, 'rewind_history is append-only');
END;
";

/// Apply every migration newer than the stored `user_version`.
///
/// Each migration commits together with its version bump.
pub fn run_migrations(conn: &mut Connection) -> Result<u32> {
    let current: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (idx, sql) in MIGRATIONS.iter().enumerate() {
        let target = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        if target <= current {
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", target)?;
        tx.commit()?;
        tracing::debug!(version = target, "applied schema migration");
    }

    let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}
