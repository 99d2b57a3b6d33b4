//! Audit ledger immutability and best-effort conflict reporting.

use std::sync::Arc;

use tracing::Level;

use paperflow::core::stage::{Stage, StagePosition};
use paperflow::lifecycle::alerts::list_unresolved;
use paperflow::lifecycle::{
    FallbackReason, RuntimeConflict, RuntimeConflictReporter, StageSkillResolver,
};
use paperflow::test_utils::fixtures::{ADMIN, TempDb, draft_request};
use paperflow::test_utils::logging::capture_logs;

#[test]
fn test_skill_audit_log_rejects_update_and_delete() {
    let store = TempDb::new().store();
    store
        .create_or_update_draft(ADMIN, draft_request(Stage::Abstrak))
        .unwrap();

    let conn = store.db().conn();
    assert!(
        conn.execute("UPDATE skill_audit_log SET action = 'forged'", [])
            .is_err()
    );
    assert!(conn.execute("DELETE FROM skill_audit_log", []).is_err());
    drop(conn);

    let actions: Vec<_> = store
        .audit_log(ADMIN, "abstrak-skill")
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(actions, ["create", "draft_saved"]);
}

#[test]
fn test_reporter_failure_is_logged_and_swallowed() {
    let db = TempDb::new();
    let shared = db.open();
    shared
        .conn()
        .execute_batch("DROP TABLE system_alerts;")
        .unwrap();
    let reporter = RuntimeConflictReporter::new(Arc::clone(&shared), "integration");

    let (alert_id, logs) = capture_logs("debug", || {
        reporter.report(&RuntimeConflict::new(
            Stage::Judul,
            "no_skill",
            "no skill registered",
        ))
    });

    assert_eq!(alert_id, None);
    assert!(logs.contains(Level::ERROR, "failed to record runtime conflict"));
    let audit_rows: i64 = shared
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM skill_audit_log WHERE action = 'runtime_conflict'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(audit_rows, 0);
}

#[test]
fn test_resolver_falls_back_when_reporting_fails() {
    let db = TempDb::new();
    let shared = db.open();
    shared
        .conn()
        .execute_batch("DROP TABLE system_alerts;")
        .unwrap();
    let resolver = StageSkillResolver::new(
        Arc::clone(&shared),
        RuntimeConflictReporter::new(Arc::clone(&shared), "integration"),
    );

    let (resolved, logs) = capture_logs("debug", || {
        resolver.resolve_stage_instructions(StagePosition::Stage(Stage::Hasil), "fallback", None)
    });
    assert_eq!(resolved.instructions, "fallback");
    assert_eq!(resolved.fallback_reason, Some(FallbackReason::NoSkill));
    assert!(logs.has_errors());
}

#[test]
fn test_conflicts_land_in_alerts_and_audit() {
    let store = TempDb::new().store();
    let shared = store.shared_db();
    let reporter = RuntimeConflictReporter::new(Arc::clone(&shared), "integration");

    let mut conflict = RuntimeConflict::new(Stage::Kesimpulan, "search_policy_mismatch", "drifted");
    conflict.request_id = Some("req-42".to_string());
    let alert_id = reporter.report(&conflict).unwrap();

    let alerts = list_unresolved(&shared.conn(), 10).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].id, alert_id);
    assert_eq!(alerts[0].source, "integration");
    assert_eq!(alerts[0].metadata["skillId"], "kesimpulan-skill");
    assert_eq!(alerts[0].metadata["requestId"], "req-42");

    let conflicts = store.runtime_conflicts(ADMIN, 10).unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].skill_id, "kesimpulan-skill");
    assert_eq!(conflicts[0].action, "runtime_conflict");
}
