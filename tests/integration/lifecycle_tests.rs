//! Version lifecycle end to end: drafts, promotion, rollback, archive.

use paperflow::core::skill::VersionStatus;
use paperflow::core::stage::Stage;
use paperflow::lifecycle::get_active_by_stage;
use paperflow::lifecycle::store::DraftPatch;
use paperflow::test_utils::fixtures::{ADMIN, AUTHOR, TempDb, draft_request, valid_skill_content};

fn status_of(history: &paperflow::lifecycle::store::VersionHistory, version: u32) -> VersionStatus {
    history
        .versions
        .iter()
        .find(|v| v.version == version)
        .map(|v| v.status)
        .unwrap()
}

#[test]
fn test_gagasan_publish_activate_rollback_sequence() {
    let db = TempDb::new();
    let store = db.store();

    let first = store
        .create_or_update_draft(ADMIN, draft_request(Stage::Gagasan))
        .unwrap();
    assert_eq!((first.skill_id.as_str(), first.version), ("gagasan-skill", 1));
    store.publish_version(ADMIN, "gagasan-skill", 1).unwrap();
    store.activate_version(ADMIN, "gagasan-skill", 1).unwrap();

    let second = store
        .create_or_update_draft(ADMIN, draft_request(Stage::Gagasan))
        .unwrap();
    assert_eq!(second.version, 2);
    store.publish_version(ADMIN, "gagasan-skill", 2).unwrap();
    let promoted = store.activate_version(ADMIN, "gagasan-skill", 2).unwrap();
    assert_eq!(promoted.previous_active_versions, vec![1]);

    let rolled = store
        .rollback_version(ADMIN, "gagasan-skill", 1, "v2 asks for sources too early")
        .unwrap();
    assert_eq!(rolled.previous_active_versions, vec![2]);

    let history = store.get_version_history(ADMIN, "gagasan-skill").unwrap();
    assert_eq!(history.active_version, Some(1));
    assert_eq!(status_of(&history, 1), VersionStatus::Active);
    assert_eq!(status_of(&history, 2), VersionStatus::Published);

    let actions: Vec<_> = store
        .audit_log(ADMIN, "gagasan-skill")
        .unwrap()
        .into_iter()
        .map(|entry| entry.action)
        .collect();
    assert_eq!(
        actions,
        [
            "create",
            "draft_saved",
            "publish",
            "activate",
            "draft_saved",
            "publish",
            "activate",
            "rollback"
        ]
    );

    let active = get_active_by_stage(&store.db().conn(), Stage::Gagasan)
        .unwrap()
        .unwrap();
    assert_eq!(active.version, 1);
}

#[test]
fn test_state_survives_reopening_the_file() {
    let db = TempDb::new();
    {
        let store = db.store();
        store
            .create_or_update_draft(ADMIN, draft_request(Stage::Metodologi))
            .unwrap();
        store.activate_version(ADMIN, "metodologi-skill", 1).unwrap();
    }

    let reopened = db.store();
    let history = reopened
        .get_version_history(ADMIN, "metodologi-skill")
        .unwrap();
    assert_eq!(history.active_version, Some(1));
    assert_eq!(history.skill.stage_scope, Stage::Metodologi);
}

#[test]
fn test_archiving_the_active_version_is_refused() {
    let store = TempDb::new().store();
    store
        .create_or_update_draft(ADMIN, draft_request(Stage::Hasil))
        .unwrap();
    store.activate_version(ADMIN, "hasil-skill", 1).unwrap();

    let err = store.archive_version(ADMIN, "hasil-skill", 1).unwrap_err();
    assert_eq!(err.code(), "state_conflict");

    let history = store.get_version_history(ADMIN, "hasil-skill").unwrap();
    assert_eq!(status_of(&history, 1), VersionStatus::Active);
    assert_eq!(
        store.audit_log(ADMIN, "hasil-skill").unwrap().last().unwrap().action,
        "activate"
    );
}

#[test]
fn test_invalid_content_blocks_promotion_without_side_effects() {
    let store = TempDb::new().store();
    store
        .create_or_update_draft(ADMIN, draft_request(Stage::Diskusi))
        .unwrap();
    let broken = valid_skill_content(Stage::Diskusi).replace("## Guardrails", "## Notes");
    let saved = store
        .create_draft_version(
            ADMIN,
            "diskusi-skill",
            DraftPatch {
                content: broken,
                change_note: Some("drop guardrails".to_string()),
                ..DraftPatch::default()
            },
        )
        .unwrap();
    assert_eq!(saved.version, 2);
    let audit_before = store.audit_log(ADMIN, "diskusi-skill").unwrap().len();

    for result in [
        store.publish_version(ADMIN, "diskusi-skill", 2).map(|_| ()),
        store.activate_version(ADMIN, "diskusi-skill", 2).map(|_| ()),
        store
            .rollback_version(ADMIN, "diskusi-skill", 2, "retry")
            .map(|_| ()),
    ] {
        let err = result.unwrap_err();
        assert_eq!(err.code(), "validation_error");
        assert!(!err.issues().is_empty());
    }

    let history = store.get_version_history(ADMIN, "diskusi-skill").unwrap();
    assert_eq!(history.active_version, None);
    assert_eq!(status_of(&history, 2), VersionStatus::Draft);
    assert_eq!(
        store.audit_log(ADMIN, "diskusi-skill").unwrap().len(),
        audit_before
    );
}

#[test]
fn test_non_admin_cannot_author_or_read_catalog() {
    let store = TempDb::new().store();
    let err = store
        .create_or_update_draft(AUTHOR, draft_request(Stage::Topik))
        .unwrap_err();
    assert_eq!(err.code(), "authorization_error");
    assert_eq!(
        store.list_by_stage(AUTHOR).unwrap_err().code(),
        "authorization_error"
    );
    assert_eq!(store.list_by_stage(ADMIN).unwrap().len(), 13);
}

#[test]
fn test_disabled_skill_is_hidden_from_runtime_until_enabled() {
    let store = TempDb::new().store();
    store
        .create_or_update_draft(ADMIN, draft_request(Stage::Lampiran))
        .unwrap();
    store.activate_version(ADMIN, "lampiran-skill", 1).unwrap();
    store
        .set_skill_enabled(ADMIN, "lampiran-skill", false)
        .unwrap();
    assert!(
        get_active_by_stage(&store.db().conn(), Stage::Lampiran)
            .unwrap()
            .is_none()
    );

    store.set_skill_enabled(ADMIN, "lampiran-skill", true).unwrap();
    assert!(
        get_active_by_stage(&store.db().conn(), Stage::Lampiran)
            .unwrap()
            .is_some()
    );
}
