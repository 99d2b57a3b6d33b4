//! Rewind cascade across sessions, digest and artifacts.

use serde_json::json;

use paperflow::core::digest::replay;
use paperflow::core::session::StageStatus;
use paperflow::core::stage::{Stage, StagePosition};
use paperflow::test_utils::fixtures::{TempDb, approve_stage};
use paperflow::workflow::engine::save_session;
use paperflow::workflow::{ArtifactRegistry, NewArtifact, StageWorkflowEngine};

const OWNER: &str = "student-1";

fn artifact(conversation: &str, stage: Stage) -> NewArtifact {
    NewArtifact {
        conversation_id: conversation.to_string(),
        stage: Some(stage),
        artifact_type: "section".to_string(),
        title: format!("{stage} draft"),
        content: format!("# {stage}\n\nbody"),
    }
}

#[test]
fn test_rewind_from_approved_outline_to_topik() {
    let db = TempDb::new();
    let shared = db.open();
    let engine = StageWorkflowEngine::new(shared.clone());
    let registry = ArtifactRegistry::new(shared.clone());

    let session = engine
        .create_session(OWNER, "conv-outline", Some("Heat islands"))
        .unwrap();
    let id = session.session_id.clone();
    let topik_artifact = registry
        .create_artifact(OWNER, artifact("conv-outline", Stage::Topik))
        .unwrap();
    let outline_artifact = registry
        .create_artifact(OWNER, artifact("conv-outline", Stage::Outline))
        .unwrap();
    let hasil_artifact = registry
        .create_artifact(OWNER, artifact("conv-outline", Stage::Hasil))
        .unwrap();

    for stage in [Stage::Gagasan, Stage::Topik, Stage::Outline] {
        approve_stage(&engine, OWNER, &id, stage);
    }

    // Park the session on outline/approved, the state the chat UI rewinds from.
    let mut parked = engine.get_session(OWNER, &id).unwrap();
    parked.current_stage = StagePosition::Stage(Stage::Outline);
    parked.stage_status = StageStatus::Approved;
    shared
        .write_tx("park_session", |tx| save_session(tx, &parked))
        .unwrap();

    let outcome = engine.rewind(OWNER, &id, Stage::Topik).unwrap();
    assert_eq!(outcome.record.from_stage, StagePosition::Stage(Stage::Outline));
    assert_eq!(outcome.record.to_stage, Stage::Topik);
    assert_eq!(outcome.record.invalidated_stages, vec![Stage::Outline]);
    let mut invalidated = outcome.record.invalidated_artifact_ids.clone();
    invalidated.sort();
    let mut expected = vec![
        outline_artifact.artifact_id.clone(),
        hasil_artifact.artifact_id.clone(),
    ];
    expected.sort();
    assert_eq!(invalidated, expected);

    let session = engine.get_session(OWNER, &id).unwrap();
    assert_eq!(session.current_stage, StagePosition::Stage(Stage::Topik));
    assert_eq!(session.stage_status, StageStatus::Revision);
    let live: Vec<_> = replay(&session.paper_memory_digest)
        .map(|entry| entry.stage)
        .collect();
    assert_eq!(live, vec![Stage::Gagasan, Stage::Topik]);
    assert_eq!(session.paper_memory_digest.len(), 3);
    assert!(session.entry(Stage::Outline).unwrap().superseded);
    assert!(!session.entry(Stage::Topik).unwrap().superseded);

    let outline = registry.get(OWNER, &outline_artifact.artifact_id).unwrap();
    assert_eq!(outline.invalidated_by_rewind_to_stage, Some(Stage::Topik));
    let hasil = registry.get(OWNER, &hasil_artifact.artifact_id).unwrap();
    assert_eq!(hasil.invalidated_by_rewind_to_stage, Some(Stage::Topik));
    let current: Vec<_> = registry
        .list_current(OWNER, "conv-outline")
        .unwrap()
        .into_iter()
        .map(|a| a.artifact_id)
        .collect();
    assert_eq!(current, vec![topik_artifact.artifact_id.clone()]);
    assert!(
        !registry
            .get(OWNER, &topik_artifact.artifact_id)
            .unwrap()
            .is_invalidated()
    );

    let history = engine.rewind_history(OWNER, &id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].rewind_id, outcome.record.rewind_id);
    assert_eq!(history[0].invalidated_stages, vec![Stage::Outline]);
}

#[test]
fn test_forward_rewind_is_rejected_without_changes() {
    let db = TempDb::new();
    let engine = StageWorkflowEngine::new(db.open());
    let session = engine.create_session(OWNER, "conv-forward", None).unwrap();
    approve_stage(&engine, OWNER, &session.session_id, Stage::Gagasan);
    let before = engine.get_session(OWNER, &session.session_id).unwrap();

    let err = engine
        .rewind(OWNER, &session.session_id, Stage::Outline)
        .unwrap_err();
    assert_eq!(err.code(), "state_conflict");

    assert_eq!(engine.get_session(OWNER, &session.session_id).unwrap(), before);
    assert!(
        engine
            .rewind_history(OWNER, &session.session_id)
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_rewind_invalidates_entry_artifacts_without_stage_tag() {
    let db = TempDb::new();
    let shared = db.open();
    let engine = StageWorkflowEngine::new(shared.clone());
    let registry = ArtifactRegistry::new(shared);
    let session = engine.create_session(OWNER, "conv-entry", None).unwrap();
    let id = session.session_id;

    let untagged = registry
        .create_artifact(
            OWNER,
            NewArtifact {
                stage: None,
                ..artifact("conv-entry", Stage::Topik)
            },
        )
        .unwrap();

    approve_stage(&engine, OWNER, &id, Stage::Gagasan);
    let mut data = paperflow::test_utils::fixtures::stage_data(Stage::Topik);
    data.insert("artifactId".into(), json!(untagged.artifact_id));
    engine
        .update_stage_data(OWNER, &id, Stage::Topik, &data)
        .unwrap();
    engine.submit_for_validation(OWNER, &id).unwrap();
    engine.approve(OWNER, &id).unwrap();

    let outcome = engine.rewind(OWNER, &id, Stage::Gagasan).unwrap();
    assert_eq!(
        outcome.record.invalidated_stages,
        vec![Stage::Topik, Stage::Outline]
    );
    assert_eq!(
        outcome.record.invalidated_artifact_ids,
        vec![untagged.artifact_id.clone()]
    );
    assert_eq!(
        registry.list_invalidated(OWNER, "conv-entry").unwrap().len(),
        1
    );
    assert!(registry.list_current(OWNER, "conv-entry").unwrap().is_empty());
}

#[test]
fn test_rewind_history_is_append_only() {
    let db = TempDb::new();
    let shared = db.open();
    let engine = StageWorkflowEngine::new(shared.clone());
    let session = engine.create_session(OWNER, "conv-ledger", None).unwrap();
    approve_stage(&engine, OWNER, &session.session_id, Stage::Gagasan);
    engine
        .rewind(OWNER, &session.session_id, Stage::Gagasan)
        .unwrap();

    let conn = shared.conn();
    assert!(
        conn.execute("UPDATE rewind_history SET to_stage = 'judul'", [])
            .is_err()
    );
    assert!(conn.execute("DELETE FROM rewind_history", []).is_err());
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM rewind_history", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_other_users_cannot_rewind() {
    let db = TempDb::new();
    let engine = StageWorkflowEngine::new(db.open());
    let session = engine.create_session(OWNER, "conv-owner", None).unwrap();
    approve_stage(&engine, OWNER, &session.session_id, Stage::Gagasan);

    let err = engine
        .rewind("someone-else", &session.session_id, Stage::Gagasan)
        .unwrap_err();
    assert_eq!(err.code(), "authorization_error");
}

#[test]
fn test_reapproved_stage_replays_only_the_new_decision() {
    let db = TempDb::new();
    let engine = StageWorkflowEngine::new(db.open());
    let id = engine
        .create_session(OWNER, "conv-reapprove", None)
        .unwrap()
        .session_id;
    for stage in [Stage::Gagasan, Stage::Topik, Stage::Outline] {
        approve_stage(&engine, OWNER, &id, stage);
    }
    engine.rewind(OWNER, &id, Stage::Topik).unwrap();

    let mut data = paperflow::test_utils::fixtures::stage_data(Stage::Topik);
    data.insert("ringkasan".into(), json!("Heat islands, narrowed to Jakarta"));
    engine
        .update_stage_data(OWNER, &id, Stage::Topik, &data)
        .unwrap();
    engine.submit_for_validation(OWNER, &id).unwrap();
    engine.approve(OWNER, &id).unwrap();

    let session = engine.get_session(OWNER, &id).unwrap();
    let live: Vec<_> = replay(&session.paper_memory_digest)
        .map(|entry| (entry.stage, entry.decision.as_str()))
        .collect();
    assert_eq!(
        live,
        vec![
            (Stage::Gagasan, "gagasan agreed"),
            (Stage::Topik, "Heat islands, narrowed to Jakarta")
        ]
    );
}
