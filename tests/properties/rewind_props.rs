use std::sync::Arc;

use proptest::prelude::*;

use paperflow::core::digest::replay;
use paperflow::core::session::StageStatus;
use paperflow::core::stage::{Stage, StagePosition};
use paperflow::storage::Database;
use paperflow::test_utils::fixtures::stage_data;
use paperflow::workflow::{RevisionCountPolicy, RewindPolicy, StageWorkflowEngine};

const OWNER: &str = "student-1";

/// Approve the first `approved` stages, sending `revised` back `revisions` times first.
fn session_after(
    engine: &StageWorkflowEngine,
    approved: usize,
    revised: usize,
    revisions: u32,
) -> String {
    let id = engine
        .create_session(OWNER, "conv-prop", None)
        .unwrap()
        .session_id;
    for stage in Stage::ALL.iter().copied().take(approved) {
        engine
            .update_stage_data(OWNER, &id, stage, &stage_data(stage))
            .unwrap();
        if stage.index() == revised {
            for _ in 0..revisions {
                engine.submit_for_validation(OWNER, &id).unwrap();
                engine.request_revision(OWNER, &id, "tighten").unwrap();
            }
        }
        engine.submit_for_validation(OWNER, &id).unwrap();
        engine.approve(OWNER, &id).unwrap();
    }
    id
}

fn engine(policy: RewindPolicy) -> StageWorkflowEngine {
    let db = Arc::new(Database::open_in_memory().unwrap());
    StageWorkflowEngine::new(db).with_policy(policy)
}

fn arb_shape() -> impl Strategy<Value = (usize, usize, u32)> {
    (1usize..8).prop_flat_map(|approved| (Just(approved), 0..approved, 0u32..3))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_default_policy_preserves_target(shape in arb_shape()) {
        let (approved, target_idx, revisions) = shape;
        let engine = engine(RewindPolicy::default());
        let id = session_after(&engine, approved, target_idx, revisions);
        let target = Stage::ALL[target_idx];

        let session = engine.rewind(OWNER, &id, target).unwrap().session;

        prop_assert_eq!(session.current_stage, StagePosition::Stage(target));
        prop_assert_eq!(session.stage_status, StageStatus::Revision);
        let entry = session.entry(target).unwrap();
        prop_assert_eq!(entry.revision_count, revisions);
        prop_assert!(!entry.superseded);

        let live: Vec<Stage> = replay(&session.paper_memory_digest).map(|e| e.stage).collect();
        let expected: Vec<Stage> = Stage::ALL[..=target_idx].to_vec();
        prop_assert_eq!(live, expected);
        prop_assert_eq!(session.paper_memory_digest.len(), approved);
        for stage in &Stage::ALL[target_idx + 1..approved] {
            prop_assert!(session.entry(*stage).unwrap().superseded);
        }
    }

    #[test]
    fn test_reset_policy_clears_target(shape in arb_shape()) {
        let (approved, target_idx, revisions) = shape;
        let engine = engine(RewindPolicy {
            target_revision_count: RevisionCountPolicy::Reset,
            supersede_target_digest: true,
        });
        let id = session_after(&engine, approved, target_idx, revisions);
        let target = Stage::ALL[target_idx];

        let session = engine.rewind(OWNER, &id, target).unwrap().session;

        prop_assert_eq!(session.entry(target).unwrap().revision_count, 0);
        let live: Vec<Stage> = replay(&session.paper_memory_digest).map(|e| e.stage).collect();
        prop_assert_eq!(live, Stage::ALL[..target_idx].to_vec());
    }

    #[test]
    fn test_forward_rewind_always_rejected(shape in arb_shape(), ahead in 1usize..4) {
        let (approved, _, _) = shape;
        let engine = engine(RewindPolicy::default());
        let id = session_after(&engine, approved, usize::MAX, 0);
        let Some(target) = Stage::from_index(approved + ahead) else {
            return Ok(());
        };
        let err = engine.rewind(OWNER, &id, target).unwrap_err();
        prop_assert_eq!(err.code(), "state_conflict");
    }
}
