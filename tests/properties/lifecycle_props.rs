use proptest::prelude::*;

use paperflow::core::skill::VersionStatus;
use paperflow::core::stage::Stage;
use paperflow::lifecycle::store::DraftPatch;
use paperflow::test_utils::fixtures::{ADMIN, draft_request, store_in_memory, valid_skill_content};

const SKILL: &str = "outline-skill";

#[derive(Debug, Clone)]
enum Op {
    Draft { valid: bool },
    Publish(u32),
    Activate(u32),
    Rollback(u32),
    Archive(u32),
    Toggle(bool),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(|valid| Op::Draft { valid }),
        (1u32..6).prop_map(Op::Publish),
        (1u32..6).prop_map(Op::Activate),
        (1u32..6).prop_map(Op::Rollback),
        (1u32..6).prop_map(Op::Archive),
        any::<bool>().prop_map(Op::Toggle),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_at_most_one_active_version(ops in prop::collection::vec(arb_op(), 1..24)) {
        let store = store_in_memory();
        store.create_or_update_draft(ADMIN, draft_request(Stage::Outline)).unwrap();

        for op in ops {
            // Rejected operations are fine; the invariant must hold either way.
            let _ = match op {
                Op::Draft { valid } => {
                    let content = if valid {
                        valid_skill_content(Stage::Outline)
                    } else {
                        "## Objective\nincomplete".to_string()
                    };
                    store
                        .create_draft_version(ADMIN, SKILL, DraftPatch { content, ..DraftPatch::default() })
                        .map(|_| ())
                }
                Op::Publish(v) => store.publish_version(ADMIN, SKILL, v).map(|_| ()),
                Op::Activate(v) => store.activate_version(ADMIN, SKILL, v).map(|_| ()),
                Op::Rollback(v) => store.rollback_version(ADMIN, SKILL, v, "property").map(|_| ()),
                Op::Archive(v) => store.archive_version(ADMIN, SKILL, v),
                Op::Toggle(enabled) => store.set_skill_enabled(ADMIN, SKILL, enabled),
            };

            let history = store.get_version_history(ADMIN, SKILL).unwrap();
            let active: Vec<u32> = history
                .versions
                .iter()
                .filter(|v| v.status == VersionStatus::Active)
                .map(|v| v.version)
                .collect();
            prop_assert!(active.len() <= 1, "active versions: {:?}", active);
            prop_assert_eq!(history.active_version, active.first().copied());
        }
    }

    #[test]
    fn test_version_numbers_are_dense(drafts in 1usize..12) {
        let store = store_in_memory();
        store.create_or_update_draft(ADMIN, draft_request(Stage::Outline)).unwrap();
        for _ in 1..drafts {
            store
                .create_draft_version(
                    ADMIN,
                    SKILL,
                    DraftPatch { content: valid_skill_content(Stage::Outline), ..DraftPatch::default() },
                )
                .unwrap();
        }
        let history = store.get_version_history(ADMIN, SKILL).unwrap();
        let mut versions: Vec<u32> = history.versions.iter().map(|v| v.version).collect();
        versions.sort_unstable();
        let expected: Vec<u32> = (1..=u32::try_from(drafts).unwrap()).collect();
        prop_assert_eq!(versions, expected);
    }
}
