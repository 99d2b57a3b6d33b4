//! Concurrent writers on one database file.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use paperflow::core::skill::VersionStatus;
use paperflow::core::stage::Stage;
use paperflow::lifecycle::store::DraftPatch;
use paperflow::test_utils::fixtures::{ADMIN, TempDb, draft_request, valid_skill_content};

const THREADS: usize = 6;
const DRAFTS_PER_THREAD: usize = 5;

fn patch(n: usize) -> DraftPatch {
    DraftPatch {
        content: valid_skill_content(Stage::Pendahuluan),
        change_note: Some(format!("draft {n}")),
        ..DraftPatch::default()
    }
}

#[test]
fn test_concurrent_drafts_on_one_handle_get_unique_versions() {
    let db = TempDb::new();
    let store = Arc::new(db.store());
    store
        .create_or_update_draft(ADMIN, draft_request(Stage::Pendahuluan))
        .unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..DRAFTS_PER_THREAD)
                    .map(|i| {
                        store
                            .create_draft_version(ADMIN, "pendahuluan-skill", patch(t * 100 + i))
                            .unwrap()
                            .version
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = BTreeSet::new();
    for handle in handles {
        let versions = handle.join().unwrap();
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
        for v in versions {
            assert!(seen.insert(v), "version {v} handed out twice");
        }
    }
    let expected: BTreeSet<u32> = (2..=u32::try_from(THREADS * DRAFTS_PER_THREAD + 1).unwrap()).collect();
    assert_eq!(seen, expected);
}

#[test]
fn test_concurrent_drafts_across_handles_get_unique_versions() {
    let db = Arc::new(TempDb::new());
    db.store()
        .create_or_update_draft(ADMIN, draft_request(Stage::Pendahuluan))
        .unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                let store = db.store();
                (0..DRAFTS_PER_THREAD)
                    .map(|i| {
                        store
                            .create_draft_version(ADMIN, "pendahuluan-skill", patch(t * 100 + i))
                            .unwrap()
                            .version
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let all: Vec<u32> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let unique: BTreeSet<_> = all.iter().copied().collect();
    assert_eq!(unique.len(), all.len());

    let history = db
        .store()
        .get_version_history(ADMIN, "pendahuluan-skill")
        .unwrap();
    assert_eq!(history.versions.len(), THREADS * DRAFTS_PER_THREAD + 1);
}

#[test]
fn test_concurrent_activations_leave_one_active_version() {
    let db = Arc::new(TempDb::new());
    let store = db.store();
    store
        .create_or_update_draft(ADMIN, draft_request(Stage::Pendahuluan))
        .unwrap();
    for n in 0..THREADS {
        store
            .create_draft_version(ADMIN, "pendahuluan-skill", patch(n))
            .unwrap();
    }

    let handles: Vec<_> = (1..=u32::try_from(THREADS + 1).unwrap())
        .map(|version| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                db.store()
                    .activate_version(ADMIN, "pendahuluan-skill", version)
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let history = store
        .get_version_history(ADMIN, "pendahuluan-skill")
        .unwrap();
    let active: Vec<_> = history
        .versions
        .iter()
        .filter(|v| v.status == VersionStatus::Active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(history.active_version, Some(active[0].version));
}
