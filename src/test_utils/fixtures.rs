//! Fixtures shared by unit, integration and property tests.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tempfile::TempDir;

use crate::core::stage::{SearchPolicy, Stage};
use crate::lifecycle::store::{DraftRequest, VersionStore};
use crate::security::RoleTable;
use crate::storage::Database;
use crate::workflow::StageWorkflowEngine;

/// Actor holding the admin role in [`admin_roles`].
pub const ADMIN: &str = "admin-1";

/// A plain user with no catalog rights.
pub const AUTHOR: &str = "student-1";

/// Skill content that passes every validator check for `stage`.
#[must_use]
pub fn valid_skill_content(stage: Stage) -> String {
    let policy = match stage.expected_search_policy() {
        SearchPolicy::Active => "active",
        SearchPolicy::Passive => "passive",
    };
    let context = if stage == Stage::Outline {
        "Keep the section checklist current: checkedAt, checkedBy and editHistory per item."
            .to_string()
    } else if stage.is_post_outline() {
        "Read the living outline checklist (checkedAt, checkedBy, editHistory) before drafting."
            .to_string()
    } else {
        "Work from the conversation and any earlier approved stages.".to_string()
    };
    let compile = if stage == Stage::DaftarPustaka {
        "\nWhen the list is final call compileDaftarPustaka({ mode: \"persist\" })."
    } else {
        ""
    };
    let stage_key = stage
        .whitelisted_keys()
        .last()
        .copied()
        .unwrap_or("ringkasan");

    format!(
        "## Objective\n\
         Guide the user through the {stage} stage.\n\n\
         ## Input Context\n\
         {context}\n\n\
         ## Tool Policy\n\
         searchPolicy: {policy}\n\
         allowedTools: google_search, updateStageData, createArtifact, submitStageForValidation{compile}\n\n\
         ## Output Contract\n\
         - ringkasan\n\
         - ringkasanDetail\n\
         - {stage_key}\n\n\
         ## Guardrails\n\
         Ask for confirmation before saving stage data.\n\n\
         ## Done Criteria\n\
         The user agreed with the ringkasan and the stage was submitted.\n"
    )
}

#[must_use]
pub fn draft_request(stage: Stage) -> DraftRequest {
    DraftRequest {
        stage_scope: stage,
        name: format!("{stage} skill"),
        description: format!("Instructions for the {stage} stage"),
        content: valid_skill_content(stage),
        change_note: Some("initial".to_string()),
        allowed_tools: None,
    }
}

#[must_use]
pub fn admin_roles() -> Arc<RoleTable> {
    Arc::new(RoleTable::new().with_admin(ADMIN))
}

/// Version store over a fresh in-memory database.
#[must_use]
pub fn store_in_memory() -> VersionStore {
    let db = Database::open_in_memory().expect("in-memory database");
    VersionStore::new(Arc::new(db), admin_roles())
}

/// Create and activate a valid first version for all thirteen stages.
pub fn seed_active_catalog(store: &VersionStore) {
    for stage in Stage::ALL {
        let saved = store
            .create_or_update_draft(ADMIN, draft_request(stage))
            .expect("seed draft");
        store
            .activate_version(ADMIN, &saved.skill_id, saved.version)
            .expect("seed activation");
    }
}

/// Minimal stage data that satisfies the required fields of `stage`.
#[must_use]
pub fn stage_data(stage: Stage) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("ringkasan".into(), json!(format!("{stage} agreed")));
    match stage {
        Stage::Topik => {
            map.insert("definitif".into(), json!("Urban heat islands in Jakarta"));
        }
        Stage::Outline => {
            map.insert(
                "sections".into(),
                json!([{"id": "bab1", "judul": "Pendahuluan", "level": 1}]),
            );
        }
        Stage::Judul => {
            map.insert("judulTerpilih".into(), json!("Heat and the City"));
        }
        _ => {}
    }
    map
}

/// Fill, submit and approve the session's current stage as `actor`.
pub fn approve_stage(engine: &StageWorkflowEngine, actor: &str, session_id: &str, stage: Stage) {
    engine
        .update_stage_data(actor, session_id, stage, &stage_data(stage))
        .expect("stage data");
    engine
        .submit_for_validation(actor, session_id)
        .expect("submit");
    engine.approve(actor, session_id).expect("approve");
}

/// A database file inside its own temp directory.
pub struct TempDb {
    pub temp_dir: TempDir,
    pub path: PathBuf,
}

impl Default for TempDb {
    fn default() -> Self {
        Self::new()
    }
}

impl TempDb {
    #[must_use]
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("paperflow.db");
        Self { temp_dir, path }
    }

    /// Open another handle on the same file.
    #[must_use]
    pub fn open(&self) -> Arc<Database> {
        Arc::new(Database::open(&self.path).expect("open temp database"))
    }

    #[must_use]
    pub fn store(&self) -> VersionStore {
        VersionStore::new(self.open(), admin_roles())
    }
}
