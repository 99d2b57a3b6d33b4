//! Whole-workflow pre-activation check.
//!
//! For every stage, pick the version that would go live next (latest draft,
//! else latest published, else the active one) and validate it. Runs on one
//! read snapshot and writes nothing.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::core::skill::VersionStatus;
use crate::core::stage::Stage;
use crate::core::validation::ValidationIssue;
use crate::error::Result;
use crate::lifecycle::store::{latest_with_status, skill_by_stage, validate_candidate};
use crate::storage::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    MissingSkill,
    MissingVersion,
    LatestDraft,
    LatestPublished,
    Active,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDryRun {
    pub stage: Stage,
    pub skill_id: Option<String>,
    pub version: Option<u32>,
    pub ok: bool,
    pub issues: Vec<ValidationIssue>,
    pub source: CandidateSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryRunReport {
    pub success: bool,
    pub total_stages: usize,
    pub passed_stages: usize,
    pub failed_stages: usize,
    pub results: Vec<StageDryRun>,
}

pub fn run_pre_activation_dry_run(db: &Database) -> Result<DryRunReport> {
    let results = db.read_tx(|tx| {
        Stage::ALL
            .iter()
            .map(|stage| check_stage(tx, *stage))
            .collect::<Result<Vec<_>>>()
    })?;

    let failed_stages = results.iter().filter(|r| !r.ok).count();
    let report = DryRunReport {
        success: failed_stages == 0,
        total_stages: Stage::ALL.len(),
        passed_stages: results.len() - failed_stages,
        failed_stages,
        results,
    };
    tracing::debug!(
        passed = report.passed_stages,
        failed = report.failed_stages,
        "pre-activation dry run finished"
    );
    Ok(report)
}

fn check_stage(conn: &Connection, stage: Stage) -> Result<StageDryRun> {
    let Some(skill) = skill_by_stage(conn, stage)? else {
        return Ok(StageDryRun {
            stage,
            skill_id: None,
            version: None,
            ok: false,
            issues: vec![ValidationIssue::new(
                "missing_skill",
                format!("no skill exists for stage {stage}"),
            )],
            source: CandidateSource::MissingSkill,
        });
    };

    let candidates = [
        (VersionStatus::Draft, CandidateSource::LatestDraft),
        (VersionStatus::Published, CandidateSource::LatestPublished),
        (VersionStatus::Active, CandidateSource::Active),
    ];
    for (status, source) in candidates {
        if let Some(version) = latest_with_status(conn, &skill.skill_id, status)? {
            let report = validate_candidate(&skill, &version);
            return Ok(StageDryRun {
                stage,
                skill_id: Some(skill.skill_id),
                version: Some(version.version),
                ok: report.ok,
                issues: report.issues,
                source,
            });
        }
    }

    Ok(StageDryRun {
        stage,
        skill_id: Some(skill.skill_id.clone()),
        version: None,
        ok: false,
        issues: vec![ValidationIssue::new(
            "missing_version",
            format!("{} has no usable version", skill.skill_id),
        )],
        source: CandidateSource::MissingVersion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::store::DraftPatch;
    use crate::test_utils::fixtures::{ADMIN, draft_request, seed_active_catalog, store_in_memory};

    #[test]
    fn test_empty_catalog_reports_missing_skills() {
        let store = store_in_memory();
        let report = run_pre_activation_dry_run(store.db()).unwrap();
        assert!(!report.success);
        assert_eq!(report.total_stages, 13);
        assert_eq!(report.failed_stages, 13);
        assert!(report
            .results
            .iter()
            .all(|r| r.source == CandidateSource::MissingSkill));
    }

    #[test]
    fn test_full_active_catalog_passes() {
        let store = store_in_memory();
        seed_active_catalog(&store);
        let report = run_pre_activation_dry_run(store.db()).unwrap();
        assert!(report.success, "{:?}", report.results);
        assert_eq!(report.passed_stages, 13);
        assert!(report.results.iter().all(|r| r.source == CandidateSource::Active));
    }

    #[test]
    fn test_prefers_draft_over_published_over_active() {
        let store = store_in_memory();
        store.create_or_update_draft(ADMIN, draft_request(Stage::Gagasan)).unwrap();
        store.create_or_update_draft(ADMIN, draft_request(Stage::Gagasan)).unwrap();
        store.activate_version(ADMIN, "gagasan-skill", 1).unwrap();
        store.publish_version(ADMIN, "gagasan-skill", 2).unwrap();

        let gagasan = |store: &crate::lifecycle::store::VersionStore| {
            run_pre_activation_dry_run(store.db()).unwrap().results[0].clone()
        };
        let row = gagasan(&store);
        assert_eq!(row.source, CandidateSource::LatestPublished);
        assert_eq!(row.version, Some(2));

        store
            .create_draft_version(
                ADMIN,
                "gagasan-skill",
                DraftPatch {
                    content: "broken".to_string(),
                    ..DraftPatch::default()
                },
            )
            .unwrap();
        let row = gagasan(&store);
        assert_eq!(row.source, CandidateSource::LatestDraft);
        assert_eq!(row.version, Some(3));
        assert!(!row.ok);
        assert!(row.issues.iter().any(|i| i.code == "missing_section_objective"));
    }

    #[test]
    fn test_skill_without_versions_is_missing_version() {
        let store = store_in_memory();
        store
            .create_skill(
                ADMIN,
                crate::lifecycle::store::NewSkill {
                    stage_scope: Stage::Judul,
                    skill_id: None,
                    name: "Judul".into(),
                    description: "Title".into(),
                    allowed_tools: None,
                },
            )
            .unwrap();
        let report = run_pre_activation_dry_run(store.db()).unwrap();
        let judul = &report.results[Stage::Judul.index()];
        assert_eq!(judul.source, CandidateSource::MissingVersion);
        assert_eq!(judul.skill_id.as_deref(), Some("judul-skill"));
    }
}
