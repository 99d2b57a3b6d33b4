//! Stage skill lifecycle: catalog, versions, audit ledger and runtime reads.

pub mod alerts;
pub mod audit;
pub mod dry_run;
pub mod runtime;
pub mod store;

pub use alerts::{NewAlert, Severity, SystemAlert};
pub use audit::{AuditEvent, AuditLogEntry};
pub use dry_run::{CandidateSource, DryRunReport, StageDryRun, run_pre_activation_dry_run};
pub use runtime::{
    FallbackReason, InstructionSource, ResolvedInstructions, RuntimeConflict,
    RuntimeConflictReporter, StageSkillResolver, get_active_by_stage,
};
pub use store::{
    DraftPatch, DraftRequest, DraftSaved, NewSkill, Promotion, StageSkillSummary, VersionHistory,
    VersionStore,
};
