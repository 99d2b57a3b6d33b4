//! Paper session workflow: stage progression, artifacts and rewind.

pub mod artifacts;
pub mod engine;
pub mod rewind;

pub use artifacts::{Artifact, ArtifactRegistry, NewArtifact, invalidate_artifacts_for_stages};
pub use engine::{ApproveOutcome, RewindOutcome, StageWorkflowEngine};
pub use rewind::{DEFAULT_REWIND_POLICY, RevisionCountPolicy, RewindPolicy, RewindRecord};
