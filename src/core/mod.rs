//! Core domain types and pure logic

pub mod digest;
pub mod session;
pub mod skill;
pub mod stage;
pub mod validation;

pub use digest::DigestEntry;
pub use session::{PaperSession, StageEntry, StageStatus};
pub use skill::{ActiveSkill, Skill, SkillVersion, VersionStatus};
pub use stage::{SearchPolicy, Stage, StagePosition};
pub use validation::{ValidationInput, ValidationIssue, ValidationReport, validate};
