//! Stage skill catalog rows and their versions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::{SearchPolicy, Stage};
use crate::error::{PfError, Result};

/// Every tool a stage skill may reference.
pub const TOOL_CATALOG: [&str; 6] = [
    "google_search",
    "updateStageData",
    "createArtifact",
    "updateArtifact",
    "compileDaftarPustaka",
    "submitStageForValidation",
];

/// Tools granted to a new skill when none are supplied.
pub const DEFAULT_ALLOWED_TOOLS: [&str; 5] = [
    "google_search",
    "updateStageData",
    "createArtifact",
    "compileDaftarPustaka",
    "submitStageForValidation",
];

#[must_use]
pub fn default_allowed_tools() -> Vec<String> {
    DEFAULT_ALLOWED_TOOLS.iter().map(ToString::to_string).collect()
}

/// Normalize a tool list: trimmed, no blanks, no duplicates, order kept.
#[must_use]
pub fn normalize_tools(tools: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tools.len());
    for tool in tools {
        let tool = tool.trim();
        if !tool.is_empty() && !out.iter().any(|t| t == tool) {
            out.push(tool.to_string());
        }
    }
    out
}

/// One skill per stage scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub skill_id: String,
    pub stage_scope: Stage,
    pub name: String,
    pub description: String,
    pub allowed_tools: Vec<String>,
    pub is_enabled: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Draft,
    Published,
    Active,
    Archived,
}

impl VersionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionStatus {
    type Err = PfError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            other => Err(PfError::Serialization(format!(
                "unknown version status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillVersion {
    pub skill_id: String,
    pub version: u32,
    pub content: String,
    pub status: VersionStatus,
    pub change_note: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub activated_at: Option<DateTime<Utc>>,
}

/// The live instructions for a stage, as read by the AI runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSkill {
    pub skill_id: String,
    pub stage_scope: Stage,
    pub name: String,
    pub description: String,
    pub content: String,
    pub allowed_tools: Vec<String>,
    pub version: u32,
    pub is_enabled: bool,
    pub expected_search_policy: SearchPolicy,
}
