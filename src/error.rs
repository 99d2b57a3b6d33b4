//! Error types for paperflow.

use thiserror::Error;

use crate::core::validation::ValidationIssue;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PfError>;

#[derive(Debug, Error)]
pub enum PfError {
    /// Role or ownership check failed. Nothing was written.
    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Skill content was rejected by the content validator.
    #[error("{context} rejected: {}", join_issues(.issues))]
    Validation {
        context: String,
        issues: Vec<ValidationIssue>,
    },

    /// The requested transition is illegal from the current state.
    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PfError {
    /// Stable machine-readable code, used by robot output.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Authorization(_) => "authorization_error",
            Self::NotFound(_) => "not_found",
            Self::Validation { .. } => "validation_error",
            Self::StateConflict(_) => "state_conflict",
            Self::InvalidInput(_) => "invalid_input",
            Self::Config(_) | Self::MissingConfig(_) => "config_error",
            Self::Serialization(_) => "serialization_error",
            Self::Database(_) => "database_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Itemized validator issues, empty for every other variant.
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Self::Validation { issues, .. } => issues,
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for PfError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.message.as_str())
        .collect::<Vec<_>>()
        .join(" | ")
}
