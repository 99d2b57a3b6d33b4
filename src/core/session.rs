//! Paper session state: current stage, status, per-stage data and digest.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::digest::DigestEntry;
use super::stage::{Stage, StagePosition};
use crate::error::{PfError, Result};

/// Stage-entry keys only the workflow engine may write.
pub const SYSTEM_MANAGED_KEYS: [&str; 3] = ["validatedAt", "revisionCount", "superseded"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Drafting,
    PendingValidation,
    Approved,
    Revision,
}

impl StageStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drafting => "drafting",
            Self::PendingValidation => "pending_validation",
            Self::Approved => "approved",
            Self::Revision => "revision",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageStatus {
    type Err = PfError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "drafting" => Ok(Self::Drafting),
            "pending_validation" => Ok(Self::PendingValidation),
            "approved" => Ok(Self::Approved),
            "revision" => Ok(Self::Revision),
            other => Err(PfError::Serialization(format!(
                "unknown stage status '{other}'"
            ))),
        }
    }
}

/// Data recorded for one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageEntry {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revision_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub superseded: bool,
}

impl StageEntry {
    /// Shallow-merge caller data into this entry.
    ///
    /// Every key must be whitelisted for `stage`; system-managed keys are refused.
    /// Nothing is applied unless every key passes.
    pub fn merge(&mut self, stage: Stage, data: &Map<String, Value>) -> Result<()> {
        for key in data.keys() {
            if SYSTEM_MANAGED_KEYS.contains(&key.as_str()) {
                return Err(PfError::InvalidInput(format!(
                    "'{key}' is managed by the workflow and cannot be written"
                )));
            }
            if !stage.is_whitelisted_key(key) {
                return Err(PfError::InvalidInput(format!(
                    "'{key}' is not an allowed key for stage '{stage}'"
                )));
            }
        }
        if let Some(value) = data.get("artifactId") {
            if !(value.is_string() || value.is_null()) {
                return Err(PfError::InvalidInput(
                    "'artifactId' must be a string".to_string(),
                ));
            }
        }

        for (key, value) in data {
            if key == "artifactId" {
                self.artifact_id = value.as_str().map(ToString::to_string);
            } else {
                self.fields.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    /// Required fields that are absent or empty.
    #[must_use]
    pub fn missing_required(&self, stage: Stage) -> Vec<&'static str> {
        stage
            .required_fields()
            .iter()
            .copied()
            .filter(|field| self.fields.get(*field).is_none_or(is_blank))
            .collect()
    }

    #[must_use]
    pub fn ringkasan(&self) -> Option<&str> {
        self.fields.get("ringkasan").and_then(Value::as_str)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSession {
    pub session_id: String,
    pub user_id: String,
    pub conversation_id: String,
    pub current_stage: StagePosition,
    pub stage_status: StageStatus,
    pub stage_data: BTreeMap<Stage, StageEntry>,
    pub paper_memory_digest: Vec<DigestEntry>,
    pub is_dirty: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PaperSession {
    /// A fresh session at the first stage.
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            current_stage: StagePosition::Stage(Stage::FIRST),
            stage_status: StageStatus::Drafting,
            stage_data: BTreeMap::new(),
            paper_memory_digest: Vec::new(),
            is_dirty: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn entry(&self, stage: Stage) -> Option<&StageEntry> {
        self.stage_data.get(&stage)
    }

    pub fn entry_mut(&mut self, stage: Stage) -> &mut StageEntry {
        self.stage_data.entry(stage).or_default()
    }

    /// The stage the session is working on, or a conflict once completed.
    pub fn active_stage(&self) -> Result<Stage> {
        self.current_stage.stage().ok_or_else(|| {
            PfError::StateConflict(format!(
                "session {} has completed every stage",
                self.session_id
            ))
        })
    }

    /// Ownership check applied to every user action.
    pub fn ensure_owner(&self, actor: &str) -> Result<()> {
        if self.user_id == actor {
            Ok(())
        } else {
            Err(PfError::Authorization(format!(
                "session {} does not belong to {actor}",
                self.session_id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_accepts_whitelisted_keys() {
        let mut entry = StageEntry::default();
        entry
            .merge(
                Stage::Topik,
                &map(json!({"ringkasan": "ok", "definitif": "Topic", "artifactId": "art_1"})),
            )
            .unwrap();
        assert_eq!(entry.ringkasan(), Some("ok"));
        assert_eq!(entry.artifact_id.as_deref(), Some("art_1"));
        assert!(!entry.fields.contains_key("artifactId"));
    }

    #[test]
    fn test_merge_rejects_unknown_key_without_partial_write() {
        let mut entry = StageEntry::default();
        let err = entry
            .merge(Stage::Gagasan, &map(json!({"ringkasan": "x", "judulTerpilih": "y"})))
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");
        assert!(entry.fields.is_empty());
    }

    #[test]
    fn test_merge_rejects_system_keys() {
        let mut entry = StageEntry::default();
        for key in SYSTEM_MANAGED_KEYS {
            let mut data = Map::new();
            data.insert(key.to_string(), json!(1));
            assert!(entry.merge(Stage::Hasil, &data).is_err(), "{key}");
        }
    }

    #[test]
    fn test_missing_required_treats_blank_as_missing() {
        let mut entry = StageEntry::default();
        entry
            .merge(Stage::Outline, &map(json!({"ringkasan": "  ", "sections": []})))
            .unwrap();
        assert_eq!(entry.missing_required(Stage::Outline), vec!["ringkasan", "sections"]);
    }

    #[test]
    fn test_entry_json_shape() {
        let mut entry = StageEntry::default();
        entry.merge(Stage::Gagasan, &map(json!({"ideKasar": "x"}))).unwrap();
        entry.revision_count = 2;
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["ideKasar"], "x");
        assert_eq!(value["revisionCount"], 2);
        let back: StageEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_owner_check() {
        let session = PaperSession::new("ps_1", "alice", "conv", Utc::now());
        assert!(session.ensure_owner("alice").is_ok());
        assert_eq!(session.ensure_owner("bob").unwrap_err().code(), "authorization_error");
    }
}
