use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PfError, Result};
use crate::workflow::rewind::{RevisionCountPolicy, RewindPolicy, DEFAULT_REWIND_POLICY};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub roles: RolesConfig,
    #[serde(default)]
    pub robot: RobotConfig,
}

impl Config {
    pub fn load(explicit_path: Option<&Path>, pf_root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("PF_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(pf_root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Parse one TOML document on top of the defaults (no env, no files).
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let patch: ConfigPatch =
            toml::from_str(raw).map_err(|err| PfError::Config(format!("parse config: {err}")))?;
        let mut config = Self::default();
        config.merge_patch(patch);
        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("paperflow/config.toml"))
    }

    fn load_project(pf_root: &Path) -> Result<Option<ConfigPatch>> {
        let path = pf_root.join("config.toml");
        Self::load_patch(&path)
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| PfError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| PfError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.storage {
            self.storage.merge(patch);
        }
        if let Some(patch) = patch.workflow {
            self.workflow.merge(patch);
        }
        if let Some(patch) = patch.runtime {
            self.runtime.merge(patch);
        }
        if let Some(patch) = patch.roles {
            self.roles.merge(patch);
        }
        if let Some(patch) = patch.robot {
            self.robot.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if env_bool("PF_ROBOT").unwrap_or(false) {
            self.robot.format = "json".to_string();
        }

        if let Some(value) = env_u64("PF_BUSY_TIMEOUT_MS")? {
            self.storage.busy_timeout_ms = value;
        }

        if let Some(values) = env_list("PF_ADMINS") {
            self.roles.admins = merge_unique(values, &self.roles.admins);
        }
        if let Some(values) = env_list("PF_SUPERADMINS") {
            self.roles.superadmins = merge_unique(values, &self.roles.superadmins);
        }

        if let Some(value) = env_bool("PF_REWIND_RESET_REVISION_COUNT") {
            self.workflow.reset_target_revision_count = value;
        }
        if let Some(value) = env_bool("PF_REWIND_SUPERSEDE_TARGET_DIGEST") {
            self.workflow.supersede_target_digest = value;
        }

        if let Some(value) = env_string("PF_CONFLICT_SOURCE") {
            self.runtime.conflict_source = value;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_file")]
    pub db_file: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_db_file() -> String {
    "paperflow.db".to_string()
}

const fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_file: default_db_file(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StorageConfig {
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    fn merge(&mut self, patch: StoragePatch) {
        if let Some(value) = patch.db_file {
            self.db_file = value;
        }
        if let Some(value) = patch.busy_timeout_ms {
            self.busy_timeout_ms = value;
        }
    }
}

/// Rewind policy knobs. Defaults match [`DEFAULT_REWIND_POLICY`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub reset_target_revision_count: bool,
    #[serde(default)]
    pub supersede_target_digest: bool,
}

impl WorkflowConfig {
    #[must_use]
    pub const fn rewind_policy(&self) -> RewindPolicy {
        RewindPolicy {
            target_revision_count: if self.reset_target_revision_count {
                RevisionCountPolicy::Reset
            } else {
                DEFAULT_REWIND_POLICY.target_revision_count
            },
            supersede_target_digest: self.supersede_target_digest,
        }
    }

    fn merge(&mut self, patch: WorkflowPatch) {
        if let Some(value) = patch.reset_target_revision_count {
            self.reset_target_revision_count = value;
        }
        if let Some(value) = patch.supersede_target_digest {
            self.supersede_target_digest = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// `source` written on runtime-conflict alerts.
    #[serde(default = "default_conflict_source")]
    pub conflict_source: String,
}

fn default_conflict_source() -> String {
    "stage-skill-resolver".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            conflict_source: default_conflict_source(),
        }
    }
}

impl RuntimeConfig {
    fn merge(&mut self, patch: RuntimePatch) {
        if let Some(value) = patch.conflict_source {
            self.conflict_source = value;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RolesConfig {
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub superadmins: Vec<String>,
}

impl RolesConfig {
    fn merge(&mut self, patch: RolesPatch) {
        if let Some(values) = patch.admins {
            self.admins = merge_unique(values, &self.admins);
        }
        if let Some(values) = patch.superadmins {
            self.superadmins = merge_unique(values, &self.superadmins);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotConfig {
    #[serde(default)]
    pub format: String,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            format: "human".to_string(),
        }
    }
}

impl RobotConfig {
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }

    fn merge(&mut self, patch: RobotPatch) {
        if let Some(value) = patch.format {
            self.format = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub storage: Option<StoragePatch>,
    pub workflow: Option<WorkflowPatch>,
    pub runtime: Option<RuntimePatch>,
    pub roles: Option<RolesPatch>,
    pub robot: Option<RobotPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StoragePatch {
    pub db_file: Option<String>,
    pub busy_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WorkflowPatch {
    pub reset_target_revision_count: Option<bool>,
    pub supersede_target_digest: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RuntimePatch {
    pub conflict_source: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RolesPatch {
    pub admins: Option<Vec<String>>,
    pub superadmins: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RobotPatch {
    pub format: Option<String>,
}

fn merge_unique(values: Vec<String>, existing: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values.into_iter().chain(existing.iter().cloned()) {
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|err| PfError::Config(format!("invalid {key} value {value}: {err}"))),
        Err(_) => Ok(None),
    }
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ToString::to_string)
            .collect()
    })
}
