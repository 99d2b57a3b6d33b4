use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{PfError, Result};
use crate::lifecycle::{RuntimeConflictReporter, StageSkillResolver, VersionStore};
use crate::security::RoleTable;
use crate::storage::Database;
use crate::workflow::{ArtifactRegistry, StageWorkflowEngine};

/// Directory name that marks a project-local paperflow root.
pub const ROOT_DIR_NAME: &str = ".paperflow";

pub struct AppContext {
    pub pf_root: PathBuf,
    pub config: Config,
    pub db: Arc<Database>,
    pub roles: Arc<RoleTable>,
    pub actor: String,
    pub robot: bool,
    pub verbosity: u8,
}

impl AppContext {
    pub fn from_cli(cli: &crate::cli::Cli) -> Result<Self> {
        let pf_root = find_pf_root()?;
        Self::open(&pf_root, cli)
    }

    /// Open the database under `pf_root`, creating the directory if needed.
    pub fn open(pf_root: &Path, cli: &crate::cli::Cli) -> Result<Self> {
        let config = Config::load(cli.config.as_deref(), pf_root)?;
        std::fs::create_dir_all(pf_root)?;
        let db = Database::open_with_timeout(
            pf_root.join(&config.storage.db_file),
            config.storage.busy_timeout(),
        )?;

        Ok(Self {
            pf_root: pf_root.to_path_buf(),
            roles: Arc::new(RoleTable::from_config(&config.roles)),
            robot: cli.robot || config.robot.is_json(),
            actor: cli.actor.clone(),
            verbosity: cli.verbose,
            config,
            db: Arc::new(db),
        })
    }

    #[must_use]
    pub fn version_store(&self) -> VersionStore {
        VersionStore::new(Arc::clone(&self.db), self.roles.clone())
    }

    #[must_use]
    pub fn workflow(&self) -> StageWorkflowEngine {
        StageWorkflowEngine::new(Arc::clone(&self.db)).with_policy(self.config.workflow.rewind_policy())
    }

    #[must_use]
    pub fn artifacts(&self) -> ArtifactRegistry {
        ArtifactRegistry::new(Arc::clone(&self.db))
    }

    #[must_use]
    pub fn resolver(&self) -> StageSkillResolver {
        let reporter = RuntimeConflictReporter::new(
            Arc::clone(&self.db),
            self.config.runtime.conflict_source.clone(),
        );
        StageSkillResolver::new(Arc::clone(&self.db), reporter)
    }
}

/// `PF_ROOT`, else the nearest `.paperflow` above the cwd, else the user data dir.
pub fn find_pf_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var("PF_ROOT") {
        return Ok(PathBuf::from(root));
    }
    let cwd = std::env::current_dir()?;
    if let Some(found) = find_upwards(&cwd, ROOT_DIR_NAME) {
        return Ok(found);
    }

    let data_dir = dirs::data_dir()
        .ok_or_else(|| PfError::MissingConfig("data directory not found".to_string()))?;
    Ok(data_dir.join("paperflow"))
}

fn find_upwards(start: &Path, name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_dir())
}
