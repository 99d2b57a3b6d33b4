//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

use std::path::Path;

use clap::Subcommand;

pub mod alerts;
pub mod artifact;
pub mod dry_run;
pub mod init;
pub mod session;
pub mod skill;

use crate::app::AppContext;
use crate::error::{PfError, Result};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a paperflow root and its database
    Init(init::InitArgs),

    /// Author and promote stage skills
    Skill(skill::SkillArgs),

    /// Validate the next candidate version of every stage
    DryRun(dry_run::DryRunArgs),

    /// Drive paper sessions through the stages
    Session(session::SessionArgs),

    /// Manage stage artifacts
    Artifact(artifact::ArtifactArgs),

    /// Inspect and resolve system alerts
    Alerts(alerts::AlertsArgs),
}

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Init(args) => init::run(ctx, args),
        Commands::Skill(args) => skill::run(ctx, args),
        Commands::DryRun(args) => dry_run::run(ctx, args),
        Commands::Session(args) => session::run(ctx, args),
        Commands::Artifact(args) => artifact::run(ctx, args),
        Commands::Alerts(args) => alerts::run(ctx, args),
    }
}

/// Read text from a file path, or stdin when the path is `-`.
pub(crate) fn read_text(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        return std::io::read_to_string(std::io::stdin()).map_err(PfError::from);
    }
    std::fs::read_to_string(path)
        .map_err(|err| PfError::InvalidInput(format!("read {}: {err}", path.display())))
}

/// Split a comma-separated tool list.
pub(crate) fn split_list(raw: Option<&str>) -> Option<Vec<String>> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    })
}
