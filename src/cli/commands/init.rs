//! pf init - Create a paperflow root (.paperflow/ or the user data dir)

use std::path::{Path, PathBuf};

use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::{AppContext, ROOT_DIR_NAME};
use crate::cli::Cli;
use crate::cli::output::emit_robot;
use crate::error::{PfError, Result};

const CONFIG_TEMPLATE: &str = r#"# paperflow configuration

[storage]
db_file = "paperflow.db"
busy_timeout_ms = 5000

[workflow]
# What a rewind does to the stage it lands on.
reset_target_revision_count = false
supersede_target_digest = false

[runtime]
conflict_source = "stage-skill-resolver"

[roles]
admins = []
superadmins = []
"#;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Initialize in the user data directory instead of ./.paperflow
    #[arg(long)]
    pub global: bool,

    /// Overwrite an existing config.toml with the template
    #[arg(long, short)]
    pub force: bool,
}

/// Report on the root the context already opened.
pub fn run(ctx: &AppContext, _args: &InitArgs) -> Result<()> {
    report(ctx, false)
}

/// Create the root, write a config template and run migrations.
pub fn run_without_context(cli: &Cli, args: &InitArgs) -> Result<()> {
    let root = target_root(args.global)?;
    std::fs::create_dir_all(&root)?;
    let wrote_config = write_config(&root, args.force)?;
    let ctx = AppContext::open(&root, cli)?;
    tracing::info!(root = %root.display(), "initialized paperflow root");
    report(&ctx, wrote_config)
}

fn target_root(global: bool) -> Result<PathBuf> {
    if global {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| PfError::MissingConfig("data directory not found".to_string()))?;
        return Ok(data_dir.join("paperflow"));
    }
    Ok(std::env::current_dir()?.join(ROOT_DIR_NAME))
}

fn write_config(root: &Path, force: bool) -> Result<bool> {
    let path = root.join("config.toml");
    if path.exists() && !force {
        return Ok(false);
    }
    std::fs::write(&path, CONFIG_TEMPLATE)?;
    Ok(true)
}

fn report(ctx: &AppContext, wrote_config: bool) -> Result<()> {
    let db_path = ctx.pf_root.join(&ctx.config.storage.db_file);
    if ctx.robot {
        return emit_robot(
            json!({
                "root": ctx.pf_root,
                "database": db_path,
                "schema_version": ctx.db.schema_version(),
                "config_written": wrote_config,
            }),
            Vec::new(),
        );
    }

    println!(
        "{} paperflow root at {}",
        "✓".green().bold(),
        ctx.pf_root.display().to_string().cyan()
    );
    println!("  database: {} (schema v{})", db_path.display(), ctx.db.schema_version());
    if wrote_config {
        println!("  {}", "wrote config.toml".dimmed());
    }
    Ok(())
}
