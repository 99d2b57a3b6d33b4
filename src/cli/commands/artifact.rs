//! pf artifact - Stage artifacts and their invalidation state

use std::path::PathBuf;

use clap::{Args, Subcommand};
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::commands::read_text;
use crate::cli::output::{emit_robot, or_dash};
use crate::core::stage::Stage;
use crate::error::Result;
use crate::workflow::artifacts::{Artifact, NewArtifact};

#[derive(Args, Debug)]
pub struct ArtifactArgs {
    #[command(subcommand)]
    pub command: ArtifactCommand,
}

#[derive(Subcommand, Debug)]
pub enum ArtifactCommand {
    Create {
        #[arg(long)]
        conversation: String,
        #[arg(long)]
        stage: Option<Stage>,
        #[arg(long = "type", default_value = "section")]
        artifact_type: String,
        #[arg(long)]
        title: String,
        /// Content file (`-` for stdin)
        #[arg(long)]
        file: PathBuf,
    },

    /// Save a new version of an artifact
    Update {
        artifact_id: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        title: Option<String>,
    },

    Show { artifact_id: String },

    /// Current (or invalidated) artifacts of a conversation
    List {
        #[arg(long)]
        conversation: String,
        #[arg(long)]
        invalidated: bool,
    },

    /// Drop the rewind invalidation mark from an artifact
    Clear { artifact_id: String },
}

pub fn run(ctx: &AppContext, args: &ArtifactArgs) -> Result<()> {
    let registry = ctx.artifacts();
    let actor = ctx.actor.as_str();

    match &args.command {
        ArtifactCommand::Create {
            conversation,
            stage,
            artifact_type,
            title,
            file,
        } => {
            let artifact = registry.create_artifact(
                actor,
                NewArtifact {
                    conversation_id: conversation.clone(),
                    stage: *stage,
                    artifact_type: artifact_type.clone(),
                    title: title.clone(),
                    content: read_text(file)?,
                },
            )?;
            output_one(ctx, &artifact)
        }
        ArtifactCommand::Update {
            artifact_id,
            file,
            title,
        } => {
            let artifact =
                registry.update_artifact(actor, artifact_id, title.as_deref(), &read_text(file)?)?;
            output_one(ctx, &artifact)
        }
        ArtifactCommand::Show { artifact_id } => output_one(ctx, &registry.get(actor, artifact_id)?),
        ArtifactCommand::List {
            conversation,
            invalidated,
        } => {
            let artifacts = if *invalidated {
                registry.list_invalidated(actor, conversation)?
            } else {
                registry.list_current(actor, conversation)?
            };
            if ctx.robot {
                return emit_robot(&artifacts, Vec::new());
            }
            for artifact in &artifacts {
                print_line(artifact);
            }
            Ok(())
        }
        ArtifactCommand::Clear { artifact_id } => {
            output_one(ctx, &registry.clear_invalidation(actor, artifact_id)?)
        }
    }
}

fn output_one(ctx: &AppContext, artifact: &Artifact) -> Result<()> {
    if ctx.robot {
        return emit_robot(artifact, Vec::new());
    }
    print_line(artifact);
    Ok(())
}

fn print_line(artifact: &Artifact) {
    let state = match artifact.invalidated_by_rewind_to_stage {
        Some(stage) => format!("invalidated (rewind to {stage})").yellow().to_string(),
        None if artifact.is_invalidated() => "invalidated".yellow().to_string(),
        None => "valid".green().to_string(),
    };
    println!(
        "{} v{} {:<16} {} [{}]",
        artifact.artifact_id.cyan(),
        artifact.version,
        or_dash(artifact.stage),
        artifact.title,
        state
    );
}
