//! pf session - Move a paper session through its stages

use clap::{Args, Subcommand};
use colored::Colorize;
use serde_json::{Map, Value};

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, or_dash};
use crate::core::digest::replay;
use crate::core::session::PaperSession;
use crate::core::stage::Stage;
use crate::error::{PfError, Result};

#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Start (or return) the session for a conversation
    Create {
        #[arg(long)]
        conversation: String,
        /// Rough idea recorded as gagasan.ideKasar
        #[arg(long)]
        idea: Option<String>,
    },

    Show { session_id: String },

    /// Session bound to a conversation
    Find { conversation: String },

    /// Sessions of the acting user, newest first
    List,

    /// Merge a JSON object into the current stage's data
    Update {
        session_id: String,
        #[arg(long)]
        stage: Stage,
        /// JSON object, e.g. '{"ringkasan":"..."}'
        #[arg(long)]
        data: String,
    },

    /// Flag the conversation as edited after stage data was recorded
    Dirty { session_id: String },

    Submit { session_id: String },

    Approve { session_id: String },

    /// Send the pending stage back for revision
    Revise {
        session_id: String,
        #[arg(long)]
        feedback: String,
    },

    /// Go back to an earlier stage, invalidating everything after it
    Rewind {
        session_id: String,
        #[arg(long)]
        to: Stage,
    },

    /// Rewinds applied to a session, oldest first
    History { session_id: String },
}

pub fn run(ctx: &AppContext, args: &SessionArgs) -> Result<()> {
    let engine = ctx.workflow();
    let actor = ctx.actor.as_str();

    match &args.command {
        SessionCommand::Create { conversation, idea } => {
            let session = engine.create_session(actor, conversation, idea.as_deref())?;
            output_session(ctx, &session)
        }
        SessionCommand::Show { session_id } => {
            output_session(ctx, &engine.get_session(actor, session_id)?)
        }
        SessionCommand::Find { conversation } => {
            let session = engine
                .get_by_conversation(actor, conversation)?
                .ok_or_else(|| PfError::NotFound(format!("session for conversation {conversation}")))?;
            output_session(ctx, &session)
        }
        SessionCommand::List => {
            let sessions = engine.list_by_user(actor)?;
            if ctx.robot {
                return emit_robot(&sessions, Vec::new());
            }
            for session in &sessions {
                println!(
                    "{} {:<24} {:<20} {}",
                    session.session_id.cyan(),
                    session.conversation_id,
                    session.current_stage.as_str(),
                    session.stage_status.as_str().dimmed()
                );
            }
            Ok(())
        }
        SessionCommand::Update {
            session_id,
            stage,
            data,
        } => {
            let data = parse_object(data)?;
            let session = engine.update_stage_data(actor, session_id, *stage, &data)?;
            output_session(ctx, &session)
        }
        SessionCommand::Dirty { session_id } => {
            output_session(ctx, &engine.mark_dirty(actor, session_id)?)
        }
        SessionCommand::Submit { session_id } => {
            output_session(ctx, &engine.submit_for_validation(actor, session_id)?)
        }
        SessionCommand::Approve { session_id } => {
            let outcome = engine.approve(actor, session_id)?;
            if ctx.robot {
                return emit_robot(&outcome, Vec::new());
            }
            println!(
                "{} approved {} -> {}",
                "✓".green().bold(),
                outcome.approved_stage.as_str().cyan(),
                outcome.next_stage
            );
            Ok(())
        }
        SessionCommand::Revise {
            session_id,
            feedback,
        } => output_session(ctx, &engine.request_revision(actor, session_id, feedback)?),
        SessionCommand::Rewind { session_id, to } => {
            let outcome = engine.rewind(actor, session_id, *to)?;
            if ctx.robot {
                return emit_robot(&outcome, Vec::new());
            }
            println!(
                "{} rewound {} -> {}",
                "✓".green().bold(),
                outcome.record.from_stage,
                outcome.record.to_stage.as_str().cyan()
            );
            println!(
                "  invalidated stages: {}",
                join_or_none(outcome.record.invalidated_stages.iter().map(|s| s.as_str()))
            );
            println!(
                "  invalidated artifacts: {}",
                join_or_none(outcome.record.invalidated_artifact_ids.iter().map(String::as_str))
            );
            Ok(())
        }
        SessionCommand::History { session_id } => {
            let records = engine.rewind_history(actor, session_id)?;
            if ctx.robot {
                return emit_robot(&records, Vec::new());
            }
            for record in &records {
                println!(
                    "{} {} {} -> {} ({} artifact(s))",
                    record.rewind_id.dimmed(),
                    record.created_at.format("%Y-%m-%d %H:%M:%S"),
                    record.from_stage,
                    record.to_stage.as_str().cyan(),
                    record.invalidated_artifact_ids.len()
                );
            }
            Ok(())
        }
    }
}

fn parse_object(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(PfError::InvalidInput("stage data must be a JSON object".to_string())),
        Err(err) => Err(PfError::InvalidInput(format!("stage data is not JSON: {err}"))),
    }
}

fn join_or_none<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() { "none".to_string() } else { joined }
}

fn output_session(ctx: &AppContext, session: &PaperSession) -> Result<()> {
    if ctx.robot {
        return emit_robot(session, Vec::new());
    }
    let mut layout = HumanLayout::new();
    layout
        .title(&session.session_id)
        .kv("conversation", &session.conversation_id)
        .kv("stage", session.current_stage.as_str())
        .kv("status", session.stage_status.as_str())
        .kv("dirty", &session.is_dirty.to_string())
        .kv("completed", &or_dash(session.completed_at.map(|t| t.to_rfc3339())));

    let digest: Vec<_> = replay(&session.paper_memory_digest).collect();
    if !digest.is_empty() {
        layout.blank().section("Decisions");
        for entry in digest {
            layout.bullet(&format!("{}: {}", entry.stage, entry.decision));
        }
    }
    emit_human(layout);
    Ok(())
}
