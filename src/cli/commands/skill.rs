//! pf skill - Author, validate and promote stage skills
//!
//! Every subcommand except `active` and `resolve` needs the admin role; the
//! acting user comes from `--actor` / `PF_ACTOR`.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::commands::{read_text, split_list};
use crate::cli::output::{HumanLayout, emit_human, emit_robot, or_dash};
use crate::core::skill::VersionStatus;
use crate::core::stage::{Stage, StagePosition};
use crate::core::validation::ValidationReport;
use crate::error::Result;
use crate::lifecycle::audit::AuditLogEntry;
use crate::lifecycle::runtime::get_active_by_stage;
use crate::lifecycle::store::{DraftPatch, DraftRequest, NewSkill};

#[derive(Args, Debug)]
pub struct SkillArgs {
    #[command(subcommand)]
    pub command: SkillCommand,
}

#[derive(Subcommand, Debug)]
pub enum SkillCommand {
    /// Catalog overview, one row per stage
    List,

    /// Skill metadata and version history
    Show { skill_id: String },

    /// Register a skill for a stage without content
    Create {
        #[arg(long)]
        stage: Stage,
        #[arg(long)]
        skill_id: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        /// Comma-separated tool ids
        #[arg(long)]
        tools: Option<String>,
    },

    /// Save a draft for a stage, creating the skill on first use
    Draft {
        #[arg(long)]
        stage: Stage,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        /// Content file (`-` for stdin)
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        tools: Option<String>,
    },

    /// Add a draft version to an existing skill
    NewVersion {
        skill_id: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        tools: Option<String>,
    },

    /// Run the content validator against a version (read-only)
    Validate { skill_id: String, version: u32 },

    Publish { skill_id: String, version: u32 },

    /// Make a version the live one for its stage
    Activate { skill_id: String, version: u32 },

    /// Re-activate an earlier version
    Rollback {
        skill_id: String,
        version: u32,
        #[arg(long)]
        reason: String,
    },

    Archive { skill_id: String, version: u32 },

    Enable { skill_id: String },

    Disable { skill_id: String },

    /// Audit trail of one skill, oldest first
    Audit { skill_id: String },

    /// The live skill for a stage, as the runtime sees it
    Active { stage: Stage },

    /// Resolve runtime instructions for a stage (or `completed`)
    Resolve {
        stage: StagePosition,
        #[arg(long, default_value = "")]
        fallback: String,
        #[arg(long)]
        request_id: Option<String>,
    },
}

pub fn run(ctx: &AppContext, args: &SkillArgs) -> Result<()> {
    let store = ctx.version_store();
    let actor = ctx.actor.as_str();

    match &args.command {
        SkillCommand::List => {
            let rows = store.list_by_stage(actor)?;
            if ctx.robot {
                return emit_robot(&rows, Vec::new());
            }
            println!(
                "{:<20} {:<28} {:>6} {:>6} {:>6} {:>6}  {}",
                "STAGE".bold(),
                "SKILL".bold(),
                "LATEST".bold(),
                "DRAFT".bold(),
                "PUB".bold(),
                "ACTIVE".bold(),
                "SEARCH".bold()
            );
            for row in rows {
                let skill = row.skill.as_ref().map_or_else(
                    || "-".dimmed().to_string(),
                    |s| {
                        if s.is_enabled {
                            s.skill_id.cyan().to_string()
                        } else {
                            format!("{} (disabled)", s.skill_id).yellow().to_string()
                        }
                    },
                );
                println!(
                    "{:<20} {:<28} {:>6} {:>6} {:>6} {:>6}  {}",
                    row.stage.as_str(),
                    skill,
                    or_dash(row.latest_version),
                    or_dash(row.latest_draft),
                    or_dash(row.latest_published),
                    or_dash(row.active_version),
                    row.expected_search_policy
                );
            }
            Ok(())
        }
        SkillCommand::Show { skill_id } => {
            let history = store.get_version_history(actor, skill_id)?;
            if ctx.robot {
                return emit_robot(&history, Vec::new());
            }
            let mut layout = HumanLayout::new();
            layout
                .title(&history.skill.name)
                .kv("skill", &history.skill.skill_id)
                .kv("stage", history.skill.stage_scope.as_str())
                .kv("enabled", &history.skill.is_enabled.to_string())
                .kv("allowed tools", &history.skill.allowed_tools.join(", "))
                .kv("active version", &or_dash(history.active_version))
                .blank()
                .section("Versions");
            for version in &history.versions {
                layout.bullet(&format!(
                    "v{} {} {}{}",
                    version.version,
                    status_label(version.status),
                    version.created_at.format("%Y-%m-%d %H:%M"),
                    version
                        .change_note
                        .as_deref()
                        .map(|note| format!(" - {note}"))
                        .unwrap_or_default()
                ));
            }
            emit_human(layout);
            Ok(())
        }
        SkillCommand::Create {
            stage,
            skill_id,
            name,
            description,
            tools,
        } => {
            let skill = store.create_skill(
                actor,
                NewSkill {
                    stage_scope: *stage,
                    skill_id: skill_id.clone(),
                    name: name.clone(),
                    description: description.clone(),
                    allowed_tools: split_list(tools.as_deref()),
                },
            )?;
            if ctx.robot {
                return emit_robot(&skill, Vec::new());
            }
            println!("{} created {}", "✓".green().bold(), skill.skill_id.cyan());
            Ok(())
        }
        SkillCommand::Draft {
            stage,
            name,
            description,
            file,
            note,
            tools,
        } => {
            let saved = store.create_or_update_draft(
                actor,
                DraftRequest {
                    stage_scope: *stage,
                    name: name.clone(),
                    description: description.clone(),
                    content: read_text(file)?,
                    change_note: note.clone(),
                    allowed_tools: split_list(tools.as_deref()),
                },
            )?;
            if ctx.robot {
                return emit_robot(&saved, Vec::new());
            }
            println!(
                "{} saved {} v{} as draft",
                "✓".green().bold(),
                saved.skill_id.cyan(),
                saved.version
            );
            Ok(())
        }
        SkillCommand::NewVersion {
            skill_id,
            file,
            note,
            name,
            description,
            tools,
        } => {
            let saved = store.create_draft_version(
                actor,
                skill_id,
                DraftPatch {
                    content: read_text(file)?,
                    change_note: note.clone(),
                    name: name.clone(),
                    description: description.clone(),
                    allowed_tools: split_list(tools.as_deref()),
                },
            )?;
            if ctx.robot {
                return emit_robot(&saved, Vec::new());
            }
            println!(
                "{} saved {} v{} as draft",
                "✓".green().bold(),
                saved.skill_id.cyan(),
                saved.version
            );
            Ok(())
        }
        SkillCommand::Validate { skill_id, version } => {
            let report = store.validate_version(actor, skill_id, *version)?;
            if ctx.robot {
                return emit_robot(&report, Vec::new());
            }
            print_report(skill_id, *version, &report);
            Ok(())
        }
        SkillCommand::Publish { skill_id, version } => {
            let report = store.publish_version(actor, skill_id, *version)?;
            if ctx.robot {
                return emit_robot(&report, Vec::new());
            }
            println!("{} published {} v{}", "✓".green().bold(), skill_id.cyan(), version);
            Ok(())
        }
        SkillCommand::Activate { skill_id, version } => {
            let promotion = store.activate_version(actor, skill_id, *version)?;
            if ctx.robot {
                return emit_robot(&promotion, Vec::new());
            }
            println!(
                "{} activated {} v{} (demoted: {})",
                "✓".green().bold(),
                skill_id.cyan(),
                version,
                join_versions(&promotion.previous_active_versions)
            );
            Ok(())
        }
        SkillCommand::Rollback {
            skill_id,
            version,
            reason,
        } => {
            let promotion = store.rollback_version(actor, skill_id, *version, reason)?;
            if ctx.robot {
                return emit_robot(&promotion, Vec::new());
            }
            println!(
                "{} rolled {} back to v{} (demoted: {})",
                "✓".green().bold(),
                skill_id.cyan(),
                version,
                join_versions(&promotion.previous_active_versions)
            );
            Ok(())
        }
        SkillCommand::Archive { skill_id, version } => {
            store.archive_version(actor, skill_id, *version)?;
            if ctx.robot {
                return emit_robot(
                    serde_json::json!({"skill_id": skill_id, "version": version, "status": "archived"}),
                    Vec::new(),
                );
            }
            println!("{} archived {} v{}", "✓".green().bold(), skill_id.cyan(), version);
            Ok(())
        }
        SkillCommand::Enable { skill_id } => set_enabled(ctx, skill_id, true),
        SkillCommand::Disable { skill_id } => set_enabled(ctx, skill_id, false),
        SkillCommand::Audit { skill_id } => {
            let entries = store.audit_log(actor, skill_id)?;
            if ctx.robot {
                return emit_robot(&entries, Vec::new());
            }
            for entry in &entries {
                print_audit_entry(entry);
            }
            Ok(())
        }
        SkillCommand::Active { stage } => {
            let active = ctx.db.read_tx(|tx| get_active_by_stage(tx, *stage))?;
            if ctx.robot {
                return emit_robot(&active, Vec::new());
            }
            match active {
                Some(skill) => {
                    println!(
                        "{} v{} ({} search)",
                        skill.skill_id.cyan(),
                        skill.version,
                        skill.expected_search_policy
                    );
                    println!();
                    println!("{}", skill.content);
                }
                None => println!("{} no live skill for {stage}", "!".yellow()),
            }
            Ok(())
        }
        SkillCommand::Resolve {
            stage,
            fallback,
            request_id,
        } => {
            let resolved =
                ctx.resolver()
                    .resolve_stage_instructions(*stage, fallback, request_id.as_deref());
            if ctx.robot {
                return emit_robot(&resolved, Vec::new());
            }
            match resolved.fallback_reason {
                Some(reason) => println!("{} fallback: {reason}", "!".yellow()),
                None => println!(
                    "{} {} v{}",
                    "✓".green().bold(),
                    or_dash(resolved.skill_id.as_deref()).cyan(),
                    or_dash(resolved.version)
                ),
            }
            println!("{}", resolved.instructions);
            Ok(())
        }
    }
}

fn set_enabled(ctx: &AppContext, skill_id: &str, enabled: bool) -> Result<()> {
    ctx.version_store()
        .set_skill_enabled(&ctx.actor, skill_id, enabled)?;
    if ctx.robot {
        return emit_robot(
            serde_json::json!({"skill_id": skill_id, "is_enabled": enabled}),
            Vec::new(),
        );
    }
    let verb = if enabled { "enabled" } else { "disabled" };
    println!("{} {verb} {}", "✓".green().bold(), skill_id.cyan());
    Ok(())
}

fn status_label(status: VersionStatus) -> String {
    match status {
        VersionStatus::Active => status.as_str().green().bold().to_string(),
        VersionStatus::Published => status.as_str().cyan().to_string(),
        VersionStatus::Draft => status.as_str().yellow().to_string(),
        VersionStatus::Archived => status.as_str().dimmed().to_string(),
    }
}

fn join_versions(versions: &[u32]) -> String {
    if versions.is_empty() {
        return "none".to_string();
    }
    versions
        .iter()
        .map(|v| format!("v{v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_report(skill_id: &str, version: u32, report: &ValidationReport) {
    if report.ok {
        println!("{} {} v{} passes validation", "✓".green().bold(), skill_id.cyan(), version);
        return;
    }
    println!(
        "{} {} v{} has {} issue(s)",
        "✗".red().bold(),
        skill_id.cyan(),
        version,
        report.issues.len()
    );
    for issue in &report.issues {
        println!("  {} {}", issue.code.yellow(), issue.message);
    }
}

fn print_audit_entry(entry: &AuditLogEntry) {
    println!(
        "#{:<5} {} {:<16} v{:<4} {}",
        entry.id,
        entry.created_at.format("%Y-%m-%d %H:%M:%S"),
        entry.action.bold(),
        or_dash(entry.version),
        or_dash(entry.actor_id.as_deref()).dimmed()
    );
}
