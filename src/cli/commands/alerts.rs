//! pf alerts - System alerts and recorded runtime conflicts

use clap::{Args, Subcommand};
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, or_dash};
use crate::error::Result;
use crate::lifecycle::alerts::{Severity, list_unresolved, resolve_alert};
use crate::security::{Permissions, Role};

#[derive(Args, Debug)]
pub struct AlertsArgs {
    #[command(subcommand)]
    pub command: AlertsCommand,
}

#[derive(Subcommand, Debug)]
pub enum AlertsCommand {
    /// Unresolved alerts, newest first
    List {
        #[arg(long, short = 'n', default_value = "50")]
        limit: usize,
    },

    Resolve { id: i64 },

    /// Runtime conflicts from the skill audit log, newest first
    Conflicts {
        #[arg(long, short = 'n', default_value = "50")]
        limit: usize,
    },
}

pub fn run(ctx: &AppContext, args: &AlertsArgs) -> Result<()> {
    match &args.command {
        AlertsCommand::List { limit } => {
            ctx.roles.require_role(&ctx.actor, Role::Admin)?;
            let alerts = ctx.db.read_tx(|tx| list_unresolved(tx, *limit))?;
            if ctx.robot {
                return emit_robot(&alerts, Vec::new());
            }
            for alert in &alerts {
                let severity = match alert.severity {
                    Severity::Critical => alert.severity.as_str().red().bold(),
                    Severity::Warning => alert.severity.as_str().yellow(),
                    Severity::Info => alert.severity.as_str().dimmed(),
                };
                println!(
                    "#{:<5} {:<8} {} {}",
                    alert.id,
                    severity,
                    alert.message,
                    alert.source.dimmed()
                );
            }
            Ok(())
        }
        AlertsCommand::Resolve { id } => {
            ctx.roles.require_role(&ctx.actor, Role::Admin)?;
            let alert = resolve_alert(&ctx.db, *id)?;
            tracing::info!(alert_id = id, "alert resolved");
            if ctx.robot {
                return emit_robot(&alert, Vec::new());
            }
            println!("{} resolved alert #{}", "✓".green().bold(), alert.id);
            Ok(())
        }
        AlertsCommand::Conflicts { limit } => {
            let entries = ctx.version_store().runtime_conflicts(&ctx.actor, *limit)?;
            if ctx.robot {
                return emit_robot(&entries, Vec::new());
            }
            for entry in &entries {
                println!(
                    "#{:<5} {} {} v{}",
                    entry.id,
                    entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.skill_id.cyan(),
                    or_dash(entry.version)
                );
            }
            Ok(())
        }
    }
}
