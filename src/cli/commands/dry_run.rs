//! pf dry-run - Pre-activation check over all thirteen stages

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::{emit_json, or_dash, robot_partial};
use crate::error::{PfError, Result};
use crate::lifecycle::dry_run::CandidateSource;

#[derive(Args, Debug)]
pub struct DryRunArgs {
    /// Exit non-zero when any stage fails
    #[arg(long)]
    pub strict: bool,
}

pub fn run(ctx: &AppContext, args: &DryRunArgs) -> Result<()> {
    let report = ctx.version_store().dry_run(&ctx.actor)?;

    if ctx.robot {
        emit_json(&robot_partial(&report, report.passed_stages, report.failed_stages))?;
    } else {
        for row in &report.results {
            let mark = if row.ok { "✓".green().bold() } else { "✗".red().bold() };
            println!(
                "{mark} {:<20} {:<28} v{:<4} {}",
                row.stage.as_str(),
                or_dash(row.skill_id.as_deref()),
                or_dash(row.version),
                source_label(row.source).dimmed()
            );
            for issue in &row.issues {
                println!("    {} {}", issue.code.yellow(), issue.message);
            }
        }
        println!();
        println!(
            "{}/{} stages pass",
            report.passed_stages, report.total_stages
        );
    }

    if args.strict && !report.success {
        return Err(PfError::Validation {
            context: "workflow dry run".to_string(),
            issues: report
                .results
                .iter()
                .flat_map(|row| row.issues.iter().cloned())
                .collect(),
        });
    }
    Ok(())
}

const fn source_label(source: CandidateSource) -> &'static str {
    match source {
        CandidateSource::MissingSkill => "missing skill",
        CandidateSource::MissingVersion => "missing version",
        CandidateSource::LatestDraft => "latest draft",
        CandidateSource::LatestPublished => "latest published",
        CandidateSource::Active => "active",
    }
}
