//! `pf` binary: parse flags, install logging, dispatch, report.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use paperflow::app::AppContext;
use paperflow::cli::commands::{self, init};
use paperflow::cli::output::report_error;
use paperflow::cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if !cli.quiet {
        install_subscriber(&cli);
    }

    // `init` creates the root, so it cannot go through an AppContext.
    let outcome = match &cli.command {
        Commands::Init(args) => init::run_without_context(&cli, args),
        command => AppContext::from_cli(&cli).and_then(|ctx| commands::run(&ctx, command)),
    };

    outcome.map_or_else(
        |err| {
            tracing::debug!(code = err.code(), "command failed");
            report_error(&err, cli.robot);
            ExitCode::FAILURE
        },
        |()| ExitCode::SUCCESS,
    )
}

/// Logs go to stderr so stdout stays parseable; robot mode logs as JSON lines.
fn install_subscriber(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_directives()));
    let json = cli.robot.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text = (!cli.robot).then(|| fmt::layer().with_writer(std::io::stderr));
    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
}
