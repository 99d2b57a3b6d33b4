//! Command-line surface for `pf`.

use std::path::PathBuf;

use clap::Parser;

pub mod commands;
pub mod output;

pub use commands::Commands;

#[derive(Parser, Debug)]
#[command(name = "pf", version, about = "Stage skills and paper workflow sessions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Emit JSON envelopes on stdout (logs go to stderr)
    #[arg(long, global = true)]
    pub robot: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Explicit config file
    #[arg(long, global = true, env = "PF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Acting user id for permission and ownership checks
    #[arg(long, global = true, env = "PF_ACTOR", default_value = "local")]
    pub actor: String,
}

impl Cli {
    /// Log directives for the `-v` count, used when `RUST_LOG` is unset.
    #[must_use]
    pub const fn log_directives(&self) -> &'static str {
        match self.verbose {
            0 => "warn,paperflow=info",
            1 => "info,paperflow=debug",
            2 => "debug,paperflow=trace",
            _ => "trace",
        }
    }
}
