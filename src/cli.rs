//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Incrementally harvest paginated results listings into `SQLite`.
///
/// Collections already stored are skipped; forced keys are purged and
/// fetched again.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to ./harvester.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// `SQLite` database file (overrides `database` in config)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Args {
    /// Returns the selected command; a bare invocation runs a sync.
    #[must_use]
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Sync(SyncArgs::default()))
    }
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch every desired collection not stored yet (default)
    Sync(SyncArgs),
    /// Print stored collections and record counts
    Report(ReportArgs),
}

/// Flags for `harvester sync`.
#[derive(ClapArgs, Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncArgs {
    /// Listing endpoint (overrides `base_url` in config)
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Purge and re-fetch this collection key (repeatable)
    #[arg(short = 'f', long = "force", value_name = "KEY")]
    pub force: Vec<i64>,

    /// Collections processed at once (1-16)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub concurrency: Option<u8>,

    /// Maximum pages walked per collection
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_pages: Option<u32>,
}

/// Flags for `harvester report`.
#[derive(ClapArgs, Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportArgs {
    /// Break each collection's records down by this field (e.g. `Sex`)
    #[arg(long, value_name = "FIELD")]
    pub by: Option<String>,
}
