use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// profile-migrate - One-time schema migrations for performance profiles
#[derive(Parser)]
#[command(name = "profile-migrate")]
#[command(about = "Migrate on-disk performance profile records between schema generations")]
#[command(version)]
pub struct Cli {
    /// Repository root holding the record store.
    ///
    /// Store directories and every git command are resolved against this
    /// path, never against the current working directory.
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// JSON configuration file overriding paths, sentinels and git settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Dry-run mode: log what would change without touching files or git.
    ///
    /// The clean working tree check still runs against the real repository.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stage 1: move data/ to profiles/ and commit on a new branch
    Relocate,
    /// Stage 2: rename the 'Unlocked' fps behavior to 'Unstable'
    RenameFps,
    /// Stage 3: split flat profiles into versioned group directories
    Restructure,
    /// Run a stage by name (relocate, rename-fps, restructure) or version (v1, v2, v3)
    Run {
        /// Stage name or version
        stage: String,
    },
    /// Show the current store layout and the next stage to run
    Status,
    /// Print the effective configuration as JSON
    Config {
        /// Write the configuration to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
