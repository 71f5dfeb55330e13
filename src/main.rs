//! profile-migrate - Main entry point
//!
//! Parses the command line, loads configuration and runs one migration stage
//! (or a read-only command) against the store root.

use anyhow::{Context, anyhow};
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use profile_migrate::cli::{Cli, Commands};
use profile_migrate::{MigrationConfig, Outcome, Pipeline, StageId, StageReport, process_guard};

/// Initialize the logger with appropriate settings
fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    // RUST_LOG overrides the default
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main application entry point
fn main() {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    debug!("CLI arguments parsed");

    // Terminates a running git child if we are interrupted mid-commit
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!(error = %e, "Failed to initialize signal handlers");
    }

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        eprintln!("\n✗ Error: An error occurred during migration: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Relocate => run_stage(cli, config, StageId::Relocate),
        Commands::RenameFps => run_stage(cli, config, StageId::RenameFps),
        Commands::Restructure => run_stage(cli, config, StageId::Restructure),
        Commands::Run { stage } => {
            let id: StageId = stage.parse().map_err(|_| {
                anyhow!(
                    "Unknown stage '{}'. Valid: relocate (v1), rename-fps (v2), restructure (v3)",
                    stage
                )
            })?;
            run_stage(cli, config, id)
        }
        Commands::Status => show_status(cli, config),
        Commands::Config { output } => match output {
            Some(path) => {
                config.save_to_file(path)?;
                println!("✓ Configuration written to {}", path.display());
                Ok(())
            }
            None => {
                let json = serde_json::to_string_pretty(&config)
                    .context("Failed to serialize configuration")?;
                println!("{}", json);
                Ok(())
            }
        },
    }
}

/// Defaults, overlaid with the config file when one is given
fn load_config(path: Option<&Path>) -> anyhow::Result<MigrationConfig> {
    let config = match path {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            MigrationConfig::load_from_file(path)?
        }
        None => MigrationConfig::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run_stage(cli: &Cli, config: MigrationConfig, id: StageId) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(&cli.root, config, cli.dry_run);
    let report = pipeline.run(id)?;
    print_report(&report, pipeline.config());
    Ok(())
}

fn print_report(report: &StageReport, config: &MigrationConfig) {
    println!();
    for skipped in &report.skipped {
        println!("  - WARNING: Skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    for group in &report.incomplete_groups {
        println!(
            "  - WARNING: Group '{}' has a directory but no version file",
            group
        );
    }

    match report.stage {
        StageId::Relocate => {
            println!(
                "✓ Successfully migrated {} profiles to '{}'.",
                report.migrated, config.profiles_dir
            );
            if !report.dry_run {
                println!(
                    "Branch '{}' now holds all the changes.",
                    config.branch
                );
                println!(
                    "You can now push this branch to your remote repository: git push origin {}",
                    config.branch
                );
            }
        }
        StageId::RenameFps => {
            println!("Scanned {} total profiles.", report.scanned);
            println!(
                "✓ Migrated {} profiles to the '{}' fps behavior.",
                report.migrated, config.fps_new_value
            );
            if report.migrated > 0 {
                println!("Please review the changes.");
            } else {
                println!("No files required migration.");
            }
        }
        StageId::Restructure => match report.outcome() {
            Outcome::Completed => println!(
                "✓ Migration completed successfully! Processed {} files.",
                report.migrated
            ),
            Outcome::UpToDate => println!(
                "No files found to migrate. The directory structure may already be up to date."
            ),
        },
    }

    println!("{}", report);
}

fn show_status(cli: &Cli, config: MigrationConfig) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(&cli.root, config, true);
    let status = pipeline.status()?;
    let config = pipeline.config();

    println!("Store root: {}", pipeline.root().display());
    if status.legacy_present {
        println!(
            "  {}/: {} profiles",
            config.legacy_dir, status.legacy_records
        );
    }
    if status.profiles_present {
        println!(
            "  {}/: {} flat profiles, {} group directories",
            config.profiles_dir, status.flat_records, status.group_dirs
        );
        if status.pending_fps > 0 {
            println!(
                "  {} profiles still use fps behavior '{}'",
                status.pending_fps, config.fps_old_value
            );
        }
    }
    for group in &status.unreadable {
        println!("  - WARNING: {}.json is not a valid profile", group);
    }

    match status.generation() {
        Some(generation) => println!("Layout: {}", generation),
        None if status.is_mixed() => println!("Layout: mixed (restructuring partially applied)"),
        None => println!("Layout: no profiles found"),
    }

    match status.next_stage() {
        Some(stage) => println!("Next stage: {} ({})", stage, stage.description()),
        None => println!("✓ Nothing to migrate."),
    }
    Ok(())
}
