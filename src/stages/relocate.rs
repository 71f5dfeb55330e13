//! Generation 1 → 2: move every profile from `data/` to `profiles/` and
//! commit the move on a dedicated branch.
//!
//! # Ordering
//!
//! ```text
//! precondition: data/ exists, working tree clean
//!     ↓
//! profiles/ recreated empty        (DESTRUCTIVE: existing content is discarded)
//!     ↓
//! data/*.json parsed and rewritten into profiles/
//!     ↓
//! data/ deleted
//!     ↓
//! git: branch, add profiles/, rm --cached data/, add -u, commit
//! ```
//!
//! Nothing touches git until the destination is complete and the source is
//! gone, so the commit captures the whole move as one change-set.

use std::path::Path;
use tracing::{info, warn};

use crate::error::{MigrationError, Result};
use crate::stage::{Stage, StageContext, StageId, StageReport};
use crate::store::StoreEntry;
use crate::vcs::BranchSwitch;

/// Relocation stage (v1)
#[derive(Debug, Clone, Copy, Default)]
pub struct Relocate;

impl Stage for Relocate {
    fn id(&self) -> StageId {
        StageId::Relocate
    }

    fn check_preconditions(&self, ctx: &StageContext<'_>) -> Result<()> {
        ctx.require_dir(&ctx.legacy_dir())?;
        if !ctx.vcs.is_clean()? {
            return Err(MigrationError::precondition(
                "Your repository has uncommitted changes. Please commit or stash them before running the migration.",
            ));
        }
        Ok(())
    }

    fn apply(&self, ctx: &StageContext<'_>) -> Result<StageReport> {
        let source = ctx.legacy_dir();
        let destination = ctx.profiles_dir();
        let mut report = StageReport::new(self.id());

        if ctx.store.exists(&destination) {
            warn!(
                path = %destination.display(),
                "Destination already exists, removing it to ensure a clean slate"
            );
            ctx.store.remove_dir_all(&destination)?;
        }
        info!(path = %destination.display(), "Creating destination directory");
        ctx.store.ensure_dir(&destination)?;

        let entries: Vec<StoreEntry> = ctx
            .store
            .list(&source)?
            .into_iter()
            .filter(StoreEntry::is_record_file)
            .collect();
        info!(
            count = entries.len(),
            source = %source.display(),
            "Found profiles to migrate"
        );

        for entry in &entries {
            report.scanned += 1;
            let record = match ctx.store.read_record(&entry.path) {
                Ok(record) => record,
                Err(e @ (MigrationError::Parse { .. } | MigrationError::NotAMapping(_))) => {
                    warn!(file = %entry.name, error = %e, "Skipping invalid JSON file");
                    report.skip(&entry.path, &e);
                    continue;
                }
                // Unreadable files abort while data/ is still intact
                Err(e) => return Err(e),
            };

            // A failed write also aborts before the source is deleted
            ctx.store.write_record(&destination.join(entry.file_name()), &record)?;
            report.migrated += 1;
        }

        info!(
            count = report.migrated,
            destination = %destination.display(),
            "Migrated profiles"
        );

        info!(path = %source.display(), "Removing old data directory");
        ctx.store.remove_dir_all(&source)?;

        report.branch = Some(commit_relocation(ctx)?);
        Ok(report)
    }
}

/// Stage the new directory, drop the old one from the index and commit both.
fn commit_relocation(ctx: &StageContext<'_>) -> Result<BranchSwitch> {
    let config = ctx.config;

    info!(branch = %config.branch, "Creating and switching to branch");
    let switch = ctx.vcs.ensure_branch(&config.branch)?;

    info!("Staging changes");
    ctx.vcs.stage_path(Path::new(&config.profiles_dir))?;
    ctx.vcs.unstage_removed(Path::new(&config.legacy_dir))?;
    ctx.vcs.stage_tracked()?;

    info!("Committing changes");
    ctx.vcs.commit(&config.commit_message)?;

    Ok(switch)
}
