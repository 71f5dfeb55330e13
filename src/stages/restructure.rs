//! Generation 2 → 3: split `profiles/<group>.json` into
//! `profiles/<group>/<initial_version>.json`.
//!
//! Top-level directories are treated as already migrated, which makes the
//! stage resumable: a re-run only picks up the flat files that remain. A
//! group directory holding no version file at all is reported as incomplete
//! instead of being trusted silently.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::record::{GroupId, VersionTag};
use crate::stage::{Stage, StageContext, StageId, StageReport};
use crate::store::StoreEntry;

/// Flat-to-versioned restructuring stage (v3)
#[derive(Debug, Clone, Copy, Default)]
pub struct Restructure;

impl Stage for Restructure {
    fn id(&self) -> StageId {
        StageId::Restructure
    }

    fn check_preconditions(&self, ctx: &StageContext<'_>) -> Result<()> {
        ctx.require_dir(&ctx.profiles_dir())
    }

    fn apply(&self, ctx: &StageContext<'_>) -> Result<StageReport> {
        let dir = ctx.profiles_dir();
        let mut report = StageReport::new(self.id());
        info!(path = %dir.display(), "Scanning directory");

        for entry in ctx.store.list(&dir)? {
            if entry.is_dir() {
                if !has_version_file(ctx, &entry) {
                    let group = GroupId::from_dir_name(&entry.name);
                    warn!(%group, "Group directory has no version file; a previous run may have been interrupted");
                    report.incomplete_groups.push(group);
                }
                continue;
            }

            if !entry.is_record_file() {
                continue;
            }
            let Some(group) = GroupId::from_file_name(&entry.name) else {
                continue;
            };

            report.scanned += 1;
            info!(%group, "Processing old file for group");
            match restructure_group(ctx, &dir, &group, &entry.path) {
                Ok(new_path) => {
                    debug!(%group, path = %new_path.display(), "Group restructured");
                    report.migrated += 1;
                }
                Err(e) => {
                    warn!(file = %entry.path.display(), error = %e, "Error processing file");
                    report.skip(&entry.path, &e);
                }
            }
        }

        if report.migrated == 0 {
            info!("No files found to migrate. The directory structure may already be up to date");
        } else {
            info!(processed = report.migrated, "Restructuring finished");
        }
        Ok(report)
    }
}

/// Move one flat record into its group directory.
///
/// The flat file is removed only after the versioned copy has been written.
fn restructure_group(
    ctx: &StageContext<'_>,
    dir: &Path,
    group: &GroupId,
    flat_path: &Path,
) -> Result<PathBuf> {
    let mut record = ctx.store.read_record(flat_path)?;

    let group_dir = dir.join(group.as_str());
    ctx.store.ensure_dir(&group_dir)?;

    if record.remove(&ctx.config.legacy_field).is_some() {
        debug!(%group, field = %ctx.config.legacy_field, "Removed legacy field");
    }

    let new_path = ctx.config.initial_version.path_in(&group_dir);
    ctx.store.write_record(&new_path, &record)?;
    info!(path = %new_path.display(), "Created new file");

    ctx.store.remove_file(flat_path)?;
    info!(path = %flat_path.display(), "Deleted old file");

    Ok(new_path)
}

/// True when a group directory holds at least one `<version>.json` file
fn has_version_file(ctx: &StageContext<'_>, group_dir: &StoreEntry) -> bool {
    match ctx.store.list(&group_dir.path) {
        Ok(children) => children.iter().any(|child| {
            child.is_record_file()
                && GroupId::from_file_name(&child.name)
                    .is_some_and(|stem| stem.as_str().parse::<VersionTag>().is_ok())
        }),
        Err(e) => {
            warn!(path = %group_dir.path.display(), error = %e, "Cannot list group directory");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigrationConfig;
    use crate::error::MigrationError;
    use crate::stage::Outcome;
    use crate::store::FsStore;
    use crate::vcs::MemoryVcs;
    use std::fs;

    fn ctx<'a>(root: &'a Path, config: &'a MigrationConfig, vcs: &'a MemoryVcs) -> StageContext<'a> {
        StageContext {
            root,
            config,
            store: &FsStore,
            vcs,
        }
    }

    #[test]
    fn test_moves_flat_file_and_drops_legacy_field() {
        let dir = tempfile::tempdir().unwrap();
        let profiles = dir.path().join("profiles");
        fs::create_dir(&profiles).unwrap();
        fs::write(
            profiles.join("abc.json"),
            r#"{"game_version": "1.2.0", "docked": {"fps_behavior": "Unstable"}}"#,
        )
        .unwrap();

        let config = MigrationConfig::default();
        let vcs = MemoryVcs::new();
        let report = Restructure.run(&ctx(dir.path(), &config, &vcs)).unwrap();

        assert_eq!(report.migrated, 1);
        assert!(!profiles.join("abc.json").exists());
        assert_eq!(
            fs::read_to_string(profiles.join("abc/1.0.0.json")).unwrap(),
            "{\n  \"docked\": {\n    \"fps_behavior\": \"Unstable\"\n  }\n}"
        );
        assert!(vcs.calls().is_empty());
    }

    #[test]
    fn test_broken_file_left_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let profiles = dir.path().join("profiles");
        fs::create_dir(&profiles).unwrap();
        fs::write(profiles.join("broken.json"), "{ not json").unwrap();

        let config = MigrationConfig::default();
        let vcs = MemoryVcs::new();
        let report = Restructure.run(&ctx(dir.path(), &config, &vcs)).unwrap();

        assert_eq!(report.outcome(), Outcome::UpToDate);
        assert_eq!(report.skipped.len(), 1);
        assert!(profiles.join("broken.json").exists());
        assert!(!profiles.join("broken").exists());
    }

    #[test]
    fn test_empty_group_dir_reported_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let profiles = dir.path().join("profiles");
        fs::create_dir_all(profiles.join("crashed")).unwrap();
        fs::create_dir_all(profiles.join("done")).unwrap();
        fs::write(profiles.join("done/1.0.0.json"), "{}").unwrap();

        let config = MigrationConfig::default();
        let vcs = MemoryVcs::new();
        let report = Restructure.run(&ctx(dir.path(), &config, &vcs)).unwrap();

        assert_eq!(report.outcome(), Outcome::UpToDate);
        assert_eq!(report.incomplete_groups, vec![GroupId::from_dir_name("crashed")]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = MigrationConfig::default();
        let vcs = MemoryVcs::new();
        let err = Restructure.run(&ctx(dir.path(), &config, &vcs)).unwrap_err();
        assert!(matches!(err, MigrationError::MissingDirectory(_)));
    }
}
