//! Generation 2, in place: rename the `fps_behavior` sentinel.
//!
//! Each configured section (`docked`, `handheld`) is checked on its own. A
//! file is rewritten only when at least one value matched exactly, so a second
//! run finds nothing to do and leaves every byte as it was.

use tracing::{debug, info, warn};

use crate::config::MigrationConfig;
use crate::error::Result;
use crate::record::Record;
use crate::stage::{Stage, StageContext, StageId, StageReport};
use crate::store::StoreEntry;

/// FPS behavior rename stage (v2)
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameFps;

/// True when any configured section still holds the old value
pub fn needs_migration(record: &Record, config: &MigrationConfig) -> bool {
    config.fps_sections.iter().any(|section| {
        record.nested_str(section, &config.fps_field) == Some(config.fps_old_value.as_str())
    })
}

/// Rewrite every matching section; returns true when the record changed.
pub fn migrate_record(record: &mut Record, config: &MigrationConfig) -> bool {
    let mut changed = false;
    for section in &config.fps_sections {
        changed |= record.replace_nested_str(
            section,
            &config.fps_field,
            &config.fps_old_value,
            &config.fps_new_value,
        );
    }
    changed
}

impl Stage for RenameFps {
    fn id(&self) -> StageId {
        StageId::RenameFps
    }

    fn check_preconditions(&self, ctx: &StageContext<'_>) -> Result<()> {
        ctx.require_dir(&ctx.profiles_dir())
    }

    fn apply(&self, ctx: &StageContext<'_>) -> Result<StageReport> {
        let dir = ctx.profiles_dir();
        let mut report = StageReport::new(self.id());

        let entries: Vec<StoreEntry> = ctx
            .store
            .list(&dir)?
            .into_iter()
            .filter(StoreEntry::is_record_file)
            .collect();

        for entry in &entries {
            report.scanned += 1;

            let mut record = match ctx.store.read_record(&entry.path) {
                Ok(record) => record,
                Err(e) => {
                    warn!(file = %entry.name, error = %e, "Skipping invalid JSON file");
                    report.skip(&entry.path, &e);
                    continue;
                }
            };

            if !migrate_record(&mut record, ctx.config) {
                debug!(file = %entry.name, "No fps behavior to migrate");
                continue;
            }

            info!(file = %entry.name, "Migrating");
            match ctx.store.write_record(&entry.path, &record) {
                Ok(()) => report.migrated += 1,
                Err(e) => {
                    warn!(file = %entry.name, error = %e, "Failed to write migrated profile");
                    report.skip(&entry.path, &e);
                }
            }
        }

        info!(
            scanned = report.scanned,
            updated = report.migrated,
            "FPS behavior migration finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn record(text: &str) -> Record {
        Record::parse(text, Path::new("t.json")).unwrap()
    }

    #[test]
    fn test_migrates_both_sections() {
        let config = MigrationConfig::default();
        let mut r = record(
            r#"{"docked": {"fps_behavior": "Unlocked"}, "handheld": {"fps_behavior": "Unlocked"}}"#,
        );
        assert!(needs_migration(&r, &config));
        assert!(migrate_record(&mut r, &config));
        assert_eq!(r.nested_str("docked", "fps_behavior"), Some("Unstable"));
        assert_eq!(r.nested_str("handheld", "fps_behavior"), Some("Unstable"));
        assert!(!needs_migration(&r, &config));
    }

    #[test]
    fn test_only_matching_section_changes() {
        let config = MigrationConfig::default();
        let mut r = record(
            r#"{"docked": {"fps_behavior": "Locked"}, "handheld": {"fps_behavior": "Unlocked"}}"#,
        );
        assert!(migrate_record(&mut r, &config));
        assert_eq!(r.nested_str("docked", "fps_behavior"), Some("Locked"));
        assert_eq!(r.nested_str("handheld", "fps_behavior"), Some("Unstable"));
    }

    #[test]
    fn test_untouched_shapes() {
        let config = MigrationConfig::default();
        for text in [
            r#"{}"#,
            r#"{"docked": "Unlocked"}"#,
            r#"{"docked": {"fps_behavior": "UNLOCKED"}}"#,
            r#"{"docked": {"fps_behavior": "Unlocked (60)"}}"#,
            r#"{"fps_behavior": "Unlocked"}"#,
        ] {
            let mut r = record(text);
            let before = r.clone();
            assert!(!migrate_record(&mut r, &config), "{text}");
            assert_eq!(r, before);
        }
    }
}
