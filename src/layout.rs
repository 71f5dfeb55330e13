//! Layout detection for the `status` command.
//!
//! Inspects the store without modifying it and works out which generation it
//! is in and which stage, if any, should run next.

use tracing::debug;

use crate::error::Result;
use crate::record::GroupId;
use crate::stage::{Generation, StageContext, StageId};
use crate::stages::rename_fps;

/// Snapshot of what the store currently looks like
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutStatus {
    pub legacy_present: bool,
    pub profiles_present: bool,
    /// `*.json` files under the legacy directory
    pub legacy_records: usize,
    /// Top-level `*.json` files under the profiles directory
    pub flat_records: usize,
    /// Group directories under the profiles directory
    pub group_dirs: usize,
    /// Flat records still holding the old fps behavior value
    pub pending_fps: usize,
    /// Flat records that failed to parse
    pub unreadable: Vec<GroupId>,
}

impl LayoutStatus {
    /// Generation the store is in, or `None` when it is empty or mixed.
    pub fn generation(&self) -> Option<Generation> {
        if self.legacy_present {
            return Some(Generation::Legacy);
        }
        match (self.flat_records > 0, self.group_dirs > 0) {
            (true, false) => Some(Generation::Flat),
            (false, true) => Some(Generation::Versioned),
            _ => None,
        }
    }

    /// Flat files and group directories side by side: a partial restructure
    pub fn is_mixed(&self) -> bool {
        !self.legacy_present && self.flat_records > 0 && self.group_dirs > 0
    }

    /// Next stage that has work to do
    pub fn next_stage(&self) -> Option<StageId> {
        if self.legacy_present {
            Some(StageId::Relocate)
        } else if self.pending_fps > 0 {
            Some(StageId::RenameFps)
        } else if self.flat_records > 0 {
            Some(StageId::Restructure)
        } else {
            None
        }
    }
}

/// Inspect the store under `ctx.root`.
pub fn inspect(ctx: &StageContext<'_>) -> Result<LayoutStatus> {
    let mut status = LayoutStatus::default();

    let legacy = ctx.legacy_dir();
    if ctx.store.is_dir(&legacy) {
        status.legacy_present = true;
        status.legacy_records = ctx
            .store
            .list(&legacy)?
            .iter()
            .filter(|e| e.is_record_file())
            .count();
    }

    let profiles = ctx.profiles_dir();
    if !ctx.store.is_dir(&profiles) {
        return Ok(status);
    }
    status.profiles_present = true;

    for entry in ctx.store.list(&profiles)? {
        if entry.is_dir() {
            status.group_dirs += 1;
            continue;
        }
        if !entry.is_record_file() {
            continue;
        }
        status.flat_records += 1;
        match ctx.store.read_record(&entry.path) {
            Ok(record) => {
                if rename_fps::needs_migration(&record, ctx.config) {
                    status.pending_fps += 1;
                }
            }
            Err(e) => {
                debug!(file = %entry.name, error = %e, "Unreadable record");
                if let Some(group) = GroupId::from_file_name(&entry.name) {
                    status.unreadable.push(group);
                }
            }
        }
    }

    Ok(status)
}
