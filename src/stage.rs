//! Stage abstraction shared by the migrations.
//!
//! A stage moves the record store from one layout generation to the next.
//! Every stage follows the same shape:
//!
//! ```text
//! check_preconditions   (fatal, nothing mutated yet)
//!     ↓
//! scan store            (listing captured once)
//!     ↓
//! transform / relocate  (per-record errors skipped and reported)
//!     ↓
//! StageReport           (counts + skipped records)
//! ```
//!
//! Stages run strictly in order (relocate, rename-fps, restructure) but are
//! invoked one at a time; nothing chains them automatically.

use std::fmt;
use std::path::{Path, PathBuf};
use strum::{Display, EnumIter, EnumString};

use crate::config::MigrationConfig;
use crate::error::{MigrationError, Result};
use crate::record::GroupId;
use crate::store::RecordStore;
use crate::vcs::{BranchSwitch, VersionControl};

/// Identity of each migration stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Display, EnumString, EnumIter)]
#[repr(u8)]
pub enum StageId {
    /// `data/<group>.json` -> `profiles/<group>.json`, committed to git
    #[strum(to_string = "relocate", serialize = "v1")]
    Relocate = 1,
    /// `fps_behavior: "Unlocked"` -> `"Unstable"`, in place
    #[strum(to_string = "rename-fps", serialize = "v2")]
    RenameFps = 2,
    /// `profiles/<group>.json` -> `profiles/<group>/1.0.0.json`
    #[strum(to_string = "restructure", serialize = "v3")]
    Restructure = 3,
}

impl StageId {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Relocate => Some(Self::RenameFps),
            Self::RenameFps => Some(Self::Restructure),
            Self::Restructure => None,
        }
    }

    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Relocate => None,
            Self::RenameFps => Some(Self::Relocate),
            Self::Restructure => Some(Self::RenameFps),
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Relocate => "Move profiles from the legacy data directory and commit",
            Self::RenameFps => "Rename the 'Unlocked' fps behavior to 'Unstable'",
            Self::Restructure => "Split flat profiles into versioned group directories",
        }
    }

    /// Layout the stage expects to find
    pub const fn source(self) -> Generation {
        match self {
            Self::Relocate => Generation::Legacy,
            Self::RenameFps | Self::Restructure => Generation::Flat,
        }
    }

    /// Layout the stage leaves behind
    pub const fn target(self) -> Generation {
        match self {
            Self::Relocate | Self::RenameFps => Generation::Flat,
            Self::Restructure => Generation::Versioned,
        }
    }

    pub const fn all() -> &'static [Self] {
        &[Self::Relocate, Self::RenameFps, Self::Restructure]
    }
}

/// On-disk layout generation of the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Generation {
    /// `<root>/data/<group>.json`
    Legacy = 1,
    /// `<root>/profiles/<group>.json`
    Flat = 2,
    /// `<root>/profiles/<group>/<version>.json`
    Versioned = 3,
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Legacy => "legacy (data/<group>.json)",
            Self::Flat => "flat (profiles/<group>.json)",
            Self::Versioned => "versioned (profiles/<group>/<version>.json)",
        };
        write!(f, "generation {}: {}", *self as u8, name)
    }
}

/// Everything a stage needs, injected at invocation time
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    /// Repository root; store directories are resolved against it
    pub root: &'a Path,
    pub config: &'a MigrationConfig,
    pub store: &'a dyn RecordStore,
    pub vcs: &'a dyn VersionControl,
}

impl<'a> StageContext<'a> {
    pub fn legacy_dir(&self) -> PathBuf {
        self.config.legacy_path(self.root)
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.config.profiles_path(self.root)
    }

    /// Fail with `MissingDirectory` unless `dir` is an existing directory
    pub fn require_dir(&self, dir: &Path) -> Result<()> {
        if self.store.is_dir(dir) {
            Ok(())
        } else {
            Err(MigrationError::MissingDirectory(dir.to_path_buf()))
        }
    }
}

/// A record a stage could not process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub path: PathBuf,
    pub reason: String,
}

impl SkippedRecord {
    pub fn new(path: impl Into<PathBuf>, error: &MigrationError) -> Self {
        Self {
            path: path.into(),
            reason: error.to_string(),
        }
    }
}

/// How a stage run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// At least one record was migrated
    Completed,
    /// Nothing needed migrating; the store was already in the target layout
    UpToDate,
}

/// Summary of one stage run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: StageId,
    /// Record files the stage looked at
    pub scanned: usize,
    /// Records written to their new form or location
    pub migrated: usize,
    pub skipped: Vec<SkippedRecord>,
    /// Group directories without any version file (restructure only)
    pub incomplete_groups: Vec<GroupId>,
    /// Branch handling of the commit (relocate only)
    pub branch: Option<BranchSwitch>,
    pub dry_run: bool,
}

impl StageReport {
    pub fn new(stage: StageId) -> Self {
        Self {
            stage,
            scanned: 0,
            migrated: 0,
            skipped: Vec::new(),
            incomplete_groups: Vec::new(),
            branch: None,
            dry_run: false,
        }
    }

    pub fn outcome(&self) -> Outcome {
        if self.migrated == 0 {
            Outcome::UpToDate
        } else {
            Outcome::Completed
        }
    }

    pub(crate) fn skip(&mut self, path: &Path, error: &MigrationError) {
        self.skipped.push(SkippedRecord::new(path, error));
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.dry_run { "[DRY RUN] " } else { "" };
        write!(
            f,
            "{}{}: scanned {}, migrated {}, skipped {}",
            prefix,
            self.stage,
            self.scanned,
            self.migrated,
            self.skipped.len()
        )?;
        if !self.incomplete_groups.is_empty() {
            write!(f, ", incomplete groups {}", self.incomplete_groups.len())?;
        }
        if self.outcome() == Outcome::UpToDate {
            write!(f, " (nothing to migrate)")?;
        }
        Ok(())
    }
}

/// One bespoke schema migration.
pub trait Stage {
    fn id(&self) -> StageId;

    /// Checks that must pass before anything is mutated.
    fn check_preconditions(&self, ctx: &StageContext<'_>) -> Result<()>;

    /// Perform the migration. Assumes preconditions hold.
    fn apply(&self, ctx: &StageContext<'_>) -> Result<StageReport>;

    /// Check preconditions, then apply.
    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport> {
        self.check_preconditions(ctx)?;
        self.apply(ctx)
    }
}
