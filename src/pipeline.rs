//! Pipeline runner: wires the store, git gate and configuration together and
//! runs one stage at a time.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::MigrationConfig;
use crate::error::Result;
use crate::layout::{self, LayoutStatus};
use crate::stage::{Stage, StageContext, StageId, StageReport};
use crate::stages::{Relocate, RenameFps, Restructure};
use crate::store::{DryRunStore, FsStore, RecordStore};
use crate::vcs::{DryRunVcs, GitCli, VersionControl};

/// Look up the implementation of a stage
pub fn stage_for(id: StageId) -> Box<dyn Stage> {
    match id {
        StageId::Relocate => Box::new(Relocate),
        StageId::RenameFps => Box::new(RenameFps),
        StageId::Restructure => Box::new(Restructure),
    }
}

/// Owns the backends a stage runs against
pub struct Pipeline {
    root: PathBuf,
    config: MigrationConfig,
    store: Box<dyn RecordStore>,
    vcs: Box<dyn VersionControl>,
    dry_run: bool,
}

impl Pipeline {
    /// Pipeline over the local file system and git at `root`.
    ///
    /// With `dry_run`, mutations are logged instead of performed; the git
    /// clean check still runs for real.
    pub fn new(root: impl Into<PathBuf>, config: MigrationConfig, dry_run: bool) -> Self {
        let root = root.into();
        let git = GitCli::new(&root);
        let (store, vcs): (Box<dyn RecordStore>, Box<dyn VersionControl>) = if dry_run {
            (Box::new(DryRunStore::new(FsStore)), Box::new(DryRunVcs::new(git)))
        } else {
            (Box::new(FsStore), Box::new(git))
        };
        Self {
            root,
            config,
            store,
            vcs,
            dry_run,
        }
    }

    /// Pipeline over caller-supplied backends
    pub fn with_backends(
        root: impl Into<PathBuf>,
        config: MigrationConfig,
        store: Box<dyn RecordStore>,
        vcs: Box<dyn VersionControl>,
    ) -> Self {
        Self {
            root: root.into(),
            config,
            store,
            vcs,
            dry_run: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn context(&self) -> StageContext<'_> {
        StageContext {
            root: &self.root,
            config: &self.config,
            store: self.store.as_ref(),
            vcs: self.vcs.as_ref(),
        }
    }

    /// Run a single stage: preconditions, then the migration itself.
    pub fn run(&self, id: StageId) -> Result<StageReport> {
        let ctx = self.context();
        info!(
            stage = %id,
            root = %self.root.display(),
            dry_run = self.dry_run,
            "Starting migration: {}",
            id.description()
        );

        // Stages do not chain; point out an obvious ordering mistake
        if id != StageId::Relocate && ctx.store.is_dir(&ctx.legacy_dir()) {
            warn!(
                stage = %id,
                "Legacy directory still present; '{}' has probably not run yet",
                StageId::Relocate
            );
        }

        let mut report = stage_for(id).run(&ctx)?;
        report.dry_run = self.dry_run;

        for skipped in &report.skipped {
            warn!(path = %skipped.path.display(), reason = %skipped.reason, "Skipped record");
        }
        info!(summary = %report, "Stage finished");
        Ok(report)
    }

    /// Inspect the store layout without changing anything
    pub fn status(&self) -> Result<LayoutStatus> {
        layout::inspect(&self.context())
    }
}
