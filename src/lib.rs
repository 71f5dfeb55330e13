//! profile-migrate library
//!
//! Schema migrations for performance profile records stored as JSON documents
//! in a git working copy. Each stage moves the store one layout generation
//! forward:
//!
//! 1. `data/<group>.json` → `profiles/<group>.json` (committed on a branch)
//! 2. `fps_behavior: "Unlocked"` → `"Unstable"` in place
//! 3. `profiles/<group>.json` → `profiles/<group>/1.0.0.json`

pub mod cli;
pub mod config;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod process_guard;
pub mod record;
pub mod stage;
pub mod stages;
pub mod store;
pub mod vcs;

// Re-export main types for convenience
pub use config::MigrationConfig;
pub use error::MigrationError;
pub use layout::LayoutStatus;
pub use pipeline::{Pipeline, stage_for};
pub use record::{GroupId, Record, VersionTag};
pub use stage::{Generation, Outcome, SkippedRecord, Stage, StageContext, StageId, StageReport};
pub use stages::{Relocate, RenameFps, Restructure};
pub use store::{DryRunStore, EntryKind, FsStore, RecordStore, StoreEntry};
pub use vcs::{BranchSwitch, DryRunVcs, GitCli, MemoryVcs, VcsCall, VersionControl};
