//! Version-control gate used by the relocation stage.
//!
//! The stage only needs a handful of operations: a clean-tree check before it
//! mutates anything, and branch/stage/commit afterwards. `GitCli` runs real
//! git commands against an explicit repository root; `MemoryVcs` records
//! calls in memory for tests.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::error::{MigrationError, Result};
use crate::process_guard::{ChildRegistry, CommandProcessGroup};

/// How `ensure_branch` ended up on the requested branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchSwitch {
    Created,
    /// The branch already existed and was checked out instead
    Existing,
}

/// Narrow interface over the version-control system
pub trait VersionControl {
    /// True when the working tree has no uncommitted changes
    fn is_clean(&self) -> Result<bool>;

    /// Create `branch` from HEAD and switch to it
    fn create_branch(&self, branch: &str) -> Result<()>;

    /// Switch to an existing branch
    fn checkout(&self, branch: &str) -> Result<()>;

    /// Stage an added path
    fn stage_path(&self, path: &Path) -> Result<()>;

    /// Drop a (recursively) removed path from the index
    fn unstage_removed(&self, path: &Path) -> Result<()>;

    /// Stage every modified or deleted tracked path
    fn stage_tracked(&self) -> Result<()>;

    fn commit(&self, message: &str) -> Result<()>;

    /// Create and switch to `branch`, falling back to a plain checkout when
    /// the branch already exists. Any other failure is returned.
    fn ensure_branch(&self, branch: &str) -> Result<BranchSwitch> {
        match self.create_branch(branch) {
            Ok(()) => Ok(BranchSwitch::Created),
            Err(e) if e.is_branch_exists() => {
                info!(branch, "Branch already exists, checking it out");
                self.checkout(branch)?;
                Ok(BranchSwitch::Existing)
            }
            Err(e) => Err(e),
        }
    }
}

/// `VersionControl` over the `git` binary, always run as `git -C <root>`
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Run one git command and return its trimmed stdout
    fn git(&self, args: &[&str]) -> Result<String> {
        let command = format!("git -C {} {}", self.root.display(), args.join(" "));
        debug!(%command, "Running git");

        let child = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .in_new_process_group()
            .spawn()
            .map_err(|e| MigrationError::VcsCommand {
                command: command.clone(),
                stderr: e.to_string(),
            })?;
        let pid = child.id();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid);
        }
        let output = child.wait_with_output();
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(pid);
        }

        let output = output.map_err(|e| MigrationError::VcsCommand {
            command: command.clone(),
            stderr: e.to_string(),
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(MigrationError::VcsCommand {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl VersionControl for GitCli {
    fn is_clean(&self) -> Result<bool> {
        Ok(self.git(&["status", "--porcelain"])?.is_empty())
    }

    fn create_branch(&self, branch: &str) -> Result<()> {
        self.git(&["checkout", "-b", branch]).map(drop)
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.git(&["checkout", branch]).map(drop)
    }

    fn stage_path(&self, path: &Path) -> Result<()> {
        self.git(&["add", "--", &path_arg(path)]).map(drop)
    }

    fn unstage_removed(&self, path: &Path) -> Result<()> {
        self.git(&["rm", "-r", "--cached", "--quiet", "--", &path_arg(path)])
            .map(drop)
    }

    fn stage_tracked(&self) -> Result<()> {
        self.git(&["add", "-u"]).map(drop)
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.git(&["commit", "-m", message]).map(drop)
    }
}

/// Wrapper for `--dry-run`: the clean check is real, everything else is logged
#[derive(Debug, Clone)]
pub struct DryRunVcs<V> {
    inner: V,
}

impl<V: VersionControl> DryRunVcs<V> {
    pub fn new(inner: V) -> Self {
        Self { inner }
    }
}

impl<V: VersionControl> VersionControl for DryRunVcs<V> {
    fn is_clean(&self) -> Result<bool> {
        self.inner.is_clean()
    }

    fn create_branch(&self, branch: &str) -> Result<()> {
        info!(branch, "[DRY RUN] would create and switch to branch");
        Ok(())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        info!(branch, "[DRY RUN] would check out branch");
        Ok(())
    }

    fn stage_path(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "[DRY RUN] would stage path");
        Ok(())
    }

    fn unstage_removed(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "[DRY RUN] would remove path from index");
        Ok(())
    }

    fn stage_tracked(&self) -> Result<()> {
        info!("[DRY RUN] would stage tracked modifications");
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<()> {
        info!(commit_message = message, "[DRY RUN] would commit");
        Ok(())
    }
}

/// One call recorded by `MemoryVcs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    CreateBranch(String),
    Checkout(String),
    StagePath(PathBuf),
    UnstageRemoved(PathBuf),
    StageTracked,
    Commit(String),
}

/// In-memory `VersionControl` that records every call
#[derive(Debug, Default)]
pub struct MemoryVcs {
    dirty: bool,
    fail_commit: bool,
    branches: RefCell<Vec<String>>,
    current: RefCell<Option<String>>,
    calls: RefCell<Vec<VcsCall>>,
}

impl MemoryVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report uncommitted changes from `is_clean`
    pub fn with_dirty_tree(mut self) -> Self {
        self.dirty = true;
        self
    }

    /// Pretend `branch` already exists
    pub fn with_branch(self, branch: &str) -> Self {
        self.branches.borrow_mut().push(branch.to_string());
        self
    }

    /// Make `commit` fail like a git error would
    pub fn with_failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn calls(&self) -> Vec<VcsCall> {
        self.calls.borrow().clone()
    }

    pub fn current_branch(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    fn record(&self, call: VcsCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl VersionControl for MemoryVcs {
    fn is_clean(&self) -> Result<bool> {
        Ok(!self.dirty)
    }

    fn create_branch(&self, branch: &str) -> Result<()> {
        self.record(VcsCall::CreateBranch(branch.to_string()));
        if self.branches.borrow().iter().any(|b| b == branch) {
            return Err(MigrationError::VcsCommand {
                command: format!("git checkout -b {}", branch),
                stderr: format!("fatal: a branch named '{}' already exists", branch),
            });
        }
        self.branches.borrow_mut().push(branch.to_string());
        *self.current.borrow_mut() = Some(branch.to_string());
        Ok(())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.record(VcsCall::Checkout(branch.to_string()));
        if !self.branches.borrow().iter().any(|b| b == branch) {
            return Err(MigrationError::VcsCommand {
                command: format!("git checkout {}", branch),
                stderr: format!("error: pathspec '{}' did not match any file(s) known to git", branch),
            });
        }
        *self.current.borrow_mut() = Some(branch.to_string());
        Ok(())
    }

    fn stage_path(&self, path: &Path) -> Result<()> {
        self.record(VcsCall::StagePath(path.to_path_buf()));
        Ok(())
    }

    fn unstage_removed(&self, path: &Path) -> Result<()> {
        self.record(VcsCall::UnstageRemoved(path.to_path_buf()));
        Ok(())
    }

    fn stage_tracked(&self) -> Result<()> {
        self.record(VcsCall::StageTracked);
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.record(VcsCall::Commit(message.to_string()));
        if self.fail_commit {
            return Err(MigrationError::VcsCommand {
                command: format!("git commit -m {}", message),
                stderr: "fatal: unable to create index.lock".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_branch_creates_new_branch() {
        let vcs = MemoryVcs::new();
        assert_eq!(vcs.ensure_branch("v1").unwrap(), BranchSwitch::Created);
        assert_eq!(vcs.current_branch().as_deref(), Some("v1"));
        assert_eq!(vcs.calls(), vec![VcsCall::CreateBranch("v1".into())]);
    }

    #[test]
    fn test_ensure_branch_falls_back_to_checkout() {
        let vcs = MemoryVcs::new().with_branch("v1");
        assert_eq!(vcs.ensure_branch("v1").unwrap(), BranchSwitch::Existing);
        assert_eq!(
            vcs.calls(),
            vec![
                VcsCall::CreateBranch("v1".into()),
                VcsCall::Checkout("v1".into())
            ]
        );
    }

    #[test]
    fn test_ensure_branch_propagates_other_errors() {
        struct Broken;
        impl VersionControl for Broken {
            fn is_clean(&self) -> Result<bool> {
                Ok(true)
            }
            fn create_branch(&self, _: &str) -> Result<()> {
                Err(MigrationError::VcsCommand {
                    command: "git checkout -b v1".into(),
                    stderr: "fatal: not a git repository".into(),
                })
            }
            fn checkout(&self, _: &str) -> Result<()> {
                panic!("checkout must not be attempted")
            }
            fn stage_path(&self, _: &Path) -> Result<()> {
                Ok(())
            }
            fn unstage_removed(&self, _: &Path) -> Result<()> {
                Ok(())
            }
            fn stage_tracked(&self) -> Result<()> {
                Ok(())
            }
            fn commit(&self, _: &str) -> Result<()> {
                Ok(())
            }
        }

        assert!(Broken.ensure_branch("v1").is_err());
    }

    #[test]
    fn test_dry_run_vcs_keeps_clean_check() {
        let vcs = DryRunVcs::new(MemoryVcs::new().with_dirty_tree());
        assert!(!vcs.is_clean().unwrap());
        vcs.commit("msg").unwrap();
        assert!(vcs.inner.calls().is_empty());
    }

    #[test]
    fn test_git_cli_against_temp_repo() {
        let dir = tempfile::tempdir().unwrap();
        let init = Command::new("git")
            .args(["init", "--quiet"])
            .current_dir(dir.path())
            .status();
        // Skip when git is unavailable in the test environment
        if !matches!(init, Ok(status) if status.success()) {
            return;
        }

        let git = GitCli::new(dir.path());
        assert!(git.is_clean().unwrap());

        std::fs::write(dir.path().join("untracked.json"), "{}").unwrap();
        assert!(!git.is_clean().unwrap());

        let err = git.checkout("no-such-branch").unwrap_err();
        assert!(matches!(err, MigrationError::VcsCommand { .. }));
        assert!(err.to_string().contains("git -C"));
    }
}
