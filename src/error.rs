//! Error handling module for profile-migrate
//!
//! Provides the error taxonomy shared by every stage. Errors split into two
//! families: record-local errors (a single document could not be read, parsed
//! or written) which a stage logs and skips, and fatal errors (preconditions,
//! git failures, bad configuration) which abort the run before or during a
//! stage.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for profile-migrate
#[derive(Error, Debug)]
pub enum MigrationError {
    /// A precondition failed before any mutation (e.g. dirty working tree)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The directory a stage operates on does not exist
    #[error("Directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    /// A record could not be parsed as JSON
    #[error("Invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A record parsed, but its top level is not a mapping
    #[error("Record {} is not a JSON object", .0.display())]
    NotAMapping(PathBuf),

    /// File-system errors tied to a specific path
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A version-control command exited unsuccessfully
    #[error("Command failed: {command}\nError: {stderr}")]
    VcsCommand { command: String, stderr: String },

    /// Configuration errors (loading, validation)
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for migration operations
pub type Result<T> = std::result::Result<T, MigrationError>;

impl MigrationError {
    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Attach a path to an IO error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach a path to a JSON parse error
    pub fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    /// Returns true for errors confined to a single record.
    ///
    /// Stages skip the record and continue the batch on these.
    pub fn is_record_local(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::NotAMapping(_) | Self::Io { .. }
        )
    }

    /// Returns true for errors raised before a stage mutated anything
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_) | Self::MissingDirectory(_))
    }

    /// Returns true when git refused to create a branch because it exists
    pub fn is_branch_exists(&self) -> bool {
        matches!(self, Self::VcsCommand { stderr, .. } if stderr.contains("already exists"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MigrationError::precondition("working tree is dirty");
        assert_eq!(err.to_string(), "Precondition failed: working tree is dirty");

        let err = MigrationError::MissingDirectory(PathBuf::from("profiles"));
        assert_eq!(err.to_string(), "Directory not found: profiles");
    }

    #[test]
    fn test_record_local_classification() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(MigrationError::io("a.json", io_err).is_record_local());

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(MigrationError::parse("a.json", json_err).is_record_local());

        assert!(MigrationError::NotAMapping(PathBuf::from("a.json")).is_record_local());
        assert!(!MigrationError::precondition("dirty").is_record_local());
        assert!(!MigrationError::config("bad").is_record_local());
    }

    #[test]
    fn test_precondition_classification() {
        assert!(MigrationError::precondition("dirty").is_precondition());
        assert!(MigrationError::MissingDirectory(PathBuf::from("data")).is_precondition());
        assert!(!MigrationError::NotAMapping(PathBuf::from("x")).is_precondition());
    }

    #[test]
    fn test_branch_exists_detection() {
        let err = MigrationError::VcsCommand {
            command: "git checkout -b v1".into(),
            stderr: "fatal: a branch named 'v1' already exists".into(),
        };
        assert!(err.is_branch_exists());

        let err = MigrationError::VcsCommand {
            command: "git checkout -b v1".into(),
            stderr: "fatal: not a git repository".into(),
        };
        assert!(!err.is_branch_exists());
    }
}
