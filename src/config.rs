//! Migration configuration.
//!
//! Every path, sentinel and git parameter the stages need lives here and is
//! handed to each stage at invocation time. Values can be loaded from a JSON
//! file; keys missing from the file keep their defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::record::VersionTag;

/// Configuration shared by all stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    // Store layout
    /// Generation 1 store directory, relative to the root
    pub legacy_dir: String,
    /// Generation 2+ store directory, relative to the root
    pub profiles_dir: String,

    // Relocation commit
    pub branch: String,
    pub commit_message: String,

    // FPS behavior rename
    /// Top-level sections whose `fps_field` is inspected
    pub fps_sections: Vec<String>,
    pub fps_field: String,
    pub fps_old_value: String,
    pub fps_new_value: String,

    // Versioned restructuring
    /// Key dropped from every record when it moves into a group directory
    pub legacy_field: String,
    /// Version file name given to all pre-existing data
    pub initial_version: VersionTag,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            legacy_dir: "data".to_string(),
            profiles_dir: "profiles".to_string(),
            branch: "v1".to_string(),
            commit_message: "feat(data): Migrate from data/ to profiles/ for v1".to_string(),
            fps_sections: vec!["docked".to_string(), "handheld".to_string()],
            fps_field: "fps_behavior".to_string(),
            fps_old_value: "Unlocked".to_string(),
            fps_new_value: "Unstable".to_string(),
            legacy_field: "game_version".to_string(),
            initial_version: VersionTag::INITIAL,
        }
    }
}

impl MigrationConfig {
    /// Path of the generation 1 store under `root`
    pub fn legacy_path(&self, root: &Path) -> PathBuf {
        root.join(&self.legacy_dir)
    }

    /// Path of the generation 2/3 store under `root`
    pub fn profiles_path(&self, root: &Path) -> PathBuf {
        root.join(&self.profiles_dir)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_store_dir("legacy_dir", &self.legacy_dir)?;
        validate_store_dir("profiles_dir", &self.profiles_dir)?;
        if Path::new(&self.legacy_dir) == Path::new(&self.profiles_dir) {
            anyhow::bail!("legacy_dir and profiles_dir must differ");
        }

        let branch = self.branch.trim();
        if branch.is_empty() {
            anyhow::bail!("branch must be specified");
        }
        if branch.starts_with('-') || branch.chars().any(char::is_whitespace) {
            anyhow::bail!("branch '{}' is not a valid branch name", self.branch);
        }
        if self.commit_message.trim().is_empty() {
            anyhow::bail!("commit_message must not be empty");
        }

        if self.fps_sections.is_empty() {
            anyhow::bail!("fps_sections must list at least one section");
        }
        if self.fps_sections.iter().any(|s| s.is_empty()) || self.fps_field.is_empty() {
            anyhow::bail!("fps_sections and fps_field must not contain empty names");
        }
        if self.fps_old_value == self.fps_new_value {
            anyhow::bail!(
                "fps_old_value and fps_new_value are both '{}'",
                self.fps_old_value
            );
        }

        if self.legacy_field.is_empty() {
            anyhow::bail!("legacy_field must not be empty");
        }

        Ok(())
    }
}

/// Store directories are single relative path components under the root
fn validate_store_dir(key: &str, value: &str) -> Result<()> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => anyhow::bail!(
            "{} must be a single directory name relative to the root, got '{}'",
            key,
            value
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = MigrationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.initial_version.to_string(), "1.0.0");
        assert_eq!(
            config.profiles_path(Path::new("/repo")),
            PathBuf::from("/repo/profiles")
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: MigrationConfig =
            serde_json::from_str(r#"{"branch": "v1-data", "initial_version": "0.9.0"}"#).unwrap();
        assert_eq!(config.branch, "v1-data");
        assert_eq!(config.initial_version.to_string(), "0.9.0");
        assert_eq!(config.fps_old_value, "Unlocked");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result = serde_json::from_str::<MigrationConfig>(r#"{"profile_dir": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = MigrationConfig {
            profiles_dir: "../elsewhere".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MigrationConfig {
            profiles_dir: "data".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MigrationConfig {
            branch: "my branch".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MigrationConfig {
            fps_new_value: "Unlocked".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MigrationConfig {
            fps_sections: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migrate.json");

        let config = MigrationConfig {
            branch: "profiles-v1".into(),
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();

        let loaded = MigrationConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
