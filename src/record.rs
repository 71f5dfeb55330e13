//! Profile records and the identifiers that address them.
//!
//! A `Record` is one group's profile document. Its schema is implicit: stages
//! look fields up explicitly and get `None` back for anything missing or of
//! the wrong shape, instead of relying on permissive dynamic access.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{MigrationError, Result};

/// Extension every record file carries.
pub const RECORD_EXTENSION: &str = "json";

/// One profile document: a JSON object with key order preserved.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Parse record text. `path` is only used to label errors.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| MigrationError::parse(path, e))?;
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(MigrationError::NotAMapping(path.to_path_buf())),
        }
    }

    /// Render as pretty JSON with 2-space indentation.
    pub fn to_pretty_json(&self) -> String {
        // Serializing a Map<String, Value> cannot fail
        serde_json::to_string_pretty(&self.fields).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Remove a top-level key, keeping the order of the remaining keys.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    /// Look up `section.field` as a string.
    ///
    /// Returns `None` if the section is absent or not an object, or if the
    /// field is absent or not a string.
    pub fn nested_str(&self, section: &str, field: &str) -> Option<&str> {
        self.fields
            .get(section)?
            .as_object()?
            .get(field)?
            .as_str()
    }

    /// Overwrite `section.field` with a string.
    ///
    /// Only succeeds when `section` already exists as an object; returns
    /// whether the value was written.
    pub fn set_nested_str(&mut self, section: &str, field: &str, value: &str) -> bool {
        match self.fields.get_mut(section).and_then(Value::as_object_mut) {
            Some(obj) => {
                obj.insert(field.to_string(), Value::String(value.to_string()));
                true
            }
            None => false,
        }
    }

    /// Replace `section.field` when it equals `from` exactly.
    ///
    /// Returns true when the record changed.
    pub fn replace_nested_str(&mut self, section: &str, field: &str, from: &str, to: &str) -> bool {
        if self.nested_str(section, field) == Some(from) {
            self.set_nested_str(section, field, to)
        } else {
            false
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.fields)
    }
}

/// Stable identifier of one logical entity (e.g. a game title id).
///
/// Derived from a flat file's stem or a group directory's name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(String);

impl GroupId {
    /// Derive the id of a flat record file, e.g. `abc123.json` -> `abc123`.
    ///
    /// Returns `None` for names without a `.json` extension or an empty stem.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".json")?;
        if stem.is_empty() {
            return None;
        }
        Some(Self(stem.to_string()))
    }

    /// Id of a group directory.
    pub fn from_dir_name(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<group>.json`
    pub fn flat_file_name(&self) -> String {
        format!("{}.{}", self.0, RECORD_EXTENSION)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Version tag of a record inside a versioned group directory (`1.0.0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionTag {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl VersionTag {
    /// Version assigned to all pre-existing data by the restructuring stage.
    pub const INITIAL: VersionTag = VersionTag {
        major: 1,
        minor: 0,
        patch: 0,
    };

    /// `<version>.json`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self, RECORD_EXTENSION)
    }

    /// Path of this version inside a group directory.
    pub fn path_in(&self, group_dir: &Path) -> PathBuf {
        group_dir.join(self.file_name())
    }
}

impl Default for VersionTag {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for VersionTag {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || MigrationError::config(format!("Invalid version tag '{}'. Expected MAJOR.MINOR.PATCH", s));
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }
        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
        })
    }
}

impl Serialize for VersionTag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionTag {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str) -> Record {
        Record::parse(text, Path::new("test.json")).unwrap()
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err = Record::parse("[1, 2]", Path::new("list.json")).unwrap_err();
        assert!(matches!(err, MigrationError::NotAMapping(_)));

        let err = Record::parse("{not json", Path::new("broken.json")).unwrap_err();
        assert!(matches!(err, MigrationError::Parse { .. }));
    }

    #[test]
    fn test_nested_lookup_handles_missing_and_wrong_shape() {
        let r = record(r#"{"docked": {"fps_behavior": "Unlocked"}, "handheld": "oops"}"#);
        assert_eq!(r.nested_str("docked", "fps_behavior"), Some("Unlocked"));
        assert_eq!(r.nested_str("handheld", "fps_behavior"), None);
        assert_eq!(r.nested_str("missing", "fps_behavior"), None);

        let r = record(r#"{"docked": {"fps_behavior": 30}}"#);
        assert_eq!(r.nested_str("docked", "fps_behavior"), None);
    }

    #[test]
    fn test_replace_nested_is_exact_match() {
        let mut r = record(r#"{"docked": {"fps_behavior": "unlocked"}}"#);
        assert!(!r.replace_nested_str("docked", "fps_behavior", "Unlocked", "Unstable"));
        assert_eq!(r.nested_str("docked", "fps_behavior"), Some("unlocked"));

        let mut r = record(r#"{"docked": {"fps_behavior": "Unlocked", "target_fps": 60}}"#);
        assert!(r.replace_nested_str("docked", "fps_behavior", "Unlocked", "Unstable"));
        assert_eq!(r.nested_str("docked", "fps_behavior"), Some("Unstable"));
        assert_eq!(r.get("docked").unwrap()["target_fps"], 60);
    }

    #[test]
    fn test_key_order_preserved() {
        let mut r = record(r#"{"zeta": 1, "alpha": 2, "game_version": "1.2", "mid": 3}"#);
        assert_eq!(r.remove("game_version"), Some(Value::from("1.2")));
        let keys: Vec<String> = match Value::from(r) {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => unreachable!(),
        };
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_large_numbers_survive_rewrite() {
        let text = r#"{"size": 123456789012345678901234, "ratio": 0.1000000000000000055511151231257827}"#;
        let r = Record::parse(text, Path::new("t.json")).unwrap();
        assert_eq!(
            r.to_pretty_json(),
            "{\n  \"size\": 123456789012345678901234,\n  \"ratio\": 0.1000000000000000055511151231257827\n}"
        );
    }

    #[test]
    fn test_pretty_json_uses_two_space_indent() {
        let r = record(r#"{"docked": {"fps_behavior": "Unstable"}}"#);
        assert_eq!(
            r.to_pretty_json(),
            "{\n  \"docked\": {\n    \"fps_behavior\": \"Unstable\"\n  }\n}"
        );
    }

    #[test]
    fn test_group_id_from_file_name() {
        assert_eq!(
            GroupId::from_file_name("0100ABC.json").map(|g| g.to_string()),
            Some("0100ABC".to_string())
        );
        assert!(GroupId::from_file_name("README.md").is_none());
        assert!(GroupId::from_file_name(".json").is_none());
        assert_eq!(GroupId::from_dir_name("abc").flat_file_name(), "abc.json");
    }

    #[test]
    fn test_version_tag_parse() {
        let v: VersionTag = "1.0.0".parse().unwrap();
        assert_eq!(v, VersionTag::INITIAL);
        assert_eq!(v.file_name(), "1.0.0.json");

        let v: VersionTag = "2.10.3".parse().unwrap();
        assert_eq!(v.to_string(), "2.10.3");

        assert!("1.0".parse::<VersionTag>().is_err());
        assert!("1.0.x".parse::<VersionTag>().is_err());
        assert!("1..0".parse::<VersionTag>().is_err());
        assert!("+1.0.0".parse::<VersionTag>().is_err());
    }

    #[test]
    fn test_version_tag_serde() {
        let v: VersionTag = serde_json::from_str("\"3.2.1\"").unwrap();
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"3.2.1\"");
        assert!(serde_json::from_str::<VersionTag>("\"bad\"").is_err());
    }
}
