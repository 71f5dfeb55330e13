//! Record store access.
//!
//! Stages never touch `std::fs` directly; they go through `RecordStore` so
//! the same stage code can run against the real file system or a dry-run
//! wrapper that only logs what it would have changed.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{MigrationError, Result};
use crate::record::{RECORD_EXTENSION, Record};

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symlinks, sockets and anything else the stages leave alone
    Other,
}

/// One entry of a store directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
}

impl StoreEntry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Name as stored on disk; `name` is a lossy UTF-8 rendering for logs
    pub fn file_name(&self) -> &OsStr {
        self.path.file_name().unwrap_or(OsStr::new(&self.name))
    }

    /// Regular file whose name ends in `.json`
    pub fn is_record_file(&self) -> bool {
        self.is_file()
            && Path::new(&self.name)
                .extension()
                .is_some_and(|ext| ext == RECORD_EXTENSION)
    }
}

/// Access to the directory subtree holding profile documents.
pub trait RecordStore {
    /// List the entries of `dir`. Order is not significant.
    fn list(&self, dir: &Path) -> Result<Vec<StoreEntry>>;

    /// Read and parse one record.
    fn read_record(&self, path: &Path) -> Result<Record>;

    /// Write a record as 2-space pretty JSON, flushed to disk before returning.
    fn write_record(&self, path: &Path, record: &Record) -> Result<()>;

    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Remove a directory and everything below it.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Create `path` and any missing parents; existing directories are fine.
    fn ensure_dir(&self, path: &Path) -> Result<()>;

    fn is_dir(&self, path: &Path) -> bool;

    fn exists(&self, path: &Path) -> bool;
}

/// `RecordStore` backed by the local file system
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl RecordStore for FsStore {
    fn list(&self, dir: &Path) -> Result<Vec<StoreEntry>> {
        let read_dir = fs::read_dir(dir).map_err(|e| MigrationError::io(dir, e))?;
        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| MigrationError::io(dir, e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| MigrationError::io(entry.path(), e))?;
            let kind = if file_type.is_file() {
                EntryKind::File
            } else if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::Other
            };
            entries.push(StoreEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                kind,
            });
        }
        // Stable order keeps logs and reports reproducible
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_record(&self, path: &Path) -> Result<Record> {
        let text = fs::read_to_string(path).map_err(|e| MigrationError::io(path, e))?;
        Record::parse(&text, path)
    }

    fn write_record(&self, path: &Path, record: &Record) -> Result<()> {
        let mut file = File::create(path).map_err(|e| MigrationError::io(path, e))?;
        file.write_all(record.to_pretty_json().as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| MigrationError::io(path, e))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| MigrationError::io(path, e))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).map_err(|e| MigrationError::io(path, e))
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| MigrationError::io(path, e))
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Store wrapper for `--dry-run`: reads pass through, mutations are logged.
#[derive(Debug, Clone, Default)]
pub struct DryRunStore<S> {
    inner: S,
}

impl<S: RecordStore> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: RecordStore> RecordStore for DryRunStore<S> {
    fn list(&self, dir: &Path) -> Result<Vec<StoreEntry>> {
        self.inner.list(dir)
    }

    fn read_record(&self, path: &Path) -> Result<Record> {
        self.inner.read_record(path)
    }

    fn write_record(&self, path: &Path, _record: &Record) -> Result<()> {
        info!(path = %path.display(), "[DRY RUN] would write record");
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "[DRY RUN] would remove file");
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "[DRY RUN] would remove directory tree");
        Ok(())
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        if !self.inner.is_dir(path) {
            info!(path = %path.display(), "[DRY RUN] would create directory");
        }
        Ok(())
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_classifies_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();

        let entries = FsStore.list(dir.path()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b.json", "notes.txt"]);
        assert!(entries[0].is_dir());
        assert!(entries[1].is_record_file());
        assert!(!entries[2].is_record_file());
    }

    #[test]
    fn test_directory_named_json_is_not_a_record() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("odd.json")).unwrap();
        let entries = FsStore.list(dir.path()).unwrap();
        assert!(!entries[0].is_record_file());
    }

    #[test]
    fn test_list_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsStore.list(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, MigrationError::Io { .. }));
    }

    #[test]
    fn test_write_then_read_preserves_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.json");
        let record = Record::parse(r#"{"b": 1, "a": {"x": true}}"#, &path).unwrap();

        FsStore.write_record(&path, &record).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "{\n  \"b\": 1,\n  \"a\": {\n    \"x\": true\n  }\n}"
        );
        assert_eq!(FsStore.read_record(&path).unwrap(), record);
    }

    #[test]
    fn test_dry_run_store_does_not_mutate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.json");
        fs::write(&path, r#"{"k": 1}"#).unwrap();

        let store = DryRunStore::new(FsStore);
        let record = store.read_record(&path).unwrap();
        store.write_record(&dir.path().join("new.json"), &record).unwrap();
        store.remove_file(&path).unwrap();
        store.ensure_dir(&dir.path().join("group")).unwrap();
        store.remove_dir_all(dir.path()).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("new.json").exists());
        assert!(!dir.path().join("group").exists());
    }
}
