//! Filesystem capability consumed by the append-only store.
//!
//! The store depends only on the [`Storage`] trait — read, write, append,
//! and directory operations over opaque text blobs. [`DirStorage`] is the
//! standard-filesystem backend; alternative backends implement the same
//! trait and are selected at construction.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Minimal storage capability. All paths are relative to the backend root.
pub trait Storage {
    fn read_text(&self, path: &Path) -> Result<String>;
    /// Replace the file contents atomically.
    fn write_text(&self, path: &Path, data: &str) -> Result<()>;
    fn append_text(&self, path: &Path, data: &str) -> Result<()>;
    fn mkdir(&self, path: &Path) -> Result<()>;
    fn list(&self, path: &Path) -> Result<Vec<PathBuf>>;
    fn exists(&self, path: &Path) -> bool;
    fn remove(&self, path: &Path) -> Result<()>;
}

/// Filesystem backend rooted at a directory.
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    /// Create a backend rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create storage root {}", root.display()))?;
        tracing::debug!(root = %root.display(), "storage initialized");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl Storage for DirStorage {
    fn read_text(&self, path: &Path) -> Result<String> {
        let full = self.resolve(path);
        std::fs::read_to_string(&full)
            .with_context(|| format!("failed to read {}", full.display()))
    }

    fn write_text(&self, path: &Path, data: &str) -> Result<()> {
        let full = self.resolve(path);
        // Write to a sibling temp file, then rename over the target so a
        // crash mid-write never leaves a half-written log.
        let tmp = full.with_extension("tmp");
        std::fs::write(&tmp, data)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &full)
            .with_context(|| format!("failed to replace {}", full.display()))?;
        Ok(())
    }

    fn append_text(&self, path: &Path, data: &str) -> Result<()> {
        let full = self.resolve(path);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full)
            .with_context(|| format!("failed to open {} for append", full.display()))?;
        file.write_all(data.as_bytes())
            .with_context(|| format!("failed to append to {}", full.display()))?;
        Ok(())
    }

    fn mkdir(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path);
        std::fs::create_dir_all(&full)
            .with_context(|| format!("failed to create directory {}", full.display()))
    }

    fn list(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let full = self.resolve(path);
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&full)
            .with_context(|| format!("failed to list {}", full.display()))?
        {
            let entry = entry.with_context(|| format!("failed to list {}", full.display()))?;
            entries.push(entry.path());
        }
        entries.sort();
        Ok(entries)
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path);
        std::fs::remove_file(&full)
            .with_context(|| format!("failed to remove {}", full.display()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read_round_trips() {
        let tmp = TempDir::new().unwrap();
        let storage = DirStorage::new(tmp.path()).unwrap();
        let path = Path::new("items.log");

        storage.write_text(path, "hello\n").unwrap();
        assert!(storage.exists(path));
        assert_eq!(storage.read_text(path).unwrap(), "hello\n");
    }

    #[test]
    fn append_accumulates() {
        let tmp = TempDir::new().unwrap();
        let storage = DirStorage::new(tmp.path()).unwrap();
        let path = Path::new("items.log");

        storage.append_text(path, "one\n").unwrap();
        storage.append_text(path, "two\n").unwrap();
        assert_eq!(storage.read_text(path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn write_replaces_prior_contents() {
        let tmp = TempDir::new().unwrap();
        let storage = DirStorage::new(tmp.path()).unwrap();
        let path = Path::new("items.log");

        storage.append_text(path, "stale\n").unwrap();
        storage.write_text(path, "fresh\n").unwrap();
        assert_eq!(storage.read_text(path).unwrap(), "fresh\n");
    }

    #[test]
    fn read_missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let storage = DirStorage::new(tmp.path()).unwrap();
        assert!(storage.read_text(Path::new("absent.log")).is_err());
    }

    #[test]
    fn mkdir_and_list() {
        let tmp = TempDir::new().unwrap();
        let storage = DirStorage::new(tmp.path()).unwrap();

        storage.mkdir(Path::new("sub")).unwrap();
        storage.write_text(Path::new("sub/a.log"), "a").unwrap();
        storage.write_text(Path::new("sub/b.log"), "b").unwrap();

        let listed = storage.list(Path::new("sub")).unwrap();
        assert_eq!(listed.len(), 2);
    }
}
