//! Storage backends for sources and renditions.
//!
//! Names are `/`-separated relative paths (`folder/photo.jpg`,
//! `__sized__/folder/photo-thumbnail-100x100.jpg`). A backend maps them to
//! bytes and to public URLs; the engine never builds filesystem paths itself.
//!
//! - [`FileSystemStorage`]: a media root on disk plus a base URL.
//! - [`MemoryStorage`]: a map in memory, for tests and embedding.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("{0:?} not found in storage")]
    NotFound(String),
    #[error("invalid storage name {0:?}")]
    InvalidName(String),
}

pub trait Storage: Send + Sync {
    fn exists(&self, name: &str) -> bool;

    fn open(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Write `bytes` under `name`, replacing anything already there.
    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Remove `name`. Returns whether anything was deleted.
    fn delete(&self, name: &str) -> Result<bool, StorageError>;

    fn url(&self, name: &str) -> String;
}

fn join_url(base_url: &str, name: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), name)
}

// =============================================================================
// Filesystem
// =============================================================================

#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
    base_url: String,
}

impl FileSystemStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a storage name to a path under the root. Absolute names and `..`
    /// are rejected so nothing escapes the media root.
    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(name);
        let safe = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl Storage for FileSystemStorage {
    fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_ok_and(|path| path.is_file())
    }

    fn open(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(name)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
            _ => StorageError::Io(e),
        })
    }

    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.resolve(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, name: &str) -> String {
        join_url(&self.base_url, name)
    }
}

// =============================================================================
// In-memory
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    base_url: String,
}

impl MemoryStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            base_url: base_url.into(),
        }
    }

    fn files(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stored names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.files().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn exists(&self, name: &str) -> bool {
        self.files().contains_key(name)
    }

    fn open(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.files()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if name.is_empty() {
            return Err(StorageError::InvalidName(String::new()));
        }
        self.files().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.files().remove(name).is_some())
    }

    fn url(&self, name: &str) -> String {
        join_url(&self.base_url, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn filesystem_save_open_delete() {
        let tmp = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(tmp.path(), "/media/");

        assert!(!storage.exists("__sized__/a/b.jpg"));
        storage.save("__sized__/a/b.jpg", b"data").unwrap();
        assert!(storage.exists("__sized__/a/b.jpg"));
        assert!(tmp.path().join("__sized__/a/b.jpg").is_file());
        assert_eq!(storage.open("__sized__/a/b.jpg").unwrap(), b"data");

        assert!(storage.delete("__sized__/a/b.jpg").unwrap());
        assert!(!storage.delete("__sized__/a/b.jpg").unwrap());
        assert!(matches!(
            storage.open("__sized__/a/b.jpg"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn filesystem_rejects_escaping_names() {
        let tmp = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(tmp.path(), "/media");
        for name in ["../outside.jpg", "/etc/passwd", "a/../../b.jpg", ""] {
            assert!(
                matches!(storage.save(name, b"x"), Err(StorageError::InvalidName(_))),
                "{name:?}"
            );
            assert!(!storage.exists(name));
        }
    }

    #[test]
    fn urls_join_base_and_name() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            FileSystemStorage::new(tmp.path(), "/media/").url("__sized__/x.jpg"),
            "/media/__sized__/x.jpg"
        );
        assert_eq!(
            MemoryStorage::new("https://cdn.example.com/m").url("x.jpg"),
            "https://cdn.example.com/m/x.jpg"
        );
    }

    #[test]
    fn memory_storage_round_trip() {
        let storage = MemoryStorage::new("/media");
        storage.save("b.png", b"2").unwrap();
        storage.save("a.png", b"1").unwrap();
        assert_eq!(storage.names(), ["a.png", "b.png"]);
        assert_eq!(storage.open("a.png").unwrap(), b"1");
        assert!(storage.delete("a.png").unwrap());
        assert_eq!(storage.len(), 1);
        assert!(matches!(storage.open("a.png"), Err(StorageError::NotFound(_))));
    }
}
