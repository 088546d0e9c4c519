//! Key-value blob persistence.
//!
//! The engine and keystore treat persistence as a small named-blob store so
//! alternative backends (browser extension storage, in-memory for tests) can
//! slot in. The default implementation writes JSON blobs as files under the
//! platform data directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::Result;

/// Get the default data directory for paywright state.
///
/// Priority:
/// 1. `PAYWRIGHT_DATA_DIR` environment variable (if set)
/// 2. Platform-specific data directory
/// 3. Fallback to `$HOME/.paywright`
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PAYWRIGHT_DATA_DIR") {
        return PathBuf::from(dir);
    }

    directories::ProjectDirs::from("io", "paywright", "paywright")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".paywright")
        })
}

/// Named blob storage for wallet, budget, ledger, and pending records.
pub trait BlobStore: Send + Sync {
    /// Read a blob, or `None` if it does not exist.
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Write a blob, replacing any existing content.
    fn put(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Delete a blob; deleting a missing blob is not an error.
    fn delete(&self, name: &str) -> Result<()>;
}

/// Filesystem blob store rooted at a directory.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Open a store at the default data directory.
    pub fn open_default() -> Result<Self> {
        Self::open(default_data_dir())
    }

    /// The root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
        // Write-then-rename so a crash mid-write never leaves a torn blob.
        let tmp = self.path_for(&format!("{}.tmp", name));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, self.path_for(name))?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory blob store for tests.
#[derive(Default)]
pub struct MemBlobStore {
    blobs: Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl MemBlobStore {
    /// Create an empty in-memory store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl BlobStore for MemBlobStore {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().unwrap().get(name).cloned())
    }

    fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.lock().unwrap().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.blobs.lock().unwrap().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_blob_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();

        assert!(store.get("wallet.json").unwrap().is_none());
        store.put("wallet.json", b"{\"a\":1}").unwrap();
        assert_eq!(store.get("wallet.json").unwrap().unwrap(), b"{\"a\":1}");

        store.delete("wallet.json").unwrap();
        assert!(store.get("wallet.json").unwrap().is_none());
    }

    #[test]
    fn test_fs_blob_delete_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();
        assert!(store.delete("nothing.json").is_ok());
    }

    #[test]
    fn test_fs_blob_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();
        store.put("b", b"one").unwrap();
        store.put("b", b"two").unwrap();
        assert_eq!(store.get("b").unwrap().unwrap(), b"two");
    }

    #[test]
    fn test_mem_blob_store() {
        let store = MemBlobStore::new();
        store.put("x", b"1").unwrap();
        assert_eq!(store.get("x").unwrap().unwrap(), b"1");
        store.delete("x").unwrap();
        assert!(store.get("x").unwrap().is_none());
    }
}
