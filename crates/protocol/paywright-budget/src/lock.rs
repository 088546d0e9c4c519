//! Cross-process advisory locking.
//!
//! Several agent processes may share one wallet directory. Budget checks and
//! ledger writes happen under an exclusive file lock so two processes cannot
//! both pass the gate against the same stale totals.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::Result;

/// Directory under the data dir holding lock files.
const LOCK_DIR: &str = "locks";

/// A named exclusive lock scoped to a data directory.
#[derive(Debug, Clone)]
pub struct AdvisoryLock {
    path: PathBuf,
}

impl AdvisoryLock {
    /// Lock named `name` under `data_dir`.
    pub fn new(data_dir: &Path, name: &str) -> Self {
        Self {
            path: data_dir.join(LOCK_DIR).join(format!("{name}.lock")),
        }
    }

    /// Block until the lock is held. The wait runs on the blocking pool so
    /// the async runtime is never stalled by a contended lock.
    pub async fn acquire(&self) -> Result<LockGuard> {
        let path = self.path.clone();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| std::io::Error::other(e))??;

        debug!(path = %self.path.display(), "acquired advisory lock");
        Ok(LockGuard { file })
    }
}

/// Holds the lock; released on drop.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = fs2::FileExt::unlock(&self.file) {
            warn!(%err, "failed to release advisory lock");
        }
    }
}
