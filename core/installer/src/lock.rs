//! Per-plugin advisory lock.
//!
//! Install, upgrade and removal of one plugin name are serialized through an
//! exclusive lock on `<download_dir>/.locks/<name>.lock`. Different names never
//! contend.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use tracing::{debug, warn};

use crate::errors::{InstallError, Result};

/// Holds the lock until dropped.
#[derive(Debug)]
pub struct PluginLock {
    file: File,
    path: PathBuf,
}

impl PluginLock {
    /// Blocks until the lock at `path` is held exclusively.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                InstallError::io(format!("failed to create lock directory {}", parent.display()), e)
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| InstallError::io(format!("failed to open lock {}", path.display()), e))?;
        FileExt::lock_exclusive(&file)
            .map_err(|e| InstallError::io(format!("failed to lock {}", path.display()), e))?;
        debug!(lock = %path.display(), "acquired plugin lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PluginLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(lock = %self.path.display(), error = %e, "failed to release plugin lock");
        } else {
            debug!(lock = %self.path.display(), "released plugin lock");
        }
    }
}
