//! The symlink that makes an installed plugin version active.
//!
//! A plugin is installed exactly when its link exists in the bin directory;
//! the link target encodes the active version.

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::errors::{InstallError, Result};

/// Points `link` at `executable`, replacing an existing link.
///
/// # Errors
///
/// Fails with [`InstallError::Link`] when something other than a symlink is
/// in the way or when `executable` does not exist.
pub fn point(executable: &Path, link: &Path) -> Result<()> {
    remove(link)?;

    if executable.symlink_metadata().is_err() {
        return Err(InstallError::link(
            link,
            format!("executable {} does not exist", executable.display()),
        ));
    }
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            InstallError::link_io(link, format!("cannot create {}", parent.display()), e)
        })?;
    }

    debug!(link = %link.display(), target = %executable.display(), "creating link");
    create_link(executable, link).map_err(|e| {
        InstallError::link_io(
            link,
            format!("cannot create link to {}", executable.display()),
            e,
        )
    })
}

/// Removes the symlink at `link`. A missing link is not an error.
///
/// # Errors
///
/// Returns [`InstallError::Link`] if `link` exists but is not a symlink, or if
/// it cannot be inspected or removed.
pub fn remove(link: &Path) -> Result<()> {
    let metadata = match link.symlink_metadata() {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(link = %link.display(), "no link to remove");
            return Ok(());
        }
        Err(e) => return Err(InstallError::link_io(link, "cannot inspect link", e)),
    };
    if !metadata.file_type().is_symlink() {
        return Err(InstallError::link(link, "file exists and is not a symlink"));
    }
    debug!(link = %link.display(), "removing link");
    fs::remove_file(link).map_err(|e| InstallError::link_io(link, "cannot remove link", e))
}

#[cfg(unix)]
fn create_link(source: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn create_link(source: &Path, target: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(source, target)
}
