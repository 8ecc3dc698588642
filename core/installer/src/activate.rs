//! Promotion of a prepared staging directory into its versioned location.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::errors::{InstallError, Result};
use crate::pathutil;

/// Moves `staging` to `target`, replacing any existing directory there.
///
/// Uses a rename, falling back to a recursive copy that keeps permission bits
/// when the two paths are on different devices.
///
/// # Errors
///
/// Returns [`InstallError::Io`] if an existing `target` cannot be removed and
/// [`InstallError::Activation`] if neither the rename nor the copy succeeds.
pub fn activate(staging: &Path, target: &Path) -> Result<()> {
    if target.is_dir() {
        debug!(target = %target.display(), "removing existing install directory");
        fs::remove_dir_all(target).map_err(|e| {
            InstallError::io(format!("could not remove existing {}", target.display()), e)
        })?;
    }

    match fs::rename(staging, target) {
        Ok(()) => {
            debug!(from = %staging.display(), to = %target.display(), "renamed staging directory");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(
                from = %staging.display(),
                to = %target.display(),
                "rename crosses devices, copying instead"
            );
            copy_tree(staging, target).map_err(|source| InstallError::Activation {
                from: staging.to_path_buf(),
                to: target.to_path_buf(),
                source,
            })
        }
        Err(source) => Err(InstallError::Activation {
            from: staging.to_path_buf(),
            to: target.to_path_buf(),
            source,
        }),
    }
}

/// Recursively copies `from` to `to`, keeping permission bits.
fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(io::Error::other)?;
        let Some(dest) = pathutil::replace_base(entry.path(), from, to) else {
            return Err(io::Error::other(format!(
                "{} is not below {}",
                entry.path().display(),
                from.display()
            )));
        };
        let metadata = entry.metadata().map_err(io::Error::other)?;

        if metadata.is_dir() {
            fs::create_dir_all(&dest)?;
            fs::set_permissions(&dest, metadata.permissions())?;
        } else {
            trace!(from = %entry.path().display(), to = %dest.display(), "copy");
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "hatch-activate-test-{}-{}",
            name,
            rand::random::<u64>()
        ));
        fs::create_dir_all(&dir).expect("Should create temp dir");
        dir
    }

    fn populate(dir: &Path) {
        fs::create_dir_all(dir.join("bin")).expect("Should create");
        fs::write(dir.join("bin/plugin"), b"plugin").expect("Should write");
        fs::write(dir.join("README"), b"readme").expect("Should write");
    }

    #[test]
    fn activate_renames_staging() {
        let dir = temp_test_dir("rename");
        let staging = dir.join("staging");
        let target = dir.join("store/foo/abc");
        populate(&staging);
        fs::create_dir_all(target.parent().expect("Should have parent")).expect("Should create");

        activate(&staging, &target).expect("Should activate");

        assert!(!staging.exists());
        assert_eq!(fs::read(target.join("bin/plugin")).expect("Should read"), b"plugin");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn activate_replaces_existing_directory() {
        let dir = temp_test_dir("replace");
        let staging = dir.join("staging");
        let target = dir.join("target");
        populate(&staging);
        fs::create_dir_all(&target).expect("Should create");
        fs::write(target.join("stale"), b"old").expect("Should write");

        activate(&staging, &target).expect("Should activate");

        assert!(!target.join("stale").exists());
        assert!(target.join("README").exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_staging_is_activation_error() {
        let dir = temp_test_dir("missing");
        let err = activate(&dir.join("nope"), &dir.join("target")).expect_err("Should fail");
        assert!(matches!(err, InstallError::Activation { .. }));
        fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_keeps_structure_and_modes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = temp_test_dir("copy");
        let from = dir.join("from");
        let to = dir.join("to");
        populate(&from);
        fs::set_permissions(from.join("bin/plugin"), fs::Permissions::from_mode(0o755))
            .expect("Should chmod");

        copy_tree(&from, &to).expect("Should copy");

        assert_eq!(fs::read(to.join("README")).expect("Should read"), b"readme");
        let mode = fs::metadata(to.join("bin/plugin"))
            .expect("Should stat")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
        fs::remove_dir_all(&dir).ok();
    }
}
