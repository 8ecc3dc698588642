//! Directory layout of a hatch installation.

use std::path::{Path, PathBuf};

/// Prefix of every plugin link in the bin directory.
pub const BIN_PREFIX: &str = "hatch";

/// Resolved locations the installer works in.
///
/// - `install_root/<name>/<version>/`: immutable version directories
/// - `bin_dir/hatch-<name>`: one link per installed plugin
/// - `download_dir/`: disposable extraction and staging directories
/// - `download_dir/.locks/<name>.lock`: per-plugin locks. Plugin names never
///   start with a dot, so no scratch directory can shadow this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPaths {
    pub install_root: PathBuf,
    pub bin_dir: PathBuf,
    pub download_dir: PathBuf,
}

impl InstallPaths {
    pub fn new(
        install_root: impl Into<PathBuf>,
        bin_dir: impl Into<PathBuf>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            install_root: install_root.into(),
            bin_dir: bin_dir.into(),
            download_dir: download_dir.into(),
        }
    }

    /// Lays out `store/`, `bin/` and `downloads/` under one root.
    #[must_use = "returns new paths instance without side effects"]
    pub fn with_root(root: &Path) -> Self {
        Self::new(root.join("store"), root.join("bin"), root.join("downloads"))
    }

    /// Directory holding every installed version of `name`.
    #[must_use]
    pub fn plugin_dir(&self, name: &str) -> PathBuf {
        self.install_root.join(name)
    }

    /// Directory of one installed version.
    #[must_use]
    pub fn version_dir(&self, name: &str, version: &str) -> PathBuf {
        self.plugin_dir(name).join(version)
    }

    /// Scratch directory an archive is extracted into.
    #[must_use]
    pub fn extraction_dir(&self, name: &str) -> PathBuf {
        self.download_dir.join(name)
    }

    /// Scratch directory the relocated files are assembled in.
    #[must_use]
    pub fn staging_dir(&self, name: &str, suffix: &str) -> PathBuf {
        self.download_dir.join(format!("{name}-staging-{suffix}"))
    }

    /// Directory holding every plugin lock file.
    #[must_use]
    pub fn lock_dir(&self) -> PathBuf {
        self.download_dir.join(".locks")
    }

    /// Lock file serializing operations on `name`.
    #[must_use]
    pub fn lock_path(&self, name: &str) -> PathBuf {
        self.lock_dir().join(format!("{name}.lock"))
    }

    /// Link that activates `name`.
    #[must_use]
    pub fn link_path(&self, name: &str, windows: bool) -> PathBuf {
        self.bin_dir.join(plugin_name_to_bin(name, windows))
    }
}

/// Name of the link for plugin `name`: `hatch-<name>` with `-` turned into
/// `_`, plus `.exe` on Windows.
#[must_use]
pub fn plugin_name_to_bin(name: &str, windows: bool) -> String {
    let base = format!("{BIN_PREFIX}-{}", name.replace('-', "_"));
    if windows { format!("{base}.exe") } else { base }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_root_lays_out_directories() {
        let root = std::env::temp_dir().join("hatch_test_home");
        let paths = InstallPaths::with_root(&root);
        assert_eq!(paths.install_root, root.join("store"));
        assert_eq!(paths.bin_dir, root.join("bin"));
        assert_eq!(paths.download_dir, root.join("downloads"));
    }

    #[test]
    fn per_plugin_paths() {
        let paths = InstallPaths::new("/i", "/b", "/d");
        assert_eq!(paths.version_dir("foo", "HEAD"), PathBuf::from("/i/foo/HEAD"));
        assert_eq!(paths.extraction_dir("foo"), PathBuf::from("/d/foo"));
        assert_eq!(paths.staging_dir("foo", "ab12"), PathBuf::from("/d/foo-staging-ab12"));
        assert_eq!(paths.lock_path("foo"), PathBuf::from("/d/.locks/foo.lock"));
        assert_eq!(paths.link_path("foo-bar", false), PathBuf::from("/b/hatch-foo_bar"));
    }

    #[test]
    fn lock_dir_is_not_a_scratch_dir_of_any_safe_name() {
        let paths = InstallPaths::new("/i", "/b", "/d");
        for name in ["locks", ".locks", "foo"] {
            if crate::manifest::is_safe_plugin_name(name) {
                assert_ne!(paths.extraction_dir(name), paths.lock_dir());
                assert!(!paths.lock_path("bar").starts_with(paths.extraction_dir(name)));
            }
        }
    }

    #[test]
    fn bin_names() {
        assert_eq!(plugin_name_to_bin("foo", false), "hatch-foo");
        assert_eq!(plugin_name_to_bin("foo-bar", false), "hatch-foo_bar");
        assert_eq!(plugin_name_to_bin("foo-bar", true), "hatch-foo_bar.exe");
    }
}
