//! Install, upgrade and removal of plugins.
//!
//! The [`Installer`] sequences platform selection, version resolution,
//! download, verification, extraction, relocation, activation and linking.
//! Scratch directories are always removed; a failed install leaves nothing
//! behind in the install root or the bin directory.
//!
//! ## Pipeline
//!
//! 1. Reject unsafe names and already installed plugins
//! 2. Select the platform descriptor and resolve the version
//! 3. Read the archive through the integrity checker and verify it
//! 4. Extract into `<download_dir>/<name>`
//! 5. Relocate files into a fresh staging directory
//! 6. Activate staging as `<install_root>/<name>/<version>` and link it

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::activate::activate;
use crate::archive::ArchiveKind;
use crate::errors::{InstallError, Result};
use crate::link;
use crate::lock::PluginLock;
use crate::manifest::{PlatformDescriptor, PluginManifest, ensure_safe_name, is_safe_plugin_name};
use crate::mover::SandboxedMover;
use crate::pathutil;
use crate::paths::InstallPaths;
use crate::platform::{Platform, select_platform};
use crate::source::{read_through, source_for};
use crate::verify::{IntegrityChecker, NoopChecker, Sha256Checker};
use crate::version::{self, HEAD_OLD_VERSION, HEAD_VERSION, ResolvedVersion};

/// Plugin name of the manager itself, which cannot remove itself.
pub const SELF_PLUGIN_NAME: &str = "hatch";

/// Caller choices for install and upgrade.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Use the mutable channel even when a pinned version exists.
    pub force_head: bool,
    /// Read the archive from this file instead of the resolved URI.
    pub archive_override: Option<PathBuf>,
}

/// Steps of the install pipeline, as reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    NotInstalled,
    Resolving,
    Fetching,
    Verifying,
    Extracting,
    Relocating,
    Activating,
    Linked,
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotInstalled => "not-installed",
            Self::Resolving => "resolving",
            Self::Fetching => "fetching",
            Self::Verifying => "verifying",
            Self::Extracting => "extracting",
            Self::Relocating => "relocating",
            Self::Activating => "activating",
            Self::Linked => "linked",
        };
        f.write_str(s)
    }
}

/// Records the current stage so an abort can name where it happened.
struct StageLog<'a> {
    plugin: &'a str,
    current: InstallStage,
}

impl<'a> StageLog<'a> {
    fn new(plugin: &'a str) -> Self {
        Self {
            plugin,
            current: InstallStage::NotInstalled,
        }
    }

    fn enter(&mut self, stage: InstallStage) {
        debug!(plugin = self.plugin, from = %self.current, to = %stage, "install stage");
        self.current = stage;
    }

    fn abort(&self, error: &InstallError) {
        warn!(plugin = self.plugin, stage = %self.current, %error, "install aborted");
    }
}

/// Everything decided before the first byte is downloaded.
struct Plan<'a> {
    descriptor: &'a PlatformDescriptor,
    resolved: ResolvedVersion,
    kind: ArchiveKind,
}

/// A directory removed when dropped.
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Creates an empty directory at `path`, clearing leftovers first.
    fn create(path: PathBuf) -> Result<Self> {
        if path.exists() {
            fs::remove_dir_all(&path).map_err(|e| {
                InstallError::io(format!("could not clear {}", path.display()), e)
            })?;
        }
        fs::create_dir_all(&path)
            .map_err(|e| InstallError::io(format!("could not create {}", path.display()), e))?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(dir = %self.path.display(), "removed scratch directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                dir = %self.path.display(),
                error = %e,
                "could not remove scratch directory"
            ),
        }
    }
}

/// Installs, upgrades and removes plugins under one [`InstallPaths`] layout.
#[derive(Debug, Clone)]
pub struct Installer {
    paths: InstallPaths,
    platform: Platform,
}

impl Installer {
    #[must_use]
    pub fn new(paths: InstallPaths, platform: Platform) -> Self {
        Self { paths, platform }
    }

    #[must_use]
    pub fn paths(&self) -> &InstallPaths {
        &self.paths
    }

    #[must_use]
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Installs the plugin described by `manifest`.
    ///
    /// # Errors
    ///
    /// - [`InstallError::UnsafeName`] before any filesystem access
    /// - [`InstallError::AlreadyInstalled`] when a version is linked
    /// - any pipeline error, after which nothing of the attempt remains
    pub fn install(
        &self,
        manifest: &PluginManifest,
        options: &InstallOptions,
    ) -> Result<ResolvedVersion> {
        let name = manifest.name.as_str();
        ensure_safe_name(name)?;
        self.ensure_not_installed(name)?;

        let _lock = PluginLock::acquire(&self.paths.lock_path(name))?;
        self.ensure_not_installed(name)?;

        let mut stages = StageLog::new(name);
        let result = self
            .plan(manifest, options.force_head, &mut stages)
            .and_then(|plan| {
                self.install_version(name, &plan, options, &mut stages)?;
                Ok(plan.resolved)
            });
        match &result {
            Ok(resolved) => info!(plugin = name, version = %resolved.version, "Installed plugin"),
            Err(e) => stages.abort(e),
        }
        result
    }

    /// Replaces the installed version of a plugin with the newest one.
    ///
    /// A plugin installed from the mutable channel stays on it. When both the
    /// old and new version are `HEAD`, the old directory is parked as
    /// `HEAD-OLD` and restored if the new install fails.
    pub fn upgrade(
        &self,
        manifest: &PluginManifest,
        options: &InstallOptions,
    ) -> Result<ResolvedVersion> {
        let name = manifest.name.as_str();
        ensure_safe_name(name)?;
        self.require_installed(name)?;

        let _lock = PluginLock::acquire(&self.paths.lock_path(name))?;
        let current = self.require_installed(name)?;

        let mut stages = StageLog::new(name);
        let force_head = options.force_head || current == HEAD_VERSION;
        let plan = self
            .plan(manifest, force_head, &mut stages)
            .inspect_err(|e| stages.abort(e))?;

        if plan.resolved.version == current && !plan.resolved.is_head() {
            return Err(InstallError::AlreadyUpgraded {
                name: name.to_string(),
                version: current,
            });
        }

        let parked = if current == HEAD_VERSION && plan.resolved.is_head() {
            Some(self.park_head(name)?)
        } else {
            None
        };

        if let Err(e) = self.install_version(name, &plan, options, &mut stages) {
            stages.abort(&e);
            if let Some(parked) = &parked {
                let head = self.paths.version_dir(name, HEAD_VERSION);
                if let Err(restore) = fs::rename(parked, &head) {
                    warn!(
                        plugin = name,
                        error = %restore,
                        "could not restore the previous HEAD version"
                    );
                }
            }
            return Err(e);
        }

        let previous = parked.unwrap_or_else(|| self.paths.version_dir(name, &current));
        if let Err(e) = fs::remove_dir_all(&previous) {
            warn!(
                plugin = name,
                dir = %previous.display(),
                error = %e,
                "could not remove the previous version"
            );
        }
        info!(plugin = name, from = %current, to = %plan.resolved.version, "Upgraded plugin");
        Ok(plan.resolved)
    }

    /// Removes an installed plugin: its link, its version directory, and the
    /// plugin directory when nothing else is left in it.
    ///
    /// # Errors
    ///
    /// [`InstallError::NotInstalled`] leaves the filesystem untouched. A
    /// failure after the link is removed may leave the version directory.
    pub fn remove(&self, name: &str) -> Result<()> {
        ensure_safe_name(name)?;
        if name == SELF_PLUGIN_NAME {
            return Err(InstallError::SelfRemoval {
                name: name.to_string(),
            });
        }
        self.require_installed(name)?;

        let _lock = PluginLock::acquire(&self.paths.lock_path(name))?;
        let version = self.require_installed(name)?;

        link::remove(&self.link_path(name))?;

        let version_dir = self.paths.version_dir(name, &version);
        debug!(plugin = name, dir = %version_dir.display(), "deleting version directory");
        fs::remove_dir_all(&version_dir).map_err(|e| {
            InstallError::io(format!("could not remove {}", version_dir.display()), e)
        })?;

        let plugin_dir = self.paths.plugin_dir(name);
        if let Err(e) = fs::remove_dir(&plugin_dir) {
            debug!(plugin = name, error = %e, "plugin directory kept");
        }
        info!(plugin = name, version = %version, "Removed plugin");
        Ok(())
    }

    /// Returns the linked version of `name`, or `None` when it has no link.
    ///
    /// The version is read from the link target: the second path segment
    /// below the install root.
    pub fn installed_version(&self, name: &str) -> Result<Option<String>> {
        ensure_safe_name(name)?;
        let link = self.link_path(name);
        match link.symlink_metadata() {
            Ok(metadata) if metadata.file_type().is_symlink() => {}
            Ok(_) => return Err(InstallError::link(&link, "file exists and is not a symlink")),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(InstallError::link_io(&link, "cannot inspect link", e)),
        }

        let target = fs::read_link(&link)
            .map_err(|e| InstallError::link_io(&link, "cannot read link", e))?;
        let target = if target.is_relative() {
            self.paths.bin_dir.join(target)
        } else {
            target
        };
        let target = pathutil::absolute(&target)?;
        let root = pathutil::absolute(&self.paths.install_root)?;

        let segments = pathutil::sub_path(&root, &target).ok_or_else(|| {
            InstallError::link(
                &link,
                format!("link target {} is not within {}", target.display(), root.display()),
            )
        })?;
        match segments.get(1) {
            Some(version) => Ok(Some(version.clone())),
            None => Err(InstallError::link(
                &link,
                format!("link target {} has no version segment", target.display()),
            )),
        }
    }

    /// Lists every plugin with a link, mapped to its installed version.
    ///
    /// Plugins whose link cannot be read are skipped with a warning.
    pub fn list_installed(&self) -> Result<BTreeMap<String, String>> {
        let mut installed = BTreeMap::new();
        let entries = match fs::read_dir(&self.paths.install_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(installed),
            Err(e) => {
                return Err(InstallError::io(
                    format!("could not read {}", self.paths.install_root.display()),
                    e,
                ));
            }
        };

        for entry in entries {
            let entry = entry.map_err(|e| {
                InstallError::io(
                    format!("could not read {}", self.paths.install_root.display()),
                    e,
                )
            })?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !entry.path().is_dir() || !is_safe_plugin_name(name) {
                continue;
            }
            match self.installed_version(name) {
                Ok(Some(version)) => {
                    installed.insert(name.to_string(), version);
                }
                Ok(None) => debug!(plugin = name, "plugin directory without link"),
                Err(e) => warn!(plugin = name, error = %e, "skipping plugin"),
            }
        }
        Ok(installed)
    }

    fn link_path(&self, name: &str) -> PathBuf {
        self.paths.link_path(name, self.platform.is_windows())
    }

    fn ensure_not_installed(&self, name: &str) -> Result<()> {
        match self.installed_version(name)? {
            Some(version) => Err(InstallError::AlreadyInstalled {
                name: name.to_string(),
                version,
            }),
            None => Ok(()),
        }
    }

    fn require_installed(&self, name: &str) -> Result<String> {
        self.installed_version(name)?
            .ok_or_else(|| InstallError::NotInstalled {
                name: name.to_string(),
            })
    }

    fn plan<'a>(
        &self,
        manifest: &'a PluginManifest,
        force_head: bool,
        stages: &mut StageLog<'_>,
    ) -> Result<Plan<'a>> {
        stages.enter(InstallStage::Resolving);
        let name = manifest.name.as_str();
        let descriptor = select_platform(name, &manifest.platforms, &self.platform)?.ok_or_else(
            || InstallError::NoMatchingPlatform {
                name: name.to_string(),
                os: self.platform.os.clone(),
                arch: self.platform.arch.clone(),
            },
        )?;
        descriptor.validate(name)?;

        let resolved = version::resolve(descriptor, force_head)?;
        let kind = ArchiveKind::from_uri(&resolved.uri)?;
        debug!(
            plugin = name,
            version = %resolved.version,
            uri = %resolved.uri,
            ?kind,
            "resolved version"
        );
        Ok(Plan {
            descriptor,
            resolved,
            kind,
        })
    }

    fn install_version(
        &self,
        name: &str,
        plan: &Plan<'_>,
        options: &InstallOptions,
        stages: &mut StageLog<'_>,
    ) -> Result<()> {
        let resolved = &plan.resolved;
        let mut checker: Box<dyn IntegrityChecker> = if resolved.is_head() {
            Box::new(NoopChecker)
        } else {
            Box::new(Sha256Checker::new(&plan.descriptor.sha256))
        };
        let source = source_for(&resolved.uri, options.archive_override.as_deref());

        stages.enter(InstallStage::Fetching);
        let data = read_through(source.as_ref(), checker.as_mut())?;

        stages.enter(InstallStage::Verifying);
        checker.verify()?;

        stages.enter(InstallStage::Extracting);
        let extraction = ScratchDir::create(self.paths.extraction_dir(name))?;
        plan.kind.extractor().extract(extraction.path(), &data)?;

        stages.enter(InstallStage::Relocating);
        let suffix = format!("{:016x}", rand::random::<u64>());
        let staging = ScratchDir::create(self.paths.staging_dir(name, &suffix))?;
        SandboxedMover::new(name, extraction.path(), staging.path())?
            .relocate(&plan.descriptor.files)?;

        stages.enter(InstallStage::Activating);
        let version_dir = self.paths.version_dir(name, &resolved.version);
        fs::create_dir_all(&version_dir).map_err(|e| {
            InstallError::io(format!("could not create {}", version_dir.display()), e)
        })?;

        let linked = activate(staging.path(), &version_dir)
            .and_then(|()| self.contained_bin(&version_dir, &plan.descriptor.bin))
            .and_then(|exe| link::point(&exe, &self.link_path(name)));
        if let Err(e) = linked {
            self.discard_version(name, &version_dir);
            return Err(e);
        }

        stages.enter(InstallStage::Linked);
        Ok(())
    }

    /// Resolves `bin` inside `version_dir`, refusing anything that resolves
    /// outside of it.
    fn contained_bin(&self, version_dir: &Path, bin: &str) -> Result<PathBuf> {
        let exe = version_dir.join(bin);
        let root = fs::canonicalize(version_dir)
            .map_err(|_| InstallError::sandbox(version_dir, version_dir))?;
        let resolved =
            fs::canonicalize(&exe).map_err(|_| InstallError::sandbox(&exe, version_dir))?;
        if !pathutil::is_sub_path(&root, &resolved) {
            return Err(InstallError::sandbox(&exe, version_dir));
        }
        pathutil::absolute(&exe)
    }

    fn discard_version(&self, name: &str, version_dir: &Path) {
        if let Err(e) = fs::remove_dir_all(version_dir) {
            warn!(
                plugin = name,
                dir = %version_dir.display(),
                error = %e,
                "could not remove failed install"
            );
        }
        if let Err(e) = fs::remove_dir(self.paths.plugin_dir(name)) {
            debug!(plugin = name, error = %e, "plugin directory kept");
        }
    }

    /// Moves the current `HEAD` directory out of the way.
    fn park_head(&self, name: &str) -> Result<PathBuf> {
        let head = self.paths.version_dir(name, HEAD_VERSION);
        let parked = self.paths.version_dir(name, HEAD_OLD_VERSION);
        if parked.exists() {
            fs::remove_dir_all(&parked).map_err(|e| {
                InstallError::io(format!("could not clear {}", parked.display()), e)
            })?;
        }
        fs::rename(&head, &parked).map_err(|e| {
            InstallError::io(
                format!("could not move {} to {}", head.display(), parked.display()),
                e,
            )
        })?;
        debug!(plugin = name, "parked previous HEAD version");
        Ok(parked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "hatch-install-test-{}-{}",
            name,
            rand::random::<u64>()
        ));
        fs::create_dir_all(&dir).expect("Should create temp dir");
        dir
    }

    fn installer(root: &Path) -> Installer {
        Installer::new(InstallPaths::with_root(root), Platform::new("linux", "amd64"))
    }

    fn manifest(name: &str) -> PluginManifest {
        PluginManifest {
            name: name.to_string(),
            platforms: Vec::new(),
        }
    }

    #[test]
    fn stage_display() {
        assert_eq!(InstallStage::Fetching.to_string(), "fetching");
        assert_eq!(InstallStage::Linked.to_string(), "linked");
    }

    #[test]
    fn unsafe_name_fails_before_filesystem_access() {
        let root =
            std::env::temp_dir().join(format!("hatch-never-created-{}", rand::random::<u64>()));
        let installer = installer(&root);

        let err = installer
            .install(&manifest("../evil"), &InstallOptions::default())
            .expect_err("Should fail");
        assert!(matches!(err, InstallError::UnsafeName { .. }));
        let err = installer.remove("..").expect_err("Should fail");
        assert!(matches!(err, InstallError::UnsafeName { .. }));
        assert!(!root.exists());
    }

    #[test]
    fn removing_self_is_refused() {
        let dir = temp_test_dir("self");
        let err = installer(&dir).remove(SELF_PLUGIN_NAME).expect_err("Should fail");
        assert!(matches!(err, InstallError::SelfRemoval { .. }));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn removing_absent_plugin_mutates_nothing() {
        let dir = temp_test_dir("absent");
        let err = installer(&dir).remove("foo").expect_err("Should fail");
        assert!(matches!(err, InstallError::NotInstalled { .. }));
        let entries = fs::read_dir(&dir).expect("Should read").count();
        assert_eq!(entries, 0);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn no_matching_platform_leaves_no_trace() {
        let dir = temp_test_dir("no-platform");
        let installer = installer(&dir);
        let err = installer
            .install(&manifest("foo"), &InstallOptions::default())
            .expect_err("Should fail");
        assert!(matches!(err, InstallError::NoMatchingPlatform { .. }));
        assert!(!installer.paths().install_root.exists());
        assert!(!installer.paths().bin_dir.exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[test]
    fn installed_version_reads_link_target() {
        let dir = temp_test_dir("version");
        let installer = installer(&dir);
        let paths = installer.paths();
        let exe = paths.version_dir("foo", "abc").join("bin/foo");
        fs::create_dir_all(exe.parent().expect("Should have parent")).expect("Should create");
        fs::write(&exe, b"bin").expect("Should write");
        fs::create_dir_all(&paths.bin_dir).expect("Should create");
        std::os::unix::fs::symlink(&exe, paths.link_path("foo", false)).expect("Should link");

        assert_eq!(
            installer.installed_version("foo").expect("Should read"),
            Some("abc".to_string())
        );
        assert_eq!(installer.installed_version("bar").expect("Should read"), None);

        let listed = installer.list_installed().expect("Should list");
        assert_eq!(listed.get("foo").map(String::as_str), Some("abc"));
        fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[test]
    fn relative_link_is_resolved_against_bin_dir() {
        let dir = temp_test_dir("relative");
        let installer = installer(&dir);
        let paths = installer.paths();
        fs::create_dir_all(paths.version_dir("foo", "HEAD")).expect("Should create");
        fs::create_dir_all(&paths.bin_dir).expect("Should create");
        std::os::unix::fs::symlink("../store/foo/HEAD/foo", paths.link_path("foo", false))
            .expect("Should link");

        assert_eq!(
            installer.installed_version("foo").expect("Should read"),
            Some("HEAD".to_string())
        );
        fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[test]
    fn bin_outside_version_dir_is_sandbox_violation() {
        let dir = temp_test_dir("contain");
        let installer = installer(&dir);
        let version_dir = dir.join("store/foo/abc");
        fs::create_dir_all(&version_dir).expect("Should create");
        fs::write(dir.join("outside"), b"x").expect("Should write");
        std::os::unix::fs::symlink(dir.join("outside"), version_dir.join("escape"))
            .expect("Should link");

        let err = installer
            .contained_bin(&version_dir, "escape")
            .expect_err("Should fail");
        assert!(matches!(err, InstallError::SandboxViolation { .. }));
        let err = installer
            .contained_bin(&version_dir, "missing")
            .expect_err("Should fail");
        assert!(matches!(err, InstallError::SandboxViolation { .. }));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn scratch_dir_is_removed_on_drop() {
        let dir = temp_test_dir("scratch");
        let path = dir.join("scratch");
        {
            let scratch = ScratchDir::create(path.clone()).expect("Should create");
            fs::write(scratch.path().join("file"), b"x").expect("Should write");
        }
        assert!(!path.exists());
        fs::remove_dir_all(&dir).ok();
    }
}
