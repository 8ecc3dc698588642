//! Runtime configuration read from the environment.

use std::path::PathBuf;

use anyhow::{Context, Result};
use hatch_installer::{InstallPaths, Installer, Platform};
use tracing::debug;

/// Overrides the installation root.
pub const HATCH_ROOT_ENV: &str = "HATCH_ROOT";
/// Overrides the detected operating system label.
pub const HATCH_OS_ENV: &str = "HATCH_OS";
/// Overrides the detected architecture label.
pub const HATCH_ARCH_ENV: &str = "HATCH_ARCH";

/// Resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub platform: Platform,
}

impl Config {
    /// Builds the configuration from `HATCH_ROOT`, `HATCH_OS` and `HATCH_ARCH`.
    ///
    /// The root defaults to `~/.hatch`, or `%APPDATA%\hatch` on Windows.
    ///
    /// # Errors
    ///
    /// Returns an error if no root is set and the home directory is unknown.
    pub fn from_env() -> Result<Self> {
        let root = match non_empty_var(HATCH_ROOT_ENV) {
            Some(root) => PathBuf::from(root),
            None => default_root()?,
        };
        let root = std::path::absolute(&root)
            .with_context(|| format!("Cannot resolve installation root {}", root.display()))?;

        let detected = Platform::detect();
        let platform = Platform::new(
            non_empty_var(HATCH_OS_ENV).unwrap_or(detected.os),
            non_empty_var(HATCH_ARCH_ENV).unwrap_or(detected.arch),
        );
        debug!(root = %root.display(), %platform, "resolved configuration");
        Ok(Self { root, platform })
    }

    pub fn paths(&self) -> InstallPaths {
        InstallPaths::with_root(&self.root)
    }

    pub fn installer(&self) -> Installer {
        Installer::new(self.paths(), self.platform.clone())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn default_root() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        Ok(dirs::data_dir()
            .context("Cannot determine AppData directory. Set HATCH_ROOT environment variable.")?
            .join("hatch"))
    }
    #[cfg(not(windows))]
    {
        Ok(dirs::home_dir()
            .context("Cannot determine home directory. Set HATCH_ROOT environment variable.")?
            .join(".hatch"))
    }
}
