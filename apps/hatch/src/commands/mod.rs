//! Command modules for the hatch CLI.
//!
//! - [`install`] - Install a plugin from a manifest file
//! - [`upgrade`] - Upgrade an installed plugin
//! - [`remove`] - Remove an installed plugin
//! - [`list`] - List installed plugins

pub mod install;
pub mod list;
pub mod remove;
pub mod upgrade;

use std::path::Path;

use anyhow::{Context, Result};
use hatch_installer::PluginManifest;
use tracing::debug;

/// Reads a YAML plugin manifest from `path`.
pub(crate) fn load_manifest(path: &Path) -> Result<PluginManifest> {
    debug!(manifest = %path.display(), "loading manifest");
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    let manifest: PluginManifest = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;
    debug!(plugin = %manifest.name, platforms = manifest.platforms.len(), "loaded manifest");
    Ok(manifest)
}
