//! Upgrade command for the hatch CLI.
//!
//! ## Usage
//!
//! ```bash
//! hatch upgrade foo.yaml
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use hatch_installer::InstallOptions;

use crate::config::Config;

/// Arguments for the upgrade command.
#[derive(Args)]
pub struct UpgradeArgs {
    /// Path to the plugin manifest (YAML).
    pub manifest: PathBuf,

    /// Read the archive from this file instead of downloading it.
    #[arg(long, value_name = "PATH")]
    pub archive: Option<PathBuf>,
}

/// Executes the upgrade command.
///
/// # Errors
///
/// Returns an error if the plugin is not installed or the upgrade fails.
pub fn execute(args: &UpgradeArgs) -> Result<()> {
    let config = Config::from_env()?;
    let manifest = super::load_manifest(&args.manifest)?;
    let options = InstallOptions {
        force_head: false,
        archive_override: args.archive.clone(),
    };

    println!("Upgrading plugin: {}", manifest.name);
    let resolved = config.installer().upgrade(&manifest, &options)?;
    println!("Upgraded plugin {} ({})", manifest.name, resolved.version);
    Ok(())
}
