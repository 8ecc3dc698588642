//! Install command for the hatch CLI.
//!
//! ## Usage
//!
//! ```bash
//! hatch install foo.yaml                         # pinned version
//! hatch install foo.yaml --head                  # mutable channel
//! hatch install foo.yaml --archive ./foo.tar.gz  # local archive
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use hatch_installer::InstallOptions;

use crate::config::Config;

/// Arguments for the install command.
#[derive(Args)]
pub struct InstallArgs {
    /// Path to the plugin manifest (YAML).
    pub manifest: PathBuf,

    /// Install the mutable HEAD channel instead of the pinned version.
    #[arg(long)]
    pub head: bool,

    /// Read the archive from this file instead of downloading it.
    #[arg(long, value_name = "PATH")]
    pub archive: Option<PathBuf>,
}

/// Executes the install command.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read or the install fails.
pub fn execute(args: &InstallArgs) -> Result<()> {
    let config = Config::from_env()?;
    let manifest = super::load_manifest(&args.manifest)?;
    let options = InstallOptions {
        force_head: args.head,
        archive_override: args.archive.clone(),
    };

    println!("Installing plugin: {}", manifest.name);
    let resolved = config.installer().install(&manifest, &options)?;
    println!("Installed plugin {} ({})", manifest.name, resolved.version);
    Ok(())
}
