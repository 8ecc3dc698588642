//! Remove command for the hatch CLI.
//!
//! ```bash
//! hatch remove foo
//! ```

use anyhow::Result;
use clap::Args;

use crate::config::Config;

/// Arguments for the remove command.
#[derive(Args)]
pub struct RemoveArgs {
    /// Name of the installed plugin.
    pub name: String,
}

/// Executes the remove command.
///
/// # Errors
///
/// Returns an error if the plugin is not installed or cannot be removed.
pub fn execute(args: &RemoveArgs) -> Result<()> {
    let config = Config::from_env()?;
    config.installer().remove(&args.name)?;
    println!("Removed plugin {}", args.name);
    Ok(())
}
