//! List command for the hatch CLI.
//!
//! ## Output Format
//!
//! ```text
//! PLUGIN   VERSION
//! foo      2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824
//! bar      HEAD
//! ```

use anyhow::Result;

use crate::config::Config;

/// Executes the list command.
///
/// # Errors
///
/// Returns an error if the install root cannot be read.
pub fn execute() -> Result<()> {
    let config = Config::from_env()?;
    let installed = config.installer().list_installed()?;

    if installed.is_empty() {
        println!("No plugins installed.");
        return Ok(());
    }

    let width = installed.keys().map(String::len).max().unwrap_or(0).max(6);
    println!("{:<width$}   VERSION", "PLUGIN");
    for (name, version) in &installed {
        println!("{name:<width$}   {version}");
    }
    Ok(())
}
