#![warn(clippy::pedantic)]

//! # hatch
//!
//! Command line front end for the hatch plugin installer. It resolves the
//! installation layout from the environment, reads plugin manifests and hands
//! them to `hatch-installer`.
//!
//! ## Subcommands
//!
//! - `install` - Install a plugin from a manifest file
//! - `upgrade` - Upgrade an installed plugin from a manifest file
//! - `remove` - Remove an installed plugin
//! - `list` - List installed plugins
//!
//! ## Examples
//!
//! ```bash
//! hatch install ./foo.yaml
//! hatch install ./foo.yaml --head
//! hatch upgrade ./foo.yaml
//! hatch remove foo
//! ```

mod commands;
mod config;

use std::io::IsTerminal;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{install, list, remove, upgrade};
use hatch_installer::InstallError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "HATCH_LOG";

/// Plugin installer.
#[derive(Parser)]
#[command(
    name = "hatch",
    author,
    version,
    about = "Install, upgrade and remove hatch plugins",
    after_help = "\
ENVIRONMENT VARIABLES:
    HATCH_ROOT      Installation root (default: ~/.hatch)
    HATCH_OS        Override the detected operating system label
    HATCH_ARCH      Override the detected architecture label
    HATCH_LOG       Log filter, e.g. 'hatch_installer=debug'"
)]
pub struct Cli {
    /// Increase log verbosity (-v for info, -vv for debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Install a plugin from a manifest file.
    Install(install::InstallArgs),

    /// Upgrade an installed plugin to the version in a manifest file.
    Upgrade(upgrade::UpgradeArgs),

    /// Remove an installed plugin.
    Remove(remove::RemoveArgs),

    /// List installed plugins and their versions.
    List,
}

fn main() {
    if let Err(e) = run() {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Reports an error and returns the exit code.
///
/// Errors that only say there was nothing to do are printed as information
/// and exit successfully.
fn handle_error(e: &anyhow::Error) -> i32 {
    if let Some(install_error) = e.downcast_ref::<InstallError>()
        && install_error.is_up_to_date()
    {
        println!("{install_error}");
        return 0;
    }
    eprintln!("Error: {e:#}");
    1
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Install(args) => install::execute(&args),
        Commands::Upgrade(args) => upgrade::execute(&args),
        Commands::Remove(args) => remove::execute(&args),
        Commands::List => list::execute(),
    }
}

fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "hatch=warn,hatch_installer=warn",
        1 => "hatch=info,hatch_installer=info",
        _ => "hatch=debug,hatch_installer=debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr),
        )
        .init();
}
