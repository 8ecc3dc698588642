//! Plugin installation pipeline for hatch.
//!
//! Given a [`PluginManifest`], the [`Installer`] fetches the archive for the
//! running platform, verifies it, extracts it, relocates the declared files
//! into a sandboxed staging tree and activates the result as a versioned
//! directory behind a single link in the bin directory.
//!
//! ```no_run
//! use std::path::Path;
//! use hatch_installer::{InstallOptions, InstallPaths, Installer, Platform, PluginManifest};
//!
//! # fn run(manifest: PluginManifest) -> hatch_installer::Result<()> {
//! let installer = Installer::new(
//!     InstallPaths::with_root(Path::new("/home/me/.hatch")),
//!     Platform::detect(),
//! );
//! let resolved = installer.install(&manifest, &InstallOptions::default())?;
//! println!("installed {} at {}", manifest.name, resolved.version);
//! # Ok(())
//! # }
//! ```

pub mod activate;
pub mod archive;
pub mod errors;
pub mod install;
pub mod link;
pub mod lock;
pub mod manifest;
pub mod mover;
pub mod pathutil;
pub mod paths;
pub mod platform;
pub mod source;
pub mod verify;
pub mod version;

pub use errors::{InstallError, Result};
pub use install::{InstallOptions, InstallStage, Installer, SELF_PLUGIN_NAME};
pub use manifest::{
    FileOperation, LabelSelector, LabelSelectorRequirement, PlatformDescriptor, PluginManifest,
    SelectorOperator, is_safe_plugin_name,
};
pub use paths::{InstallPaths, plugin_name_to_bin};
pub use platform::Platform;
pub use version::{HEAD_VERSION, ResolvedVersion};
