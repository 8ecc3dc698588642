//! Error types for the hatch installer.
//!
//! Every failure in the install, upgrade and removal pipelines is reported as an
//! [`InstallError`]. Nothing is retried; each variant carries the path, plugin
//! name or digest needed to act on it.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error used for sources coming from the transport or archive crates.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, InstallError>;

/// Errors produced by the plugin installation pipeline.
#[derive(Debug, Error)]
#[must_use = "errors must not be silently ignored"]
pub enum InstallError {
    /// A version of the plugin is already linked.
    #[error("can't install {name}: version {version} is already installed")]
    AlreadyInstalled { name: String, version: String },

    /// The plugin has no active link.
    #[error("plugin {name} is not installed")]
    NotInstalled { name: String },

    /// The resolved version is the one already installed.
    #[error("can't upgrade {name}: the newest version ({version}) is already installed")]
    AlreadyUpgraded { name: String, version: String },

    /// The plugin name could be used to escape the install tree.
    #[error("the plugin name {name:?} is not allowed")]
    UnsafeName { name: String },

    /// The manager refuses to remove its own plugin.
    #[error("removing {name} is not allowed through {name} itself")]
    SelfRemoval { name: String },

    /// The manifest is structurally invalid (selector, file operation or bin path).
    #[error("invalid manifest for {name}: {reason}")]
    InvalidManifest { name: String, reason: String },

    /// No platform descriptor matched the running OS/architecture.
    #[error("plugin {name} does not support platform {os}/{arch}")]
    NoMatchingPlatform {
        name: String,
        os: String,
        arch: String,
    },

    /// The requested channel cannot be resolved.
    #[error("could not choose a version to download: {message}")]
    VersionResolution { message: String },

    /// The download URI does not end in a supported archive suffix.
    #[error("cannot infer a supported archive type from the url {uri:?}")]
    UnsupportedArchiveType { uri: String },

    /// Fetching the archive failed (network, HTTP status or local file open).
    #[error("download failure for {locator}: {message}")]
    Fetch {
        locator: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The downloaded bytes do not match the pinned checksum.
    #[error("checksum does not match, want: {expected}, got: {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// The archive could not be unpacked.
    #[error("extract failure: {message}")]
    Extract {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A tar entry type the extractor does not handle.
    #[error("unable to handle file type {entry_type} for {entry:?} in tar")]
    UnsupportedEntryType { entry: String, entry_type: String },

    /// A glob from the manifest matched nothing in the extracted archive.
    #[error("no files in the plugin archive matched the glob pattern={pattern}")]
    NoGlobMatch { pattern: String },

    /// A computed path resolves outside its sandbox root.
    #[error("path {} is not within {}", path.display(), root.display())]
    SandboxViolation { path: PathBuf, root: PathBuf },

    /// Promoting the staging directory to the install directory failed.
    #[error("could not move {} to {}: {source}", from.display(), to.display())]
    Activation {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Creating, replacing or removing the plugin link failed.
    #[error("cannot link plugin at {}: {message}", path.display())]
    Link {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Any other filesystem operation failed.
    #[error("{message}: {source}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl InstallError {
    /// Creates a new `Io` error with context.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Creates a new `Fetch` error.
    pub fn fetch(
        locator: impl Into<String>,
        message: impl Into<String>,
        source: Option<BoxError>,
    ) -> Self {
        Self::Fetch {
            locator: locator.into(),
            message: message.into(),
            source,
        }
    }

    /// Creates a new `Extract` error.
    pub fn extract(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::Extract {
            message: message.into(),
            source,
        }
    }

    /// Creates a new `InvalidManifest` error.
    pub fn invalid_manifest(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidManifest {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `Link` error.
    pub fn link(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Link {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `Link` error caused by an I/O failure.
    pub fn link_io(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Link {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new `SandboxViolation` error.
    pub fn sandbox(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self::SandboxViolation {
            path: path.into(),
            root: root.into(),
        }
    }

    /// Returns whether this error reports that there was nothing to do.
    ///
    /// Callers treat these as informational rather than as failures.
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        matches!(
            self,
            Self::AlreadyInstalled { .. } | Self::AlreadyUpgraded { .. }
        )
    }
}
