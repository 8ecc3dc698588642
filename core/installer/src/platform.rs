//! Platform detection and platform descriptor selection.
//!
//! Platforms are described by two labels, `os` and `arch`, using the names
//! plugin manifests are written against (`linux`, `darwin`, `windows`;
//! `amd64`, `arm64`, `386`, ...). [`Platform::detect`] translates the values
//! of the running binary; callers that want to install for another platform
//! build a [`Platform`] explicitly.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::errors::{InstallError, Result};
use crate::manifest::PlatformDescriptor;

/// Operating system and architecture labels used for selector matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    /// Creates a platform from explicit labels.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Detects the platform of the running binary.
    #[must_use]
    pub fn detect() -> Self {
        Self::new(
            os_label(std::env::consts::OS),
            arch_label(std::env::consts::ARCH),
        )
    }

    /// Returns whether this platform is Windows.
    #[must_use = "returns platform check result without side effects"]
    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    /// Returns the label set matched against descriptor selectors.
    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("os".to_string(), self.os.clone()),
            ("arch".to_string(), self.arch.clone()),
        ])
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

fn os_label(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn arch_label(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64",
        other => other,
    }
}

/// Returns the first descriptor whose selector matches `platform`.
///
/// Descriptors without a selector never match; an empty selector matches
/// everything. A malformed selector met while scanning fails with
/// [`InstallError::InvalidManifest`]. No match is `Ok(None)`.
pub fn select_platform<'a>(
    name: &str,
    platforms: &'a [PlatformDescriptor],
    platform: &Platform,
) -> Result<Option<&'a PlatformDescriptor>> {
    let labels = platform.labels();
    for (index, descriptor) in platforms.iter().enumerate() {
        let Some(selector) = &descriptor.selector else {
            debug!(plugin = name, index, "platform descriptor has no selector");
            continue;
        };
        selector
            .validate()
            .map_err(|reason| InstallError::invalid_manifest(name, reason))?;
        if selector.matches(&labels) {
            debug!(plugin = name, index, %platform, "found matching platform");
            return Ok(Some(descriptor));
        }
    }
    Ok(None)
}
