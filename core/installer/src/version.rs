//! Channel and version resolution for a platform descriptor.

use crate::errors::{InstallError, Result};
use crate::manifest::PlatformDescriptor;

/// Version identifier of the mutable channel.
pub const HEAD_VERSION: &str = "HEAD";

/// Name the previous `HEAD` directory is parked under during a `HEAD` upgrade.
pub const HEAD_OLD_VERSION: &str = "HEAD-OLD";

/// Version identifier and the URI it is downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub version: String,
    pub uri: String,
}

impl ResolvedVersion {
    /// Returns whether this is the mutable channel.
    #[must_use]
    pub fn is_head(&self) -> bool {
        self.version == HEAD_VERSION
    }
}

/// Chooses the channel to download.
///
/// The mutable channel is used when it is requested, or when the descriptor
/// only offers a `head` URI. Otherwise the immutable channel is used and the
/// version is the lowercased checksum.
///
/// # Errors
///
/// Returns [`InstallError::VersionResolution`] if `force_head` is set and the
/// descriptor has no `head`, or if it has neither `head` nor a `uri` with a
/// `sha256`.
///
/// # Example
///
/// ```
/// use hatch_installer::PlatformDescriptor;
/// use hatch_installer::version::resolve;
///
/// let descriptor = PlatformDescriptor {
///     uri: "https://example.com/foo.tar.gz".to_string(),
///     sha256: "ABC123".to_string(),
///     ..PlatformDescriptor::default()
/// };
/// let resolved = resolve(&descriptor, false).unwrap();
/// assert_eq!(resolved.version, "abc123");
/// ```
pub fn resolve(platform: &PlatformDescriptor, force_head: bool) -> Result<ResolvedVersion> {
    let has_head = !platform.head.is_empty();
    let head_only = platform.uri.is_empty() && platform.sha256.is_empty();

    if has_head && (force_head || head_only) {
        return Ok(ResolvedVersion {
            version: HEAD_VERSION.to_string(),
            uri: platform.head.clone(),
        });
    }
    if force_head {
        return Err(InstallError::VersionResolution {
            message: "the plugin does not have a HEAD version".to_string(),
        });
    }
    if platform.uri.is_empty() || platform.sha256.is_empty() {
        return Err(InstallError::VersionResolution {
            message: "the plugin has neither a HEAD uri nor a uri with a sha256".to_string(),
        });
    }
    Ok(ResolvedVersion {
        version: platform.sha256.to_lowercase(),
        uri: platform.uri.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(head: &str, uri: &str, sha256: &str) -> PlatformDescriptor {
        PlatformDescriptor {
            head: head.to_string(),
            uri: uri.to_string(),
            sha256: sha256.to_string(),
            bin: "foo".to_string(),
            ..PlatformDescriptor::default()
        }
    }

    fn resolved(version: &str, uri: &str) -> ResolvedVersion {
        ResolvedVersion {
            version: version.to_string(),
            uri: uri.to_string(),
        }
    }

    #[test]
    fn head_only_descriptor_uses_head() {
        let got = resolve(&descriptor("H", "", ""), false).expect("Should resolve");
        assert_eq!(got, resolved("HEAD", "H"));
        assert!(got.is_head());
    }

    #[test]
    fn pinned_descriptor_uses_lowercased_checksum() {
        let got = resolve(&descriptor("H", "U", "D"), false).expect("Should resolve");
        assert_eq!(got, resolved("d", "U"));
        assert!(!got.is_head());
    }

    #[test]
    fn force_head_prefers_head() {
        let got = resolve(&descriptor("H", "U", "D"), true).expect("Should resolve");
        assert_eq!(got, resolved("HEAD", "H"));
    }

    #[test]
    fn force_head_without_head_fails() {
        let err = resolve(&descriptor("", "U", "D"), true).expect_err("Should fail");
        assert!(matches!(err, InstallError::VersionResolution { .. }));
    }

    #[test]
    fn empty_descriptor_fails() {
        let err = resolve(&descriptor("", "", ""), false).expect_err("Should fail");
        assert!(matches!(err, InstallError::VersionResolution { .. }));
    }
}
