//! Plugin manifest types.
//!
//! A manifest names a plugin and lists one [`PlatformDescriptor`] per supported
//! OS/architecture combination. Manifests come from a community index, so
//! every path-like field is validated before it is used against the
//! filesystem.
//!
//! ## Manifest Format
//!
//! ```yaml
//! name: foo
//! platforms:
//!   - selector:
//!       matchLabels:
//!         os: linux
//!       matchExpressions:
//!         - key: arch
//!           operator: In
//!           values: [amd64, arm64]
//!     head: https://example.com/foo/archive/master.zip
//!     uri: https://example.com/foo/releases/v1.0.0/foo.tar.gz
//!     sha256: 4a8d2e...
//!     bin: bin/foo
//!     files:
//!       - from: foo-*/bin/*
//!         to: bin
//! ```

use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::errors::{InstallError, Result};
use crate::pathutil;

/// A plugin manifest as supplied by the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin name; also the name of its install directory.
    pub name: String,
    /// Platform-specific download descriptors, matched in order.
    #[serde(default)]
    pub platforms: Vec<PlatformDescriptor>,
}

/// Download and layout description for one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    /// Label selector matched against `{os, arch}`. `None` matches nothing.
    #[serde(default)]
    pub selector: Option<LabelSelector>,
    /// Mutable-channel download URI.
    #[serde(default)]
    pub head: String,
    /// Immutable-channel download URI.
    #[serde(default)]
    pub uri: String,
    /// Expected SHA-256 of the immutable-channel archive, hex encoded.
    #[serde(default)]
    pub sha256: String,
    /// Executable path relative to the installed version directory.
    pub bin: String,
    /// File operations applied from the extracted archive to the staging tree.
    #[serde(default)]
    pub files: Vec<FileOperation>,
}

/// Moves files matching `from` (relative to the extraction root) to `to`
/// (relative to the staging root).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOperation {
    pub from: String,
    #[serde(default)]
    pub to: String,
}

impl FileOperation {
    /// Returns the target with an empty value read as the current directory.
    #[must_use]
    pub fn target(&self) -> &str {
        if self.to.is_empty() { "." } else { &self.to }
    }
}

/// A set-based label selector.
///
/// All `match_labels` entries and all `match_expressions` must hold for the
/// selector to match. An empty selector matches every label set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

/// One expression of a [`LabelSelector`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Operators supported in selector expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl LabelSelector {
    /// Checks the selector is well formed.
    ///
    /// `In`/`NotIn` need at least one value, `Exists`/`DoesNotExist` take none.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for req in &self.match_expressions {
            if req.key.is_empty() {
                return Err("selector expression has an empty key".to_string());
            }
            match req.operator {
                SelectorOperator::In | SelectorOperator::NotIn if req.values.is_empty() => {
                    return Err(format!(
                        "operator {:?} on key {:?} requires at least one value",
                        req.operator, req.key
                    ));
                }
                SelectorOperator::Exists | SelectorOperator::DoesNotExist
                    if !req.values.is_empty() =>
                {
                    return Err(format!(
                        "operator {:?} on key {:?} takes no values",
                        req.operator, req.key
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns whether the selector matches `labels`.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let labels_ok = self
            .match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value));
        labels_ok && self.match_expressions.iter().all(|req| req.matches(labels))
    }
}

impl LabelSelectorRequirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            SelectorOperator::In => value.is_some_and(|v| self.values.contains(v)),
            SelectorOperator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
            SelectorOperator::Exists => value.is_some(),
            SelectorOperator::DoesNotExist => value.is_none(),
        }
    }
}

/// Returns whether `name` can be used as a single path segment.
///
/// Rejects empty names, names with `/` or `\`, names starting with a dot
/// (which covers `.` and `..`) and names containing a drive/prefix marker.
#[must_use]
pub fn is_safe_plugin_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\', ':']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Fails with [`InstallError::UnsafeName`] when `name` is not a safe segment.
pub fn ensure_safe_name(name: &str) -> Result<()> {
    if is_safe_plugin_name(name) {
        Ok(())
    } else {
        Err(InstallError::UnsafeName {
            name: name.to_string(),
        })
    }
}

impl PlatformDescriptor {
    /// Validates the path-like fields of this descriptor for plugin `name`.
    ///
    /// Runs before anything is downloaded or written, so a malformed manifest
    /// is rejected without touching the filesystem.
    pub fn validate(&self, name: &str) -> Result<()> {
        if let Some(selector) = &self.selector {
            selector
                .validate()
                .map_err(|reason| InstallError::invalid_manifest(name, reason))?;
        }
        validate_file_operations(name, &self.files)?;
        validate_bin(name, &self.bin)
    }
}

/// Checks every `to` is in clean form and every `from` is non-empty.
pub fn validate_file_operations(name: &str, files: &[FileOperation]) -> Result<()> {
    for op in files {
        if op.from.is_empty() {
            return Err(InstallError::invalid_manifest(
                name,
                "file operation has an empty \"from\"",
            ));
        }
        let to = op.target();
        if !pathutil::is_clean(to) {
            return Err(InstallError::invalid_manifest(
                name,
                format!(
                    "the provided path is not clean, {to:?} should be {:?}",
                    pathutil::clean(Path::new(to)).display().to_string()
                ),
            ));
        }
    }
    Ok(())
}

fn validate_bin(name: &str, bin: &str) -> Result<()> {
    if bin.is_empty() {
        return Err(InstallError::invalid_manifest(name, "\"bin\" is empty"));
    }
    let path = Path::new(bin);
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(InstallError::invalid_manifest(
            name,
            format!("\"bin\" path {bin:?} must stay within the installation directory"),
        ));
    }
    Ok(())
}
