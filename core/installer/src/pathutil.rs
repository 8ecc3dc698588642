//! Lexical path helpers used by the sandbox checks.
//!
//! All functions here work on path text only; none of them touch the
//! filesystem except [`absolute`], which consults the current directory for
//! relative inputs.

use std::path::{Component, Path, PathBuf};

use crate::errors::{InstallError, Result};

/// Returns the shortest lexically equivalent form of `path`.
///
/// `.` segments are dropped, `..` consumes the preceding normal segment, and
/// `..` directly under a root is discarded. An empty result becomes `.`.
#[must_use]
pub fn clean(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Returns whether `path` is written in clean form.
///
/// Trailing separators and a leading `./` count as unclean, matching the
/// textual comparison of `path` against its cleaned form.
#[must_use]
pub fn is_clean(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    let cleaned = clean(Path::new(&normalized));
    cleaned.to_string_lossy().replace('\\', "/") == normalized
}

/// Makes `path` absolute against the current directory and cleans it.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    let abs = std::path::absolute(path).map_err(|e| {
        InstallError::io(
            format!("could not get the absolute path for {}", path.display()),
            e,
        )
    })?;
    Ok(clean(&abs))
}

/// Checks whether `path` is inside `base` after lexical cleaning.
///
/// Returns the path segments of `path` relative to `base` when it is; `base`
/// itself yields an empty list. Both arguments must be either absolute or
/// relative to the same directory.
#[must_use]
pub fn sub_path(base: &Path, path: &Path) -> Option<Vec<String>> {
    let base = clean(base);
    let path = clean(path);
    let rest = path.strip_prefix(&base).ok()?;
    let mut segments = Vec::new();
    for component in rest.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(segments)
}

/// Returns whether `path` is `base` or lies below it.
#[must_use]
pub fn is_sub_path(base: &Path, path: &Path) -> bool {
    sub_path(base, path).is_some()
}

/// Rebases `path` from `old_base` onto `new_base`.
///
/// Returns `None` when `path` is not under `old_base`.
#[must_use]
pub fn replace_base(path: &Path, old_base: &Path, new_base: &Path) -> Option<PathBuf> {
    let segments = sub_path(old_base, path)?;
    let mut rebased = new_base.to_path_buf();
    rebased.extend(segments);
    Some(rebased)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_removes_redundant_segments() {
        assert_eq!(clean(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(clean(Path::new("./")), PathBuf::from("."));
        assert_eq!(clean(Path::new("")), PathBuf::from("."));
        assert_eq!(clean(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(clean(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[cfg(unix)]
    #[test]
    fn clean_drops_parent_of_root() {
        assert_eq!(clean(Path::new("/../etc")), PathBuf::from("/etc"));
        assert_eq!(clean(Path::new("/a/b/../../..")), PathBuf::from("/"));
    }

    #[test]
    fn is_clean_accepts_normal_forms() {
        assert!(is_clean("."));
        assert!(is_clean("bin"));
        assert!(is_clean("bin/plugin"));
        assert!(is_clean("../outside"));
    }

    #[test]
    fn is_clean_rejects_redundant_forms() {
        assert!(!is_clean("./bin"));
        assert!(!is_clean("bin/"));
        assert!(!is_clean("bin/../lib"));
        assert!(!is_clean("a//b"));
        assert!(!is_clean(""));
    }

    #[test]
    fn sub_path_returns_segments() {
        let got = sub_path(Path::new("install"), Path::new("install/foo/HEAD/hatch-foo"));
        assert_eq!(
            got,
            Some(vec![
                "foo".to_string(),
                "HEAD".to_string(),
                "hatch-foo".to_string()
            ])
        );
    }

    #[test]
    fn sub_path_of_base_is_empty() {
        assert_eq!(sub_path(Path::new("a/b"), Path::new("a/b/")), Some(Vec::new()));
    }

    #[test]
    fn sub_path_rejects_escapes() {
        assert!(!is_sub_path(Path::new("a/b"), Path::new("a/b/../c")));
        assert!(!is_sub_path(Path::new("a/b"), Path::new("a/bc")));
        assert!(!is_sub_path(Path::new("a/b"), Path::new("a")));
    }

    #[test]
    fn replace_base_rebases_path() {
        assert_eq!(
            replace_base(Path::new("from/x/y"), Path::new("from"), Path::new("to")),
            Some(PathBuf::from("to/x/y"))
        );
        assert_eq!(
            replace_base(Path::new("other/x"), Path::new("from"), Path::new("to")),
            None
        );
    }

    #[test]
    fn absolute_is_rooted_and_clean() {
        let abs = absolute(Path::new("a/../b")).expect("Should resolve");
        assert!(abs.is_absolute());
        assert!(abs.ends_with("b"));
    }
}
