//! Relocation of extracted files into the staging tree.
//!
//! File operations come from the manifest and are therefore untrusted. Every
//! move is planned and checked against both sandbox roots before any file of
//! that operation is touched.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::errors::{InstallError, Result};
use crate::manifest::{self, FileOperation};
use crate::pathutil;

/// A planned rename from the extraction tree to the staging tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Moves files between two sandbox roots.
#[derive(Debug)]
pub struct SandboxedMover {
    name: String,
    extraction_root: PathBuf,
    staging_root: PathBuf,
}

impl SandboxedMover {
    /// Creates a mover for plugin `name`. Both roots are made absolute.
    pub fn new(name: &str, extraction_root: &Path, staging_root: &Path) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            extraction_root: pathutil::absolute(extraction_root)?,
            staging_root: pathutil::absolute(staging_root)?,
        })
    }

    /// Applies `files` in order.
    ///
    /// All targets are checked for clean form before anything moves. A
    /// sandbox violation in one operation aborts it before any of its moves
    /// run; moves of earlier operations stay where they are.
    ///
    /// # Errors
    ///
    /// - [`InstallError::InvalidManifest`] for an unclean target or a bad glob
    /// - [`InstallError::NoGlobMatch`] when a pattern matches nothing
    /// - [`InstallError::SandboxViolation`] when a source or destination
    ///   leaves its root
    /// - [`InstallError::Io`] when a move fails
    pub fn relocate(&self, files: &[FileOperation]) -> Result<()> {
        manifest::validate_file_operations(&self.name, files)?;

        for op in files {
            let moves = self.plan(op)?;
            for m in &moves {
                self.validate(m)?;
            }
            debug!(from = %op.from, to = %op.target(), count = moves.len(), "moving files");
            for m in &moves {
                execute(m)?;
            }
        }
        Ok(())
    }

    /// Resolves `op` to concrete moves without touching the filesystem.
    fn plan(&self, op: &FileOperation) -> Result<Vec<Move>> {
        let to = op.target();
        let direct = self.extraction_root.join(&op.from);
        if direct.symlink_metadata().is_ok() {
            let dest = if to == "." {
                let base = pathutil::clean(&direct);
                self.staging_root.join(base.file_name().unwrap_or(base.as_os_str()))
            } else {
                self.staging_root.join(to)
            };
            return Ok(vec![Move {
                from: direct,
                to: dest,
            }]);
        }

        let pattern = format!(
            "{}/{}",
            glob::Pattern::escape(&self.extraction_root.to_string_lossy()),
            op.from
        );
        let paths = glob::glob(&pattern).map_err(|e| {
            InstallError::invalid_manifest(&self.name, format!("invalid glob {:?}: {e}", op.from))
        })?;

        let dest_dir = self.staging_root.join(to);
        let mut moves = Vec::new();
        for entry in paths {
            let from = entry.map_err(|e| {
                let path = e.path().display().to_string();
                InstallError::io(format!("failed to read glob match {path}"), e.into_error())
            })?;
            let Some(base) = from.file_name() else {
                continue;
            };
            let to = dest_dir.join(base);
            trace!(from = %from.display(), to = %to.display(), "glob match");
            moves.push(Move { from, to });
        }

        if moves.is_empty() {
            return Err(InstallError::NoGlobMatch {
                pattern: op.from.clone(),
            });
        }
        Ok(moves)
    }

    fn validate(&self, m: &Move) -> Result<()> {
        let from = pathutil::absolute(&m.from)?;
        if !pathutil::is_sub_path(&self.extraction_root, &from) {
            return Err(InstallError::sandbox(&m.from, &self.extraction_root));
        }
        let to = pathutil::absolute(&m.to)?;
        if !pathutil::is_sub_path(&self.staging_root, &to) {
            return Err(InstallError::sandbox(&m.to, &self.staging_root));
        }
        Ok(())
    }
}

fn execute(m: &Move) -> Result<()> {
    if let Some(parent) = m.to.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            InstallError::io(format!("failed to create directory {}", parent.display()), e)
        })?;
    }
    trace!(from = %m.from.display(), to = %m.to.display(), "move");
    fs::rename(&m.from, &m.to).map_err(|e| {
        InstallError::io(
            format!("could not rename {} to {}", m.from.display(), m.to.display()),
            e,
        )
    })
}
