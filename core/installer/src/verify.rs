//! Checksum verification for downloaded plugin archives.
//!
//! A checker is written to while the archive body is read, so verification
//! needs no second pass over the data.

use std::io::{self, Write};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::{InstallError, Result};

/// A write sink that confirms the bytes written to it.
pub trait IntegrityChecker: Write {
    /// Checks everything written so far.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::ChecksumMismatch`] when the data does not match.
    fn verify(&self) -> Result<()>;
}

/// Verifies data against a pinned SHA-256 digest.
pub struct Sha256Checker {
    hasher: Sha256,
    expected_hex: String,
    /// `None` when the expected digest could not be decoded; nothing matches it.
    expected: Option<Vec<u8>>,
}

impl Sha256Checker {
    /// Creates a checker for the hex encoded digest `expected`.
    ///
    /// A malformed digest does not fail here; the checker then rejects any data.
    #[must_use]
    pub fn new(expected: &str) -> Self {
        let decoded = hex::decode(expected).ok();
        if decoded.is_none() {
            debug!(expected, "could not decode the expected sha256");
        }
        Self {
            hasher: Sha256::new(),
            expected_hex: expected.to_string(),
            expected: decoded,
        }
    }
}

impl Write for Sha256Checker {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl IntegrityChecker for Sha256Checker {
    fn verify(&self) -> Result<()> {
        let actual = self.hasher.clone().finalize();
        match &self.expected {
            Some(expected) if expected.as_slice() == actual.as_slice() => Ok(()),
            _ => Err(InstallError::ChecksumMismatch {
                expected: self.expected_hex.clone(),
                actual: hex::encode(actual),
            }),
        }
    }
}

/// Accepts any data. Used for the mutable channel, which has no pinned digest.
#[derive(Debug, Default)]
pub struct NoopChecker;

impl Write for NoopChecker {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl IntegrityChecker for NoopChecker {
    fn verify(&self) -> Result<()> {
        Ok(())
    }
}

/// Returns the lowercase hex SHA-256 of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
