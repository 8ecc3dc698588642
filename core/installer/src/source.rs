//! Content sources for plugin archives.
//!
//! A [`ContentSource`] yields the raw archive bytes for a resolved URI. The
//! network variant issues a single blocking GET; the file variant opens a
//! local path. Neither retries.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::{InstallError, Result};
use crate::verify::IntegrityChecker;

/// Something that can produce the bytes of an archive.
pub trait ContentSource {
    /// Opens the content for reading.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Fetch`] when the content cannot be opened.
    fn fetch(&self) -> Result<Box<dyn Read>>;

    /// Human readable location, used in logs and errors.
    fn locator(&self) -> String;
}

/// Downloads content over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl ContentSource for HttpSource {
    fn fetch(&self) -> Result<Box<dyn Read>> {
        info!(url = %self.url, "Downloading plugin archive");
        let response = reqwest::blocking::get(&self.url).map_err(|e| {
            InstallError::fetch(&self.url, "request failed", Some(Box::new(e)))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(InstallError::fetch(
                &self.url,
                format!("unexpected HTTP status {status}"),
                None,
            ));
        }
        debug!(url = %self.url, %status, "download started");
        Ok(Box::new(response))
    }

    fn locator(&self) -> String {
        self.url.clone()
    }
}

/// Reads content from a local file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ContentSource for FileSource {
    fn fetch(&self) -> Result<Box<dyn Read>> {
        info!(path = %self.path.display(), "Reading plugin archive from file");
        let file = File::open(&self.path).map_err(|e| {
            InstallError::fetch(
                self.path.display().to_string(),
                "could not open file",
                Some(Box::new(e)),
            )
        })?;
        Ok(Box::new(file))
    }

    fn locator(&self) -> String {
        self.path.display().to_string()
    }
}

/// Picks the source for `uri`.
///
/// An override path always wins. `http://` and `https://` URIs are fetched
/// over the network; `file://` URIs and plain paths are read from disk.
#[must_use]
pub fn source_for(uri: &str, archive_override: Option<&Path>) -> Box<dyn ContentSource> {
    if let Some(path) = archive_override {
        return Box::new(FileSource::new(path));
    }
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return Box::new(HttpSource::new(uri));
    }
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    Box::new(FileSource::new(path))
}

/// Copies everything read from `reader` into `writer` as it passes through.
pub struct TeeReader<R, W> {
    reader: R,
    writer: W,
}

impl<R: Read, W: Write> TeeReader<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<R: Read, W: Write> Read for TeeReader<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.writer.write_all(&buf[..n])?;
        Ok(n)
    }
}

/// Reads the whole content of `source` into memory, copying it into `sink`.
pub fn read_through(source: &dyn ContentSource, sink: &mut dyn Write) -> Result<Vec<u8>> {
    let body = source.fetch()?;
    let mut data = Vec::new();
    TeeReader::new(body, sink).read_to_end(&mut data).map_err(|e| {
        InstallError::fetch(source.locator(), "could not read content", Some(Box::new(e)))
    })?;
    debug!(locator = %source.locator(), bytes = data.len(), "content read");
    Ok(data)
}

/// Reads the whole content of `source` and verifies it.
///
/// The bytes are returned only when `checker` accepts them.
pub fn read_verified(
    source: &dyn ContentSource,
    checker: &mut dyn IntegrityChecker,
) -> Result<Vec<u8>> {
    let data = read_through(source, &mut *checker)?;
    checker.verify()?;
    Ok(data)
}
