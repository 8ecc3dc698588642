//! Archive extraction for plugin downloads.
//!
//! Plugins ship as ZIP or tar.gz archives. The archive kind is inferred from
//! the suffix of the resolved URI; extraction works on the in-memory body that
//! has already passed checksum verification.
//!
//! Entry names are joined to the destination after normalizing separators.
//! Absolute names and names with `..` segments are refused.

use std::fs::{self, OpenOptions};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use tracing::{debug, trace, warn};

use crate::errors::{InstallError, Result};

/// Name some tar writers give to a pax global extension header.
const PAX_GLOBAL_HEADER: &str = "pax_global_header";

/// Unpacks an archive held in memory into a directory.
pub trait ArchiveExtractor {
    /// Extracts `data` below `dest`.
    ///
    /// On failure, entries extracted so far are left on disk.
    fn extract(&self, dest: &Path, data: &[u8]) -> Result<()>;
}

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    /// Infers the archive kind from the suffix of `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::UnsupportedArchiveType`] unless `uri` ends in
    /// `.zip` or `.tar.gz`.
    ///
    /// # Example
    ///
    /// ```
    /// use hatch_installer::archive::ArchiveKind;
    ///
    /// assert_eq!(ArchiveKind::from_uri("foo.tar.gz").unwrap(), ArchiveKind::TarGz);
    /// assert!(ArchiveKind::from_uri("foo.rar").is_err());
    /// ```
    pub fn from_uri(uri: &str) -> Result<Self> {
        if uri.ends_with(".zip") {
            Ok(Self::Zip)
        } else if uri.ends_with(".tar.gz") {
            Ok(Self::TarGz)
        } else {
            Err(InstallError::UnsupportedArchiveType {
                uri: uri.to_string(),
            })
        }
    }

    /// Returns the extractor for this kind.
    #[must_use]
    pub fn extractor(self) -> Box<dyn ArchiveExtractor> {
        match self {
            Self::Zip => Box::new(ZipExtractor),
            Self::TarGz => Box::new(TarGzExtractor),
        }
    }
}

/// Extracts ZIP archives.
#[derive(Debug, Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, dest: &Path, data: &[u8]) -> Result<()> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))
            .map_err(|e| InstallError::extract("failed to read zip archive", Some(Box::new(e))))?;
        debug!(entries = archive.len(), dest = %dest.display(), "extracting zip archive");

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| {
                InstallError::extract(format!("failed to read zip entry {i}"), Some(Box::new(e)))
            })?;
            let name = entry.name().to_string();
            let path = entry_destination(dest, &name)?;
            let mode = entry.unix_mode();

            if entry.is_dir() {
                trace!(entry = %name, "zip directory");
                create_dir(&path, mode)?;
            } else if entry.is_file() && !entry.is_symlink() {
                trace!(entry = %name, "zip file");
                write_file(&path, mode, &mut entry)?;
            } else {
                warn!(entry = %name, "skipping zip entry that is neither a file nor a directory");
            }
        }
        Ok(())
    }
}

/// Extracts gzip-compressed tar archives.
#[derive(Debug, Default)]
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn extract(&self, dest: &Path, data: &[u8]) -> Result<()> {
        let mut archive = Archive::new(GzDecoder::new(data));
        debug!(dest = %dest.display(), "extracting tar.gz archive");

        let entries = archive
            .entries()
            .map_err(|e| InstallError::extract("failed to read tar entries", Some(Box::new(e))))?;

        for entry in entries {
            let mut entry = entry
                .map_err(|e| InstallError::extract("failed to read tar entry", Some(Box::new(e))))?;
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let entry_type = entry.header().entry_type();

            if name == PAX_GLOBAL_HEADER || entry_type == EntryType::XGlobalHeader {
                trace!(entry = %name, "skipping pax global header");
                continue;
            }

            let path = entry_destination(dest, &name)?;
            let mode = entry.header().mode().ok();
            match entry_type {
                EntryType::Directory => {
                    trace!(entry = %name, "tar directory");
                    create_dir(&path, mode)?;
                }
                EntryType::Regular => {
                    trace!(entry = %name, "tar file");
                    write_file(&path, mode, &mut entry)?;
                }
                other => {
                    return Err(InstallError::UnsupportedEntryType {
                        entry: name,
                        entry_type: format!("{other:?}"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Joins an archive entry name to `dest`, refusing names that could escape it.
fn entry_destination(dest: &Path, name: &str) -> Result<PathBuf> {
    let normalized = name.replace('\\', "/");
    let has_drive = normalized.as_bytes().get(1) == Some(&b':');
    if normalized.starts_with('/') || has_drive {
        return Err(InstallError::extract(
            format!("refusing to extract absolute path {name:?}"),
            None,
        ));
    }

    let mut path = dest.to_path_buf();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(InstallError::extract(
                    format!("refusing to extract path with parent directory reference {name:?}"),
                    None,
                ));
            }
            other => path.push(other),
        }
    }
    Ok(path)
}

fn create_dir(path: &Path, mode: Option<u32>) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    set_dir_mode(&mut builder, mode);
    builder.create(path).map_err(|e| {
        InstallError::io(format!("failed to create directory {}", path.display()), e)
    })
}

/// Creates (or truncates) `path` and copies `content` into it.
///
/// The file handle is closed when this returns.
fn write_file(path: &Path, mode: Option<u32>, content: &mut impl io::Read) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            InstallError::io(format!("failed to create directory {}", parent.display()), e)
        })?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    set_file_mode(&mut options, mode);

    let mut file = options
        .open(path)
        .map_err(|e| InstallError::io(format!("failed to create file {}", path.display()), e))?;
    io::copy(content, &mut file)
        .map_err(|e| InstallError::io(format!("failed to extract {}", path.display()), e))?;
    Ok(())
}

#[cfg(unix)]
fn set_dir_mode(builder: &mut fs::DirBuilder, mode: Option<u32>) {
    use std::os::unix::fs::DirBuilderExt;
    if let Some(mode) = mode {
        builder.mode(mode & 0o7777);
    }
}

#[cfg(not(unix))]
fn set_dir_mode(_builder: &mut fs::DirBuilder, _mode: Option<u32>) {}

#[cfg(unix)]
fn set_file_mode(options: &mut OpenOptions, mode: Option<u32>) {
    use std::os::unix::fs::OpenOptionsExt;
    if let Some(mode) = mode {
        options.mode(mode & 0o7777);
    }
}

#[cfg(not(unix))]
fn set_file_mode(_options: &mut OpenOptions, _mode: Option<u32>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn temp_test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "hatch-archive-test-{}-{}",
            name,
            rand::random::<u64>()
        ));
        fs::create_dir_all(&dir).expect("Should create temp dir");
        dir
    }

    fn tar_gz(entries: &[(&str, EntryType, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, entry_type, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(*entry_type);
            header.set_size(content.len() as u64);
            header.set_mode(if *entry_type == EntryType::Directory { 0o755 } else { 0o644 });
            builder
                .append_data(&mut header, name, *content)
                .expect("Should append entry");
        }
        builder
            .into_inner()
            .expect("Should finish tar")
            .finish()
            .expect("Should finish gzip")
    }

    fn zip_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in files {
            if name.ends_with('/') {
                writer.add_directory(*name, options).expect("Should add dir");
            } else {
                writer.start_file(*name, options).expect("Should start file");
                writer.write_all(content).expect("Should write file");
            }
        }
        writer.finish().expect("Should finish zip").into_inner()
    }

    #[test]
    fn archive_kind_from_suffix() {
        assert_eq!(ArchiveKind::from_uri("https://x/a.zip").ok(), Some(ArchiveKind::Zip));
        assert_eq!(
            ArchiveKind::from_uri("https://x/a.tar.gz").ok(),
            Some(ArchiveKind::TarGz)
        );
        let err = ArchiveKind::from_uri("https://x/a.tar.bz2").expect_err("Should reject");
        assert!(matches!(err, InstallError::UnsupportedArchiveType { .. }));
    }

    #[test]
    fn zip_extracts_files_and_dirs() {
        let dir = temp_test_dir("zip");
        let data = zip_archive(&[
            ("foo/", b""),
            ("foo/bin/plugin", b"#!/bin/sh\necho hi\n"),
            ("README.md", b"readme"),
        ]);

        ZipExtractor.extract(&dir, &data).expect("Should extract");

        assert!(dir.join("foo").is_dir());
        assert_eq!(
            fs::read(dir.join("foo/bin/plugin")).expect("Should read"),
            b"#!/bin/sh\necho hi\n"
        );
        assert_eq!(fs::read(dir.join("README.md")).expect("Should read"), b"readme");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn zip_truncates_existing_files() {
        let dir = temp_test_dir("zip-truncate");
        fs::write(dir.join("file"), b"a much longer previous content").expect("Should write");
        let data = zip_archive(&[("file", b"short")]);
        ZipExtractor.extract(&dir, &data).expect("Should extract");
        assert_eq!(fs::read(dir.join("file")).expect("Should read"), b"short");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn tar_gz_extracts_files_and_skips_pax_header() {
        let dir = temp_test_dir("targz");
        let data = tar_gz(&[
            (PAX_GLOBAL_HEADER, EntryType::Regular, b"comment=abc\n"),
            ("pkg", EntryType::Directory, b""),
            ("pkg/bin/plugin", EntryType::Regular, b"binary"),
        ]);

        TarGzExtractor.extract(&dir, &data).expect("Should extract");

        assert!(!dir.join(PAX_GLOBAL_HEADER).exists());
        assert!(dir.join("pkg").is_dir());
        assert_eq!(fs::read(dir.join("pkg/bin/plugin")).expect("Should read"), b"binary");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn tar_gz_rejects_unsupported_entry_type() {
        let dir = temp_test_dir("targz-fifo");
        let data = tar_gz(&[
            ("first", EntryType::Regular, b"ok"),
            ("pipe", EntryType::Fifo, b""),
        ]);

        let err = TarGzExtractor.extract(&dir, &data).expect_err("Should fail");
        assert!(matches!(
            err,
            InstallError::UnsupportedEntryType { ref entry, .. } if entry == "pipe"
        ));
        // earlier entries stay on disk
        assert!(dir.join("first").exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn corrupt_archives_are_extract_errors() {
        let dir = temp_test_dir("corrupt");
        let zip_err = ZipExtractor.extract(&dir, b"not a zip").expect_err("Should fail");
        assert!(matches!(zip_err, InstallError::Extract { .. }));
        let tar_err = TarGzExtractor.extract(&dir, b"not gzip").expect_err("Should fail");
        assert!(matches!(tar_err, InstallError::Extract { .. }));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn entry_destination_refuses_escapes() {
        let dest = Path::new("/tmp/extract");
        assert_eq!(
            entry_destination(dest, "a\\b/./c").expect("Should join"),
            PathBuf::from("/tmp/extract/a/b/c")
        );
        assert!(entry_destination(dest, "../evil").is_err());
        assert!(entry_destination(dest, "a/../../evil").is_err());
        assert!(entry_destination(dest, "/etc/passwd").is_err());
        assert!(entry_destination(dest, "C:/evil").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn tar_gz_keeps_permission_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = temp_test_dir("targz-mode");
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(4);
        header.set_mode(0o755);
        builder
            .append_data(&mut header, "run", &b"exec"[..])
            .expect("Should append");
        let data = builder
            .into_inner()
            .expect("Should finish tar")
            .finish()
            .expect("Should finish gzip");

        TarGzExtractor.extract(&dir, &data).expect("Should extract");
        let mode = fs::metadata(dir.join("run"))
            .expect("Should stat")
            .permissions()
            .mode();
        assert_ne!(mode & 0o100, 0, "owner execute bit should be kept");
        fs::remove_dir_all(&dir).ok();
    }
}
