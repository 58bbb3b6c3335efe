//! Archive Extractor: isolate the single executable from a verified archive.
//!
//! Every entry is checked for path traversal before the payload is accepted,
//! and the payload is written into a fresh staging directory, never into the
//! destination. Supported containers: `.tar.gz`/`.tgz` and `.zip`.

mod safety;
mod targz;
mod zipfile;

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::verify::VerifiedArtifact;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    /// Guess from the file name at the end of a URL path.
    pub fn from_url(url: &str) -> Option<Self> {
        let name = filename_from_url_path(url)?.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else if name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else {
            None
        }
    }

    fn sniff(path: &Path) -> io::Result<Option<Self>> {
        let mut head = [0u8; 4];
        let mut f = File::open(path)?;
        let mut n = 0;
        while n < head.len() {
            match f.read(&mut head[n..])? {
                0 => break,
                k => n += k,
            }
        }
        let head = &head[..n];
        Ok(if head.starts_with(GZIP_MAGIC) {
            Some(ArchiveFormat::TarGz)
        } else if head.starts_with(ZIP_MAGIC) {
            Some(ArchiveFormat::Zip)
        } else {
            None
        })
    }
}

/// Extracts the last path segment from a URL, ignoring query and fragment.
fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path().split('/').filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}

/// The executable isolated from an archive, staged in its own temp dir.
/// Dropping it removes the staging directory.
#[derive(Debug)]
pub struct ExtractedPayload {
    staging: TempDir,
    executable: PathBuf,
    mode: u32,
    source_archive: PathBuf,
    entry: String,
}

impl ExtractedPayload {
    /// Staged executable file.
    pub fn path(&self) -> &Path {
        &self.executable
    }

    /// Permission bits from the archive entry, with execute added wherever read is set.
    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn source_archive(&self) -> &Path {
        &self.source_archive
    }

    /// Entry name inside the archive.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    pub fn read_bytes(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.executable)
    }
}

/// Collects the single payload while the format readers walk entries.
pub(crate) struct PayloadSink<'a> {
    binary: &'a str,
    staging: &'a Path,
    archive: &'a Path,
    found: Option<(PathBuf, u32, String)>,
}

impl<'a> PayloadSink<'a> {
    fn new(binary: &'a str, staging: &'a Path, archive: &'a Path) -> Self {
        Self {
            binary,
            staging,
            archive,
            found: None,
        }
    }

    fn corrupt(&self, reason: impl std::fmt::Display) -> Error {
        corrupt(self.archive, reason)
    }

    fn wants(&self, entry: &str) -> bool {
        safety::file_name(entry) == Some(self.binary)
    }

    /// Copy a matching regular-file entry into staging.
    fn accept<R: Read>(&mut self, entry: &str, mode: Option<u32>, mut data: R) -> Result<()> {
        if let Some((_, _, first)) = &self.found {
            return Err(self.corrupt(format!(
                "multiple entries named `{}` (`{}` and `{}`)",
                self.binary, first, entry
            )));
        }
        let out_path = self.staging.join(self.binary);
        let mut out = File::create(&out_path)
            .map_err(|e| Error::scratch(format!("create {}", out_path.display()), e))?;
        io::copy(&mut data, &mut out)
            .map_err(|e| self.corrupt(format!("read entry `{}`: {}", entry, e)))?;
        out.sync_all()
            .map_err(|e| Error::scratch(format!("sync {}", out_path.display()), e))?;
        self.found = Some((out_path, executable_mode(mode), entry.to_string()));
        Ok(())
    }
}

fn corrupt(archive: &Path, reason: impl std::fmt::Display) -> Error {
    Error::CorruptArchive {
        path: archive.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Keep the entry's permission bits and add execute wherever read is
/// granted; entries without a mode get 0o755.
fn executable_mode(mode: Option<u32>) -> u32 {
    match mode {
        Some(m) => {
            let m = m & 0o777;
            let m = if m == 0 { 0o755 } else { m };
            m | ((m & 0o444) >> 2) | 0o100
        }
        None => 0o755,
    }
}

/// Extract `artifact.descriptor().binary` into a fresh staging directory next
/// to the archive.
///
/// This is the only way in from outside the crate; unverified paths are
/// refused at compile time:
///
/// ```compile_fail
/// use fetchbin_core::extract::{extract_from, ArchiveFormat};
///
/// let _ = extract_from(std::path::Path::new("yo.tar.gz"), ArchiveFormat::TarGz, "yo");
/// ```
pub fn extract(artifact: &VerifiedArtifact) -> Result<ExtractedPayload> {
    let archive = artifact.path();
    let binary = artifact.descriptor().binary.as_str();
    let format = match ArchiveFormat::from_url(&artifact.descriptor().url) {
        Some(f) => f,
        None => ArchiveFormat::sniff(archive)
            .map_err(|e| corrupt(archive, e))?
            .ok_or_else(|| corrupt(archive, "unrecognized archive format"))?,
    };
    extract_from(archive, format, binary)
}

/// Extract `binary` from the archive at `archive`.
pub(crate) fn extract_from(archive: &Path, format: ArchiveFormat, binary: &str) -> Result<ExtractedPayload> {
    let parent = archive.parent().unwrap_or_else(|| Path::new("."));
    let staging = tempfile::Builder::new()
        .prefix(".fetchbin-extract-")
        .tempdir_in(parent)
        .map_err(|e| Error::scratch("create staging directory", e))?;

    let mut sink = PayloadSink::new(binary, staging.path(), archive);
    match format {
        ArchiveFormat::TarGz => targz::walk(archive, &mut sink)?,
        ArchiveFormat::Zip => zipfile::walk(archive, &mut sink)?,
    }

    let Some((executable, mode, entry)) = sink.found else {
        return Err(Error::PayloadNotFound {
            path: archive.to_path_buf(),
            binary: binary.to_string(),
        });
    };
    tracing::info!(entry = %entry, mode = format_args!("{:o}", mode), ?format, "extracted payload");
    Ok(ExtractedPayload {
        staging,
        executable,
        mode,
        source_archive: archive.to_path_buf(),
        entry,
    })
}


#[cfg(test)]
mod tests {
    use super::testutil::{tar_gz, zip_archive, Item};
    use super::*;

    fn write_archive(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, bytes).unwrap();
        p
    }

    #[test]
    fn format_from_url() {
        assert_eq!(
            ArchiveFormat::from_url("https://x.io/d/yo-1.3.5-x86_64-unknown-linux-musl.tar.gz"),
            Some(ArchiveFormat::TarGz)
        );
        assert_eq!(ArchiveFormat::from_url("https://x.io/yo.TGZ?sig=1"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_url("https://x.io/yo.zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_url("https://x.io/download?id=3"), None);
        assert_eq!(ArchiveFormat::from_url("https://x.io/"), None);
    }

    #[test]
    fn sniff_magic() {
        let dir = tempfile::tempdir().unwrap();
        let tgz = write_archive(dir.path(), "a", &tar_gz(&[Item::File("yo", b"x", 0o755)]));
        let z = write_archive(dir.path(), "b", &zip_archive(&[Item::File("yo", b"x", 0o755)]));
        let junk = write_archive(dir.path(), "c", b"<html>");
        assert_eq!(ArchiveFormat::sniff(&tgz).unwrap(), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::sniff(&z).unwrap(), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::sniff(&junk).unwrap(), None);
    }

    #[test]
    fn tar_gz_single_executable() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_archive(
            dir.path(),
            "yo.tar.gz",
            &tar_gz(&[
                Item::File("README.md", b"docs", 0o644),
                Item::File("yo", b"\x7fELF binary", 0o755),
            ]),
        );
        let p = extract_from(&a, ArchiveFormat::TarGz, "yo").unwrap();
        assert_eq!(p.read_bytes().unwrap(), b"\x7fELF binary");
        assert_eq!(p.entry(), "yo");
        assert_eq!(p.mode(), 0o755);
        assert_eq!(p.source_archive(), a.as_path());
        assert!(p.path().starts_with(p.staging_dir()));
    }

    #[test]
    fn nested_directory_payload() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_archive(
            dir.path(),
            "yo.tar.gz",
            &tar_gz(&[
                Item::Dir("yo-1.3.5/"),
                Item::File("yo-1.3.5/yo", b"bin", 0o700),
                Item::File("yo-1.3.5/LICENSE", b"mit", 0o644),
            ]),
        );
        let p = extract_from(&a, ArchiveFormat::TarGz, "yo").unwrap();
        assert_eq!(p.entry(), "yo-1.3.5/yo");
        assert_eq!(p.mode(), 0o700);
    }

    #[test]
    fn non_executable_entry_gets_exec_bits() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_archive(dir.path(), "yo.tar.gz", &tar_gz(&[Item::File("yo", b"bin", 0o644)]));
        let p = extract_from(&a, ArchiveFormat::TarGz, "yo").unwrap();
        assert_eq!(p.mode(), 0o755);
    }

    #[test]
    fn missing_payload() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_archive(dir.path(), "yo.tar.gz", &tar_gz(&[Item::File("other", b"x", 0o755)]));
        assert!(matches!(
            extract_from(&a, ArchiveFormat::TarGz, "yo"),
            Err(Error::PayloadNotFound { .. })
        ));
    }

    #[test]
    fn duplicate_payload_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_archive(
            dir.path(),
            "yo.tar.gz",
            &tar_gz(&[Item::File("a/yo", b"1", 0o755), Item::File("b/yo", b"2", 0o755)]),
        );
        assert!(matches!(
            extract_from(&a, ArchiveFormat::TarGz, "yo"),
            Err(Error::CorruptArchive { .. })
        ));
    }

    #[test]
    fn traversal_entry_rejected_even_after_payload() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_archive(
            dir.path(),
            "yo.tar.gz",
            &tar_gz(&[Item::File("yo", b"bin", 0o755), Item::RawName("../evil", b"pwn")]),
        );
        assert!(matches!(
            extract_from(&a, ArchiveFormat::TarGz, "yo"),
            Err(Error::UnsafeArchiveEntry { .. })
        ));
        assert!(!dir.path().parent().unwrap().join("evil").exists());
    }

    #[test]
    fn escaping_symlink_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_archive(
            dir.path(),
            "yo.tar.gz",
            &tar_gz(&[Item::Symlink("yo", "../../usr/bin/sh")]),
        );
        assert!(matches!(
            extract_from(&a, ArchiveFormat::TarGz, "yo"),
            Err(Error::UnsafeArchiveEntry { .. })
        ));
    }

    #[test]
    fn symlink_named_like_binary_is_not_the_payload() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_archive(
            dir.path(),
            "yo.tar.gz",
            &tar_gz(&[Item::File("yo-real", b"bin", 0o755), Item::Symlink("yo", "yo-real")]),
        );
        assert!(matches!(
            extract_from(&a, ArchiveFormat::TarGz, "yo"),
            Err(Error::PayloadNotFound { .. })
        ));
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_archive(dir.path(), "yo.tar.gz", b"\x1f\x8bnot really gzip at all");
        assert!(matches!(
            extract_from(&a, ArchiveFormat::TarGz, "yo"),
            Err(Error::CorruptArchive { .. })
        ));
        let z = write_archive(dir.path(), "yo.zip", b"PK\x03\x04 truncated");
        assert!(matches!(
            extract_from(&z, ArchiveFormat::Zip, "yo"),
            Err(Error::CorruptArchive { .. })
        ));
    }

    #[test]
    fn zip_payload_and_exe_name() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_archive(
            dir.path(),
            "yo.zip",
            &zip_archive(&[Item::Dir("yo/"), Item::File("yo/yo.exe", b"MZ", 0o644)]),
        );
        let p = extract_from(&a, ArchiveFormat::Zip, "yo.exe").unwrap();
        assert_eq!(p.read_bytes().unwrap(), b"MZ");
        assert_eq!(p.mode(), 0o755);
    }

    #[test]
    fn zip_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_archive(
            dir.path(),
            "yo.zip",
            &zip_archive(&[Item::File("yo", b"bin", 0o755), Item::File("../../evil", b"x", 0o644)]),
        );
        assert!(matches!(
            extract_from(&a, ArchiveFormat::Zip, "yo"),
            Err(Error::UnsafeArchiveEntry { .. })
        ));
    }

    #[test]
    fn zip_escaping_symlink_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_archive(
            dir.path(),
            "yo.zip",
            &zip_archive(&[Item::File("yo", b"bin", 0o755), Item::Symlink("lib", "../../etc")]),
        );
        assert!(matches!(
            extract_from(&a, ArchiveFormat::Zip, "yo"),
            Err(Error::UnsafeArchiveEntry { .. })
        ));
    }
}
