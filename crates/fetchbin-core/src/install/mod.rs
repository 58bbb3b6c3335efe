//! Installer: put the staged executable at its destination atomically.
//!
//! Order of operations, all under the destination lock:
//! backup the current file, write a temp file in the destination directory,
//! set permissions, fsync, rename over the destination, fsync the directory,
//! drop the backup. The rename is the only step a reader can observe.

mod backup;
mod lock;

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::checksum;
use crate::config::{FetchbinConfig, LockContention};
use crate::error::{Error, Result};
use crate::extract::ExtractedPayload;

pub use backup::backup_path;
pub use lock::{lock_path, DestinationLock};

use backup::Backup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallOutcome {
    /// Destination did not exist.
    Installed,
    /// A different file was replaced.
    Replaced,
    /// Destination already held identical bytes and mode.
    Unchanged,
}

impl std::fmt::Display for InstallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            InstallOutcome::Installed => "installed",
            InstallOutcome::Replaced => "replaced",
            InstallOutcome::Unchanged => "unchanged",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallOptions {
    /// Permission bits for the installed file; `None` keeps the payload's.
    pub mode: Option<u32>,
    pub lock_contention: LockContention,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            mode: None,
            lock_contention: LockContention::Wait,
        }
    }
}

impl From<&FetchbinConfig> for InstallOptions {
    fn from(cfg: &FetchbinConfig) -> Self {
        Self {
            mode: Some(cfg.file_mode),
            lock_contention: cfg.lock_contention,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Installer {
    options: InstallOptions,
}

/// Result of `Installer::stage`.
#[derive(Debug)]
pub enum Staged {
    /// Nothing to do; the lock is already released.
    Unchanged,
    Pending(StagedInstall),
}

impl Installer {
    pub fn new(options: InstallOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &InstallOptions {
        &self.options
    }

    /// Stage and commit in one step.
    pub fn install(&self, payload: &ExtractedPayload, dest: &Path) -> Result<InstallOutcome> {
        match self.stage(payload, dest)? {
            Staged::Unchanged => Ok(InstallOutcome::Unchanged),
            Staged::Pending(staged) => staged.commit(),
        }
    }

    /// Everything up to (not including) the rename. The destination is not
    /// modified until `StagedInstall::commit`.
    pub fn stage(&self, payload: &ExtractedPayload, dest: &Path) -> Result<Staged> {
        let parent = parent_dir(dest)?;
        fs::create_dir_all(&parent)
            .map_err(|e| Error::install_io(dest, format!("create {}", parent.display()), e))?;

        let lock = DestinationLock::acquire(dest, self.options.lock_contention)?;
        backup::recover(dest)?;

        let mode = self.options.mode.unwrap_or_else(|| payload.mode()) & 0o7777;
        let existed = dest.exists();
        if existed && is_identical(dest, payload.path(), mode)? {
            tracing::info!(dest = %dest.display(), "destination already up to date");
            return Ok(Staged::Unchanged);
        }

        let backup = if existed { Some(Backup::take(dest)?) } else { None };
        let temp = write_temp(payload.path(), dest, &parent, mode)?;
        tracing::debug!(temp = %temp.path().display(), dest = %dest.display(), "staged install");
        Ok(Staged::Pending(StagedInstall {
            temp,
            dest: dest.to_path_buf(),
            parent,
            backup,
            _lock: lock,
        }))
    }
}

/// A fully written temp file next to the destination, holding the lock.
/// Dropping it deletes the temp file and the backup; the destination keeps
/// its previous contents.
#[derive(Debug)]
pub struct StagedInstall {
    temp: NamedTempFile,
    dest: PathBuf,
    parent: PathBuf,
    backup: Option<Backup>,
    _lock: DestinationLock,
}

impl StagedInstall {
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    pub fn destination(&self) -> &Path {
        &self.dest
    }

    /// Rename over the destination. On failure the backup is restored.
    pub fn commit(self) -> Result<InstallOutcome> {
        let StagedInstall {
            temp,
            dest,
            parent,
            backup,
            _lock,
        } = self;
        let outcome = if backup.is_some() {
            InstallOutcome::Replaced
        } else {
            InstallOutcome::Installed
        };

        if let Err(e) = temp.persist(&dest) {
            let err = Error::install_io(&dest, "rename into place", e.error);
            if let Some(b) = backup {
                if let Err(restore_err) = b.restore() {
                    tracing::error!("{}", restore_err);
                }
            }
            return Err(err);
        }

        if let Err(e) = sync_dir(&parent) {
            tracing::warn!(dir = %parent.display(), "fsync of destination directory failed: {}", e);
        }
        if let Some(b) = backup {
            b.discard();
        }
        tracing::info!(dest = %dest.display(), %outcome, "installed");
        Ok(outcome)
    }
}

fn parent_dir(dest: &Path) -> Result<PathBuf> {
    if dest.file_name().is_none() {
        return Err(Error::InstallError {
            path: dest.to_path_buf(),
            message: "destination has no file name".into(),
            source: None,
        });
    }
    Ok(match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    })
}

fn write_temp(src: &Path, dest: &Path, parent: &Path, mode: u32) -> Result<NamedTempFile> {
    let mut temp = tempfile::Builder::new()
        .prefix(&backup::temp_prefix(dest))
        .suffix(backup::TEMP_SUFFIX)
        .tempfile_in(parent)
        .map_err(|e| Error::install_io(dest, "create temp file", e))?;
    let mut input = File::open(src).map_err(|e| Error::scratch("open staged payload", e))?;
    io::copy(&mut input, temp.as_file_mut())
        .map_err(|e| Error::install_io(dest, "write temp file", e))?;
    set_mode(temp.as_file(), mode).map_err(|e| Error::install_io(dest, "set permissions", e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| Error::install_io(dest, "fsync temp file", e))?;
    Ok(temp)
}

fn is_identical(dest: &Path, staged: &Path, mode: u32) -> Result<bool> {
    let meta = fs::metadata(dest).map_err(|e| Error::install_io(dest, "stat destination", e))?;
    let staged_meta = fs::metadata(staged).map_err(|e| Error::scratch("stat staged payload", e))?;
    if !meta.is_file() || meta.len() != staged_meta.len() || !mode_matches(&meta, mode) {
        return Ok(false);
    }
    let a = checksum::sha256_path(dest).map_err(|e| Error::InstallError {
        path: dest.to_path_buf(),
        message: format!("hash destination: {:#}", e),
        source: None,
    })?;
    let b = checksum::sha256_path(staged).map_err(|e| Error::InstallError {
        path: dest.to_path_buf(),
        message: format!("hash staged payload: {:#}", e),
        source: None,
    })?;
    Ok(a == b)
}

#[cfg(unix)]
fn mode_matches(meta: &fs::Metadata, mode: u32) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777 == mode
}

#[cfg(not(unix))]
fn mode_matches(_meta: &fs::Metadata, _mode: u32) -> bool {
    true
}

#[cfg(unix)]
fn set_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &File, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
