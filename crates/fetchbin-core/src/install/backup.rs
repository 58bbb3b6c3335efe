//! Backup of the previous destination, kept until the new file is in place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub(super) const TEMP_SUFFIX: &str = ".fetchbin-tmp";

fn dest_name(dest: &Path) -> String {
    dest.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "install".to_string())
}

pub fn backup_path(dest: &Path) -> PathBuf {
    dest.with_file_name(format!(".{}.fetchbin-backup", dest_name(dest)))
}

/// Temp files for `dest` are `.<name>.<random>.fetchbin-tmp` siblings.
pub(super) fn temp_prefix(dest: &Path) -> String {
    format!(".{}.", dest_name(dest))
}

/// Deletes the backup on drop unless `restore` or `discard` already ran.
#[derive(Debug)]
pub struct Backup {
    dest: PathBuf,
    path: PathBuf,
    armed: bool,
}

impl Backup {
    /// Snapshot `dest`. A hard link is tried first, then a copy.
    pub fn take(dest: &Path) -> Result<Self> {
        let path = backup_path(dest);
        remove_if_exists(&path).map_err(|e| Error::install_io(dest, "remove stale backup", e))?;
        if fs::hard_link(dest, &path).is_err() {
            fs::copy(dest, &path).map_err(|e| Error::install_io(dest, "back up destination", e))?;
        }
        tracing::debug!(backup = %path.display(), "backed up destination");
        Ok(Self {
            dest: dest.to_path_buf(),
            path,
            armed: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Put the previous file back at the destination.
    pub fn restore(mut self) -> Result<()> {
        self.armed = false;
        fs::rename(&self.path, &self.dest)
            .map_err(|e| Error::install_io(&self.dest, "restore backup", e))?;
        // renaming a hard link onto its twin is a no-op that leaves both names
        let _ = remove_if_exists(&self.path);
        tracing::warn!(dest = %self.dest.display(), "restored previous binary from backup");
        Ok(())
    }

    /// The new file is committed; drop the backup.
    pub fn discard(mut self) {
        self.armed = false;
        if let Err(e) = remove_if_exists(&self.path) {
            tracing::warn!(backup = %self.path.display(), "failed to remove backup: {}", e);
        }
    }
}

impl Drop for Backup {
    fn drop(&mut self) {
        if self.armed {
            let _ = remove_if_exists(&self.path);
        }
    }
}

/// Clean up after an interrupted run. Temp files are removed. If the
/// destination vanished the backup becomes the destination again, otherwise
/// it is stale. Must be called with the destination lock held.
pub fn recover(dest: &Path) -> Result<()> {
    sweep_temp_files(dest)?;
    let path = backup_path(dest);
    if !path.exists() {
        return Ok(());
    }
    if dest.exists() {
        tracing::info!(backup = %path.display(), "removing stale backup");
        remove_if_exists(&path).map_err(|e| Error::install_io(dest, "remove stale backup", e))
    } else {
        tracing::warn!(backup = %path.display(), "destination missing, restoring backup");
        fs::rename(&path, dest).map_err(|e| Error::install_io(dest, "restore backup", e))
    }
}

fn sweep_temp_files(dest: &Path) -> Result<()> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let entries = match fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::install_io(dest, "scan for stale temp files", e)),
    };
    let prefix = temp_prefix(dest);
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let is_temp = name.len() > prefix.len() + TEMP_SUFFIX.len()
            && name.starts_with(&prefix)
            && name.ends_with(TEMP_SUFFIX);
        if !is_temp {
            continue;
        }
        tracing::info!(temp = %entry.path().display(), "removing stale temp file");
        remove_if_exists(&entry.path())
            .map_err(|e| Error::install_io(dest, "remove stale temp file", e))?;
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_puts_old_bytes_back() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("yo");
        fs::write(&dest, b"old").unwrap();
        let b = Backup::take(&dest).unwrap();
        fs::write(dir.path().join("new"), b"new").unwrap();
        fs::rename(dir.path().join("new"), &dest).unwrap();
        b.restore().unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"old");
        assert!(!backup_path(&dest).exists());
    }

    #[test]
    fn discard_and_drop_remove_backup() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("yo");
        fs::write(&dest, b"old").unwrap();
        Backup::take(&dest).unwrap().discard();
        assert!(!backup_path(&dest).exists());
        drop(Backup::take(&dest).unwrap());
        assert!(!backup_path(&dest).exists());
        assert_eq!(fs::read(&dest).unwrap(), b"old");
    }

    #[test]
    fn recover_after_interrupted_rename() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("yo");
        fs::write(backup_path(&dest), b"old").unwrap();
        recover(&dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"old");

        fs::write(backup_path(&dest), b"older").unwrap();
        recover(&dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"old");
        assert!(!backup_path(&dest).exists());
    }

    #[test]
    fn recover_sweeps_stale_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("yo");
        fs::write(&dest, b"old").unwrap();
        let stale = dir.path().join(".yo.a1B2c3.fetchbin-tmp");
        let other = dir.path().join(".yoyo.a1B2c3.fetchbin-tmp");
        fs::write(&stale, b"half").unwrap();
        fs::write(&other, b"half").unwrap();

        recover(&dest).unwrap();
        assert!(!stale.exists());
        assert!(other.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"old");
    }
}
