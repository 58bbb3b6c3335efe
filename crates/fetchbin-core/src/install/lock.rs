//! Exclusive per-destination lock held from backup through rename.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs4::FileExt;

use crate::config::LockContention;
use crate::error::{Error, Result};

/// Lock file next to the destination: `dir/.yo.fetchbin-lock`. It is never
/// deleted, so every installer locks the same inode.
pub fn lock_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "install".to_string());
    dest.with_file_name(format!(".{}.fetchbin-lock", name))
}

/// Released when dropped (closing the file drops the OS lock).
#[derive(Debug)]
pub struct DestinationLock {
    _file: File,
    path: PathBuf,
}

impl DestinationLock {
    pub fn acquire(dest: &Path, contention: LockContention) -> Result<Self> {
        let path = lock_path(dest);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| Error::install_io(dest, format!("open lock {}", path.display()), e))?;
        match contention {
            LockContention::Wait => {
                file.lock_exclusive()
                    .map_err(|e| Error::install_io(dest, format!("lock {}", path.display()), e))?;
            }
            LockContention::Fail => match file.try_lock_exclusive() {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    return Err(Error::InstallInProgress(dest.to_path_buf()));
                }
                Err(e) => {
                    return Err(Error::install_io(dest, format!("lock {}", path.display()), e));
                }
            },
        }
        tracing::debug!(lock = %path.display(), "acquired destination lock");
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
