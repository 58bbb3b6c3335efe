//! `.zip` walker.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::{corrupt, safety, PayloadSink};
use crate::error::{Error, Result};

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Symlink targets are stored as the entry body; anything longer is bogus.
const MAX_LINK_TARGET: u64 = 4096;

pub(super) fn walk(archive: &Path, sink: &mut PayloadSink<'_>) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::scratch("open archive", e))?;
    let mut zip = ::zip::ZipArchive::new(file).map_err(|e| corrupt(archive, e))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| corrupt(archive, e))?;
        let name = entry.name().to_string();
        safety::check_entry_name(&name)?;

        let mode = entry.unix_mode();
        if mode.map(|m| (m & S_IFMT) == S_IFLNK).unwrap_or(false) {
            let mut target = String::new();
            (&mut entry)
                .take(MAX_LINK_TARGET)
                .read_to_string(&mut target)
                .map_err(|e| corrupt(archive, e))?;
            safety::check_symlink_target(&name, &target)?;
            continue;
        }
        if entry.is_dir() || !sink.wants(&name) {
            continue;
        }
        sink.accept(&name, mode, &mut entry)?;
    }
    Ok(())
}
