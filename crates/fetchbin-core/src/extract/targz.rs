//! `.tar.gz` walker.

use std::fs::File;
use std::path::Path;

use flate2::read::GzDecoder;

use super::{corrupt, safety, PayloadSink};
use crate::error::{Error, Result};

pub(super) fn walk(archive: &Path, sink: &mut PayloadSink<'_>) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::scratch("open archive", e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    let entries = tar.entries().map_err(|e| corrupt(archive, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| corrupt(archive, e))?;
        let name = entry
            .path()
            .map_err(|e| corrupt(archive, e))?
            .to_string_lossy()
            .into_owned();
        safety::check_entry_name(&name)?;

        let kind = entry.header().entry_type();
        if kind.is_symlink() || kind.is_hard_link() {
            let target = entry
                .link_name()
                .map_err(|e| corrupt(archive, e))?
                .map(|t| t.to_string_lossy().into_owned())
                .unwrap_or_default();
            if kind.is_symlink() {
                safety::check_symlink_target(&name, &target)?;
            } else {
                safety::check_hardlink_target(&name, &target)?;
            }
            continue;
        }
        if !kind.is_file() || !sink.wants(&name) {
            continue;
        }
        let mode = entry.header().mode().ok();
        sink.accept(&name, mode, &mut entry)?;
    }
    Ok(())
}
