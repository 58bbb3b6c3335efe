//! `fetchbin validate` – check a release table before publishing it.

use anyhow::Result;
use fetchbin_core::error::Error;
use fetchbin_core::release_table::ReleaseTable;
use std::path::Path;

/// Lists structural and digest problems together. Structural problems exit
/// as a config error; digest problems alone as an invalid digest.
pub fn run_validate(table_path: &Path) -> Result<()> {
    let check = ReleaseTable::check(table_path)?;
    if check.is_clean() {
        println!(
            "{}: ok ({} version(s), {} archive(s))",
            table_path.display(),
            check.versions,
            check.archives
        );
        return Ok(());
    }
    for p in check.structural.iter().chain(&check.digests) {
        eprintln!("  {}", p);
    }
    let err = if check.structural.is_empty() {
        Error::InvalidDigest {
            context: table_path.display().to_string(),
            reason: format!("{} entr(ies) without a usable sha256", check.digests.len()),
        }
    } else {
        Error::Config(format!(
            "{}: {} structural problem(s), {} digest problem(s)",
            table_path.display(),
            check.structural.len(),
            check.digests.len()
        ))
    };
    Err(err.into())
}
