//! `fetchbin versions` – list releases in a table.

use anyhow::Result;
use fetchbin_core::platform::Platform;
use fetchbin_core::release_table::ReleaseTable;
use std::path::Path;

pub fn run_versions(table_path: &Path, platform: Option<Platform>) -> Result<()> {
    let table = ReleaseTable::load(table_path)?;
    let versions: Vec<_> = match platform {
        Some(p) => table.versions_for(p).collect(),
        None => table.versions().collect(),
    };
    if versions.is_empty() {
        println!("No releases in {}.", table.name());
        return Ok(());
    }
    println!("{:<16} {}", "VERSION", "PLATFORMS");
    for v in versions {
        let platforms: Vec<String> = table.platforms_for(v).iter().map(|p| p.to_string()).collect();
        let marker = if v.is_prerelease() && !table.include_prereleases() {
            " (pre-release)"
        } else {
            ""
        };
        println!("{:<16} {}{}", v.to_string(), platforms.join(", "), marker);
    }
    Ok(())
}
