//! `fetchbin resolve` – locate an artifact without fetching it.

use anyhow::Result;
use fetchbin_core::pipeline;
use fetchbin_core::platform::Platform;
use fetchbin_core::release_table::ReleaseTable;
use fetchbin_core::version::VersionRequest;
use std::path::Path;

pub fn run_resolve(
    table_path: &Path,
    version: &VersionRequest,
    platform: Option<Platform>,
    json: bool,
) -> Result<()> {
    let table = ReleaseTable::load(table_path)?;
    let d = pipeline::resolve(&table, version, platform)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&d)?);
        return Ok(());
    }
    println!("name     {}", d.name);
    println!("version  {}", d.version);
    println!("platform {} ({})", d.platform, d.target);
    println!("binary   {}", d.binary);
    println!("url      {}", d.url);
    println!("sha256   {}", d.expected_digest);
    Ok(())
}
