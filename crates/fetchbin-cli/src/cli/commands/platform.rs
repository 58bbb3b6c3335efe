//! `fetchbin platform` – show the detected host platform.

use anyhow::Result;
use fetchbin_core::platform;

pub fn run_platform() -> Result<()> {
    let host = platform::identify()?;
    match host.target_triple() {
        Some(triple) => println!("{}  {}", host, triple),
        None => println!("{}", host),
    }
    Ok(())
}
