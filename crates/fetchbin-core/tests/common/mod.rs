#![allow(dead_code)]

pub mod archives;
pub mod artifact_server;

use fetchbin_core::checksum;
use fetchbin_core::release_table::ReleaseTable;

/// Table with one `yo 1.3.5` archive for `target` at `url`.
pub fn table_for(url: &str, target: &str, body: &[u8]) -> ReleaseTable {
    table_with_digest(url, target, checksum::sha256_bytes(body).as_str())
}

pub fn table_with_digest(url: &str, target: &str, digest: &str) -> ReleaseTable {
    ReleaseTable::from_toml_str(&format!(
        r#"
        name = "yo"

        [[artifact]]
        version = "1.3.5"
        target = "{target}"
        url = "{url}"
        sha256 = "{digest}"
        "#,
    ))
    .unwrap()
}
