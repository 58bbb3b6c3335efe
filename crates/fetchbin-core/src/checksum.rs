//! SHA-256 digests: parsing trusted hex values and hashing downloaded files.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

const BUF_SIZE: usize = 64 * 1024;

/// Lowercase hex SHA-256 digest, validated on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Parse a trusted digest. Empty, wrong-length, non-hex, all-zero and
    /// `REPLACE_WITH_...`-style placeholders are rejected with a reason.
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("digest is empty".to_string());
        }
        if s.to_ascii_uppercase().starts_with("REPLACE") || s.contains(['<', '>', '{', '}']) {
            return Err(format!("placeholder digest `{}`", s));
        }
        if s.len() != 64 {
            return Err(format!("expected 64 hex characters, got {}", s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("digest contains non-hex characters".to_string());
        }
        if s.chars().all(|c| c == '0') {
            return Err("placeholder digest (all zeros)".to_string());
        }
        Ok(Sha256Digest(s.to_ascii_lowercase()))
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        Sha256Digest(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash everything `reader` yields until EOF.
pub fn sha256_reader<R: Read>(mut reader: R) -> std::io::Result<Sha256Digest> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Sha256Digest::from_bytes(&hasher.finalize()))
}

pub fn sha256_bytes(data: &[u8]) -> Sha256Digest {
    Sha256Digest::from_bytes(&Sha256::digest(data))
}

/// Compute SHA-256 of a file in bounded-memory chunks.
pub fn sha256_path(path: &Path) -> anyhow::Result<Sha256Digest> {
    use anyhow::Context;
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    sha256_reader(f).with_context(|| format!("read {}", path.display()))
}
