//! Integrity Verifier: the single trust gate between fetch and extract.
//!
//! `VerifiedArtifact` can only be built here, after the SHA-256 of the whole
//! downloaded file equals the descriptor's expected digest. The extractor
//! accepts nothing else.

use std::fs::File;
use std::path::Path;

use tempfile::TempPath;

use crate::checksum::{self, Sha256Digest};
use crate::error::{Error, Result};
use crate::fetch::DownloadedArtifact;
use crate::locator::ArtifactDescriptor;

#[derive(Debug)]
pub struct VerifiedArtifact {
    descriptor: ArtifactDescriptor,
    path: TempPath,
    digest: Sha256Digest,
}

impl VerifiedArtifact {
    pub fn descriptor(&self) -> &ArtifactDescriptor {
        &self.descriptor
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Observed digest (equal to the expected one).
    pub fn digest(&self) -> &Sha256Digest {
        &self.digest
    }
}

/// Hash the complete downloaded file and compare with the expected digest.
/// On mismatch the artifact is dropped, which deletes its temp file.
pub fn verify(downloaded: DownloadedArtifact) -> Result<VerifiedArtifact> {
    let (descriptor, path, bytes) = downloaded.into_parts();
    let file = File::open(&path).map_err(|e| Error::scratch("open downloaded archive", e))?;
    let observed =
        checksum::sha256_reader(file).map_err(|e| Error::scratch("read downloaded archive", e))?;
    if observed != descriptor.expected_digest {
        tracing::error!(
            url = %descriptor.url,
            bytes,
            expected = %descriptor.expected_digest,
            actual = %observed,
            "checksum mismatch"
        );
        return Err(Error::ChecksumMismatch {
            expected: descriptor.expected_digest.to_string(),
            actual: observed.to_string(),
        });
    }
    tracing::info!(digest = %observed, bytes, "artifact verified");
    Ok(VerifiedArtifact {
        descriptor,
        path,
        digest: observed,
    })
}

/// In-memory check of `bytes` against `expected`.
pub fn verify_bytes(bytes: &[u8], expected: &Sha256Digest) -> Result<()> {
    let observed = checksum::sha256_bytes(bytes);
    if &observed != expected {
        return Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual: observed.to_string(),
        });
    }
    Ok(())
}
