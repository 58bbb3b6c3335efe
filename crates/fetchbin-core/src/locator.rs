//! Artifact Locator: (version request, platform) → exactly one descriptor.
//!
//! Pure function of its inputs and the release table. Never substitutes
//! another platform's archive, and refuses placeholder digests instead of
//! skipping verification.

use serde::Serialize;

use crate::checksum::Sha256Digest;
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::release_table::ReleaseTable;
use crate::version::{ReleaseVersion, VersionRequest};

/// Everything needed to fetch and trust one archive. Immutable once located.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDescriptor {
    pub name: String,
    /// Executable file name expected inside the archive (with `.exe` on Windows).
    pub binary: String,
    pub version: ReleaseVersion,
    pub platform: Platform,
    /// Target triple as written in the table.
    pub target: String,
    pub url: String,
    pub expected_digest: Sha256Digest,
}

/// Resolve `request` for `platform` against `table`.
pub fn locate(
    table: &ReleaseTable,
    request: &VersionRequest,
    platform: Platform,
) -> Result<ArtifactDescriptor> {
    let version = match request {
        VersionRequest::Exact(v) => {
            if !table.contains_version(v) {
                return Err(Error::UnknownVersion(format!("{} has no release {}", table.name(), v)));
            }
            v.clone()
        }
        VersionRequest::Latest => latest_for(table, platform)?.clone(),
    };

    let entry = table.entry(&version, platform).ok_or_else(|| {
        Error::unsupported(
            &platform,
            format!("no {} {} archive for this platform", table.name(), version),
        )
    })?;

    let expected_digest =
        Sha256Digest::parse(&entry.sha256).map_err(|reason| Error::InvalidDigest {
            context: format!("{} {} {}", table.name(), version, entry.target),
            reason,
        })?;

    let descriptor = ArtifactDescriptor {
        name: table.name().to_string(),
        binary: platform.executable_name(table.binary()),
        version,
        platform,
        target: entry.target.clone(),
        url: entry.url.clone(),
        expected_digest,
    };
    tracing::debug!(
        version = %descriptor.version,
        target = %descriptor.target,
        url = %descriptor.url,
        "located artifact"
    );
    Ok(descriptor)
}

/// Highest version with an archive for `platform`; pre-releases only when
/// the table opts in.
fn latest_for(table: &ReleaseTable, platform: Platform) -> Result<&ReleaseVersion> {
    let eligible = |v: &&ReleaseVersion| table.include_prereleases() || !v.is_prerelease();
    if let Some(v) = table.versions_for(platform).find(eligible) {
        return Ok(v);
    }
    if table.versions().any(|v| eligible(&v)) {
        Err(Error::unsupported(
            &platform,
            format!("no {} release publishes an archive for this platform", table.name()),
        ))
    } else {
        Err(Error::UnknownVersion(format!("{} has no releases", table.name())))
    }
}
