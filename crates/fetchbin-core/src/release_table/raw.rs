//! On-disk shape of a release table, before validation.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct RawTable {
    pub name: String,
    #[serde(default)]
    pub binary: Option<String>,
    /// e.g. `https://host/releases/download/{version}/{name}-{version}-{target}.tar.gz`
    #[serde(default)]
    pub url_template: Option<String>,
    #[serde(default)]
    pub include_prereleases: bool,
    #[serde(default, rename = "artifact")]
    pub artifacts: Vec<RawArtifact>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawArtifact {
    pub version: String,
    pub target: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Missing digests deserialize as empty and are refused at lookup.
    #[serde(default)]
    pub sha256: String,
}
