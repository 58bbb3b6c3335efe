//! Trusted release table: (version, platform) → (archive URL, expected SHA-256).
//!
//! Loaded from TOML (or JSON when the file ends in `.json`). Structural
//! problems (unparsable versions or targets, bad URLs, duplicate pairs) make
//! the whole table unusable and are reported together. Digests are checked
//! lazily by the locator so that one placeholder entry does not block the
//! others. `check` lists both kinds at once for `validate`.

mod raw;
mod template;

use std::collections::BTreeMap;
use std::path::Path;

use crate::checksum::Sha256Digest;
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::version::ReleaseVersion;

pub use template::expand_url_template;

/// One published archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEntry {
    /// Target triple exactly as written in the table.
    pub target: String,
    pub url: String,
    /// Raw digest text; validated by the locator.
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct ReleaseTable {
    name: String,
    binary: String,
    include_prereleases: bool,
    releases: BTreeMap<ReleaseVersion, BTreeMap<Platform, ReleaseEntry>>,
}

impl ReleaseTable {
    pub fn load(path: &Path) -> Result<Self> {
        let table = Self::from_raw(read_raw(path)?)?;
        tracing::debug!(
            path = %path.display(),
            name = %table.name,
            versions = table.releases.len(),
            "loaded release table"
        );
        Ok(table)
    }

    /// Collect every problem in the table at `path` without stopping at the
    /// first structural one. Only unreadable or unparsable files are errors.
    pub fn check(path: &Path) -> Result<TableCheck> {
        let raw = read_raw(path)?;
        let digests = raw
            .artifacts
            .iter()
            .enumerate()
            .filter_map(|(i, a)| {
                Sha256Digest::parse(&a.sha256).err().map(|reason| {
                    format!("{}: {}", artifact_label(i, &a.version, &a.target), reason)
                })
            })
            .collect();
        let (table, structural) = Self::build(raw);
        Ok(TableCheck {
            structural,
            digests,
            versions: table.releases.len(),
            archives: table.releases.values().map(BTreeMap::len).sum(),
        })
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let raw: raw::RawTable =
            toml::from_str(s).map_err(|e| Error::Config(format!("release table: {}", e)))?;
        Self::from_raw(raw)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let raw: raw::RawTable =
            serde_json::from_str(s).map_err(|e| Error::Config(format!("release table: {}", e)))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: raw::RawTable) -> Result<Self> {
        let (table, problems) = Self::build(raw);
        if !problems.is_empty() {
            return Err(Error::Config(problems.join("; ")));
        }
        Ok(table)
    }

    /// The usable entries plus every structural problem found on the way.
    fn build(raw: raw::RawTable) -> (Self, Vec<String>) {
        let mut problems = Vec::new();
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            problems.push("`name` must not be empty".to_string());
        }
        let binary = raw
            .binary
            .map(|b| b.trim().to_string())
            .unwrap_or_else(|| name.clone());
        if binary.is_empty() || binary.contains(['/', '\\']) {
            problems.push(format!("`binary` must be a plain file name, got `{}`", binary));
        }

        let mut releases: BTreeMap<ReleaseVersion, BTreeMap<Platform, ReleaseEntry>> =
            BTreeMap::new();
        for (i, a) in raw.artifacts.into_iter().enumerate() {
            let at = artifact_label(i, &a.version, &a.target);
            let version: ReleaseVersion = match a.version.parse() {
                Ok(v) => v,
                Err(e) => {
                    problems.push(format!("{}: {}", at, e));
                    continue;
                }
            };
            let platform: Platform = match a.target.parse() {
                Ok(p) => p,
                Err(e) => {
                    problems.push(format!("{}: {}", at, e));
                    continue;
                }
            };
            let url = match (a.url, raw.url_template.as_deref()) {
                (Some(u), _) => template::check_url(&u).map(|()| u),
                (None, Some(t)) => expand_url_template(t, &name, &binary, &version, &a.target),
                (None, None) => Err("no `url` and no `url_template`".to_string()),
            };
            let url = match url {
                Ok(u) => u,
                Err(e) => {
                    problems.push(format!("{}: {}", at, e));
                    continue;
                }
            };
            let by_platform = releases.entry(version).or_default();
            if let Some(existing) = by_platform.get(&platform) {
                problems.push(format!(
                    "{}: duplicate entry for {} (already listed as {})",
                    at, platform, existing.target
                ));
                continue;
            }
            by_platform.insert(
                platform,
                ReleaseEntry {
                    target: a.target,
                    url,
                    sha256: a.sha256,
                },
            );
        }

        let table = ReleaseTable {
            name,
            binary,
            include_prereleases: raw.include_prereleases,
            releases,
        };
        (table, problems)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executable name inside archives (before any platform `.exe` suffix).
    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn include_prereleases(&self) -> bool {
        self.include_prereleases
    }

    pub fn contains_version(&self, version: &ReleaseVersion) -> bool {
        self.releases.contains_key(version)
    }

    pub fn entry(&self, version: &ReleaseVersion, platform: Platform) -> Option<&ReleaseEntry> {
        self.releases.get(version)?.get(&platform)
    }

    /// All versions, newest first.
    pub fn versions(&self) -> impl Iterator<Item = &ReleaseVersion> {
        self.releases.keys().rev()
    }

    /// Versions with an archive for `platform`, newest first.
    pub fn versions_for(&self, platform: Platform) -> impl Iterator<Item = &ReleaseVersion> {
        self.releases
            .iter()
            .rev()
            .filter(move |(_, by_platform)| by_platform.contains_key(&platform))
            .map(|(v, _)| v)
    }

    pub fn platforms_for(&self, version: &ReleaseVersion) -> Vec<Platform> {
        self.releases
            .get(version)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Entries whose digest would be refused at lookup time.
    pub fn digest_problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (version, by_platform) in &self.releases {
            for entry in by_platform.values() {
                if let Err(reason) = Sha256Digest::parse(&entry.sha256) {
                    out.push(format!("{} {}: {}", version, entry.target, reason));
                }
            }
        }
        out
    }
}

/// Outcome of [`ReleaseTable::check`].
#[derive(Debug, Default)]
pub struct TableCheck {
    /// Problems that make [`ReleaseTable::load`] fail.
    pub structural: Vec<String>,
    /// Entries whose digest would be refused at lookup time.
    pub digests: Vec<String>,
    pub versions: usize,
    pub archives: usize,
}

impl TableCheck {
    pub fn is_clean(&self) -> bool {
        self.structural.is_empty() && self.digests.is_empty()
    }
}

fn artifact_label(index: usize, version: &str, target: &str) -> String {
    format!("artifact #{} ({} {})", index + 1, version, target)
}

fn read_raw(path: &Path) -> Result<raw::RawTable> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("read release table {}: {}", path.display(), e)))?;
    let is_json = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        serde_json::from_str(&data).map_err(|e| Error::Config(format!("release table: {}", e)))
    } else {
        toml::from_str(&data).map_err(|e| Error::Config(format!("release table: {}", e)))
    }
}
