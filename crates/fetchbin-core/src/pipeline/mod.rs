//! Drives one install: resolve → fetch → verify → extract → install.
//!
//! Each stage consumes the previous stage's output, so a failure anywhere
//! stops the run and nothing later executes. All temporary state lives in a
//! scratch directory that is removed when the run ends, successful or not.

mod state;

use std::path::{Path, PathBuf};

use serde::Serialize;

pub use state::{PipelineError, PipelineState, Stage, StateSender};
use state::StateTracker;

use crate::cancel::CancelToken;
use crate::checksum::Sha256Digest;
use crate::error::{Error, Result};
use crate::extract;
use crate::fetch::{Fetch, HttpFetcher};
use crate::install::{InstallOutcome, Installer};
use crate::locator::{self, ArtifactDescriptor};
use crate::platform::{self, Platform};
use crate::release_table::ReleaseTable;
use crate::verify;
use crate::version::VersionRequest;

/// Where the executable should end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Exact file path.
    Path(PathBuf),
    /// Directory; the file name is the platform's executable name.
    BinDir(PathBuf),
}

impl Destination {
    pub fn resolve(&self, descriptor: &ArtifactDescriptor) -> PathBuf {
        match self {
            Destination::Path(p) => p.clone(),
            Destination::BinDir(dir) => dir.join(&descriptor.binary),
        }
    }
}

/// What a successful run did.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub descriptor: ArtifactDescriptor,
    pub destination: PathBuf,
    pub outcome: InstallOutcome,
    pub digest: Sha256Digest,
    pub bytes: u64,
    /// Entry the executable came from inside the archive.
    pub entry: String,
}

/// Resolve the platform (detected unless given) and locate the artifact.
pub fn resolve(
    table: &ReleaseTable,
    request: &VersionRequest,
    platform: Option<Platform>,
) -> Result<ArtifactDescriptor> {
    let platform = match platform {
        Some(p) => p,
        None => platform::identify()?,
    };
    locator::locate(table, request, platform)
}

pub struct Pipeline<F = HttpFetcher> {
    fetcher: F,
    installer: Installer,
    scratch_root: Option<PathBuf>,
    observer: Option<StateSender>,
}

impl<F: Fetch> Pipeline<F> {
    pub fn new(fetcher: F, installer: Installer) -> Self {
        Self {
            fetcher,
            installer,
            scratch_root: None,
            observer: None,
        }
    }

    /// Parent for the per-run scratch directory (default: system temp dir).
    pub fn with_scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(dir.into());
        self
    }

    /// Receive every state transition.
    pub fn with_observer(mut self, tx: StateSender) -> Self {
        self.observer = Some(tx);
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn run(
        &self,
        table: &ReleaseTable,
        request: &VersionRequest,
        platform: Option<Platform>,
        destination: &Destination,
        cancel: &CancelToken,
    ) -> std::result::Result<InstallReport, PipelineError> {
        let mut tracker = StateTracker::new(self.observer.clone());
        match self.drive(&mut tracker, table, request, platform, destination, cancel) {
            Ok(report) => {
                tracker.done();
                Ok(report)
            }
            Err(e) => Err(tracker.fail(e)),
        }
    }

    fn drive(
        &self,
        tracker: &mut StateTracker,
        table: &ReleaseTable,
        request: &VersionRequest,
        platform: Option<Platform>,
        destination: &Destination,
        cancel: &CancelToken,
    ) -> Result<InstallReport> {
        tracker.enter(Stage::Resolving);
        let descriptor = resolve(table, request, platform)?;
        let dest = destination.resolve(&descriptor);
        tracing::info!(
            name = %descriptor.name,
            version = %descriptor.version,
            target = %descriptor.target,
            dest = %dest.display(),
            "resolved artifact"
        );

        tracker.enter(Stage::Fetching);
        let scratch = self.scratch_dir()?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let downloaded = self.fetcher.fetch(&descriptor, scratch.path(), cancel)?;
        let bytes = downloaded.bytes();

        tracker.enter(Stage::Verifying);
        let verified = verify::verify(downloaded)?;
        let digest = verified.digest().clone();

        tracker.enter(Stage::Extracting);
        let payload = extract::extract(&verified)?;
        drop(verified);

        tracker.enter(Stage::Installing);
        let outcome = self.installer.install(&payload, &dest)?;
        let entry = payload.entry().to_string();
        drop(payload);
        drop(scratch);

        Ok(InstallReport {
            descriptor,
            destination: dest,
            outcome,
            digest,
            bytes,
            entry,
        })
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(".fetchbin-run-");
        match &self.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root)
                    .map_err(|e| Error::scratch(format!("create {}", root.display()), e))?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| Error::scratch("create scratch directory", e))
    }
}

/// Convenience for callers that only have a scratch path and a fetcher.
pub fn run_once<F: Fetch>(
    fetcher: F,
    installer: Installer,
    scratch_root: &Path,
    table: &ReleaseTable,
    request: &VersionRequest,
    platform: Option<Platform>,
    destination: &Destination,
) -> std::result::Result<InstallReport, PipelineError> {
    Pipeline::new(fetcher, installer)
        .with_scratch_root(scratch_root)
        .run(table, request, platform, destination, &CancelToken::new())
}
