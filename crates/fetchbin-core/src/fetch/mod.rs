//! Fetcher: GET the archive into a scratch temp file with retry and cancel.
//!
//! The download never touches the destination. The temp file is removed when
//! the returned `DownloadedArtifact` (or anything it becomes) is dropped, and
//! immediately on failure or cancellation.

mod http;

use std::path::Path;

use tempfile::TempPath;

use crate::cancel::CancelToken;
use crate::config::{FetchbinConfig, NetworkConfig};
use crate::error::{Error, Result};
use crate::locator::ArtifactDescriptor;
use crate::progress::ProgressSender;
use crate::retry::{self, AttemptError, ErrorKind, RetryPolicy};

/// An archive on disk whose digest has not been checked yet.
///
/// Holding one grants no trust: only `verify::verify` turns it into
/// something the extractor accepts.
#[derive(Debug)]
pub struct DownloadedArtifact {
    descriptor: ArtifactDescriptor,
    path: TempPath,
    bytes: u64,
}

impl DownloadedArtifact {
    /// Wrap a temp file holding the bytes fetched for `descriptor`.
    pub fn new(descriptor: ArtifactDescriptor, path: TempPath, bytes: u64) -> Self {
        Self {
            descriptor,
            path,
            bytes,
        }
    }

    pub fn descriptor(&self) -> &ArtifactDescriptor {
        &self.descriptor
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub(crate) fn into_parts(self) -> (ArtifactDescriptor, TempPath, u64) {
        (self.descriptor, self.path, self.bytes)
    }
}

/// Source of archive bytes. `HttpFetcher` is the real one; tests and
/// embedders may provide others.
pub trait Fetch {
    fn fetch(
        &self,
        descriptor: &ArtifactDescriptor,
        scratch_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<DownloadedArtifact>;
}

/// Transfer and retry settings for `HttpFetcher`.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub retry: RetryPolicy,
    pub network: NetworkConfig,
    /// Permit `http://` URLs (loopback testing, internal mirrors).
    pub allow_http: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            network: NetworkConfig::default(),
            allow_http: false,
        }
    }
}

impl From<&FetchbinConfig> for FetchOptions {
    fn from(cfg: &FetchbinConfig) -> Self {
        Self {
            retry: cfg.retry_policy(),
            network: cfg.network.clone(),
            allow_http: cfg.allow_http,
        }
    }
}

/// libcurl-backed fetcher.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    options: FetchOptions,
    progress: Option<ProgressSender>,
}

impl HttpFetcher {
    pub fn new(options: FetchOptions) -> Self {
        Self {
            options,
            progress: None,
        }
    }

    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    fn check_scheme(&self, url: &str) -> Result<()> {
        let parsed = url::Url::parse(url).map_err(|e| Error::Config(format!("invalid url {}: {}", url, e)))?;
        match parsed.scheme() {
            "https" => Ok(()),
            "http" if self.options.allow_http => Ok(()),
            _ => Err(Error::InsecureUrl(url.to_string())),
        }
    }
}

impl Fetch for HttpFetcher {
    fn fetch(
        &self,
        descriptor: &ArtifactDescriptor,
        scratch_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<DownloadedArtifact> {
        let url = descriptor.url.as_str();
        self.check_scheme(url)?;

        let result = retry::run_with_retry(&self.options.retry, cancel, |attempt| {
            http::get_to_temp(
                url,
                scratch_dir,
                &self.options.network,
                cancel,
                self.progress.as_ref(),
                attempt,
            )
        });

        match result {
            Ok((path, bytes)) => {
                tracing::info!(url, bytes, "fetched artifact");
                Ok(DownloadedArtifact::new(descriptor.clone(), path, bytes))
            }
            Err((e, attempts)) => {
                let err = map_attempt_error(url, e, attempts);
                tracing::warn!(url, attempts, "fetch failed: {}", err);
                Err(err)
            }
        }
    }
}

/// Final (post-retry) attempt error → pipeline error.
fn map_attempt_error(url: &str, e: AttemptError, attempts: u32) -> Error {
    let kind = retry::classify(&e);
    match e {
        AttemptError::Cancelled => Error::Cancelled,
        AttemptError::Storage(source) => Error::scratch("write temp download", source),
        AttemptError::Http(status) if kind == ErrorKind::Missing => Error::NotFound {
            url: url.to_string(),
            status,
        },
        AttemptError::Http(status) if !kind.is_transient() => Error::HttpStatus {
            url: url.to_string(),
            status,
        },
        other => Error::NetworkError {
            url: url.to_string(),
            message: format!("{} (after {} attempt(s))", other, attempts),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let url = "https://example.com/yo.tar.gz";
        assert!(matches!(
            map_attempt_error(url, AttemptError::Http(404), 1),
            Error::NotFound { status: 404, .. }
        ));
        assert!(matches!(
            map_attempt_error(url, AttemptError::Http(403), 1),
            Error::HttpStatus { status: 403, .. }
        ));
        assert!(matches!(
            map_attempt_error(url, AttemptError::Http(503), 5),
            Error::NetworkError { .. }
        ));
        assert!(matches!(
            map_attempt_error(url, AttemptError::Cancelled, 1),
            Error::Cancelled
        ));
    }

    #[test]
    fn plain_http_refused_by_default() {
        let f = HttpFetcher::default();
        assert!(matches!(
            f.check_scheme("http://example.com/yo.tar.gz"),
            Err(Error::InsecureUrl(_))
        ));
        assert!(f.check_scheme("https://example.com/yo.tar.gz").is_ok());

        let f = HttpFetcher::new(FetchOptions {
            allow_http: true,
            ..FetchOptions::default()
        });
        assert!(f.check_scheme("http://127.0.0.1:9/yo.tar.gz").is_ok());
    }
}
