//! Error taxonomy for the resolve → fetch → verify → extract → install pipeline.
//!
//! Each stage returns the most specific variant it can; the pipeline driver
//! passes them through unchanged. `exit_code` gives the CLI a stable failure
//! class to exit with.

use std::path::PathBuf;

use crate::platform::Platform;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Running (or requested) OS/arch has no mapping, or the table has no
    /// archive for it at the requested version.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("unknown version: {0}")]
    UnknownVersion(String),

    /// Table entry carries an empty, malformed or placeholder digest.
    #[error("invalid digest for {context}: {reason}")]
    InvalidDigest { context: String, reason: String },

    /// Release table or configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transient network failure; only returned after retries are exhausted.
    #[error("network error fetching {url}: {message}")]
    NetworkError { url: String, message: String },

    #[error("not found: {url} returned HTTP {status}")]
    NotFound { url: String, status: u32 },

    /// Non-retryable, non-404 HTTP status.
    #[error("GET {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u32 },

    #[error("refusing non-HTTPS url: {0}")]
    InsecureUrl(String),

    #[error("fetch cancelled")]
    Cancelled,

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("corrupt archive {path}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("executable `{binary}` not found in {path}")]
    PayloadNotFound { path: PathBuf, binary: String },

    #[error("unsafe archive entry `{entry}`: {reason}")]
    UnsafeArchiveEntry { entry: String, reason: String },

    #[error("install to {path} failed: {message}")]
    InstallError {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("another install into {0} is in progress")]
    InstallInProgress(PathBuf),

    /// Scratch-directory I/O outside the destination (temp download, staging).
    #[error("{context}: {source}")]
    Scratch {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn install_io(path: &std::path::Path, message: impl Into<String>, e: std::io::Error) -> Self {
        Error::InstallError {
            path: path.to_path_buf(),
            message: message.into(),
            source: Some(e),
        }
    }

    pub(crate) fn scratch(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Scratch {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn unsupported(platform: &Platform, detail: impl std::fmt::Display) -> Self {
        Error::UnsupportedPlatform(format!("{} ({})", platform, detail))
    }

    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::InvalidDigest { .. } => 2,
            Error::UnsupportedPlatform(_) => 3,
            Error::UnknownVersion(_) => 4,
            Error::NetworkError { .. }
            | Error::NotFound { .. }
            | Error::HttpStatus { .. }
            | Error::InsecureUrl(_) => 5,
            Error::ChecksumMismatch { .. } => 6,
            Error::CorruptArchive { .. }
            | Error::PayloadNotFound { .. }
            | Error::UnsafeArchiveEntry { .. } => 7,
            Error::InstallError { .. } | Error::InstallInProgress(_) => 8,
            Error::Scratch { .. } => 1,
            Error::Cancelled => 130,
        }
    }
}
