//! Per-attempt fetch error, classified before conversion to the pipeline error.

use std::fmt;

/// Why one GET attempt failed.
#[derive(Debug)]
pub enum AttemptError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// Body ended before `Content-Length` bytes arrived.
    PartialTransfer { expected: u64, received: u64 },
    /// Writing the temp file failed (disk full, permissions). Not retried.
    Storage(std::io::Error),
    /// Cancel token was set mid-transfer. Not retried.
    Cancelled,
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Curl(e) => write!(f, "{}", e),
            AttemptError::Http(code) => write!(f, "HTTP {}", code),
            AttemptError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {} bytes, got {}", expected, received)
            }
            AttemptError::Storage(e) => write!(f, "storage: {}", e),
            AttemptError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for AttemptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttemptError::Curl(e) => Some(e),
            AttemptError::Storage(e) => Some(e),
            AttemptError::Http(_) | AttemptError::PartialTransfer { .. } | AttemptError::Cancelled => {
                None
            }
        }
    }
}
