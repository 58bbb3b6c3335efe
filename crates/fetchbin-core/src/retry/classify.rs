//! Classify HTTP status and curl errors into retry policy error kinds.

use super::error::AttemptError;
use super::policy::ErrorKind;

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        404 | 410 => ErrorKind::Missing,
        408 => ErrorKind::Timeout,
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
        || e.is_ssl_connect_error()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

/// Classify an attempt error into an ErrorKind.
pub fn classify(e: &AttemptError) -> ErrorKind {
    match e {
        AttemptError::Curl(ce) => classify_curl_error(ce),
        AttemptError::Http(code) => classify_http_status(*code),
        AttemptError::PartialTransfer { .. } => ErrorKind::Connection,
        AttemptError::Storage(_) | AttemptError::Cancelled => ErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_and_503_throttled() {
        assert_eq!(classify_http_status(429), ErrorKind::Throttled);
        assert_eq!(classify_http_status(503), ErrorKind::Throttled);
    }

    #[test]
    fn http_5xx_retryable() {
        assert!(matches!(classify_http_status(500), ErrorKind::Http5xx(500)));
        assert!(matches!(classify_http_status(502), ErrorKind::Http5xx(502)));
    }

    #[test]
    fn http_404_and_410_missing() {
        assert_eq!(classify_http_status(404), ErrorKind::Missing);
        assert_eq!(classify_http_status(410), ErrorKind::Missing);
        assert_eq!(classify_http_status(403), ErrorKind::Other);
    }

    #[test]
    fn short_body_is_retryable_cancel_is_not() {
        let short = AttemptError::PartialTransfer {
            expected: 10,
            received: 4,
        };
        assert_eq!(classify(&short), ErrorKind::Connection);
        assert_eq!(classify(&AttemptError::Cancelled), ErrorKind::Other);
    }
}
