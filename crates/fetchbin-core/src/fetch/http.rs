//! One GET attempt with libcurl, streamed into a fresh scratch temp file.

use std::cell::{Cell, RefCell};
use std::io::Write;
use std::path::Path;
use std::str;
use std::time::{Duration, Instant};

use tempfile::TempPath;

use crate::cancel::CancelToken;
use crate::config::NetworkConfig;
use crate::progress::{FetchProgress, ProgressSender};
use crate::retry::AttemptError;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Download `url` into a new temp file under `scratch_dir`. The file is
/// deleted on any error (the `NamedTempFile` is dropped).
pub(super) fn get_to_temp(
    url: &str,
    scratch_dir: &Path,
    net: &NetworkConfig,
    cancel: &CancelToken,
    progress: Option<&ProgressSender>,
    attempt: u32,
) -> Result<(TempPath, u64), AttemptError> {
    let file = tempfile::Builder::new()
        .prefix(".fetchbin-")
        .suffix(".download")
        .tempfile_in(scratch_dir)
        .map_err(AttemptError::Storage)?;

    let written = Cell::new(0u64);
    let content_length: Cell<Option<u64>> = Cell::new(None);
    let write_err: RefCell<Option<std::io::Error>> = RefCell::new(None);
    let started = Instant::now();
    let last_report = Cell::new(started);

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(AttemptError::Curl)?;
    configure(&mut easy, net).map_err(AttemptError::Curl)?;

    let performed = {
        let mut out = file.as_file();
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(line) = str::from_utf8(data) {
                    observe_header(line, &content_length);
                }
                true
            })
            .map_err(AttemptError::Curl)?;
        transfer
            .write_function(|data| {
                if cancel.is_cancelled() {
                    return Ok(0); // abort transfer
                }
                if let Err(e) = out.write_all(data) {
                    tracing::warn!("temp download write failed: {}", e);
                    *write_err.borrow_mut() = Some(e);
                    return Ok(0);
                }
                let done = written.get() + data.len() as u64;
                written.set(done);
                if let Some(tx) = progress {
                    let now = Instant::now();
                    if now.duration_since(last_report.get()) >= PROGRESS_INTERVAL {
                        last_report.set(now);
                        let _ = tx.try_send(FetchProgress {
                            bytes_done: done,
                            total_bytes: content_length.get(),
                            elapsed: now.duration_since(started),
                            attempt,
                        });
                    }
                }
                Ok(data.len())
            })
            .map_err(AttemptError::Curl)?;
        transfer
            .progress_function(|_, _, _, _| !cancel.is_cancelled())
            .map_err(AttemptError::Curl)?;
        transfer.perform()
    };

    if cancel.is_cancelled() {
        return Err(AttemptError::Cancelled);
    }
    if let Some(e) = write_err.into_inner() {
        return Err(AttemptError::Storage(e));
    }
    performed.map_err(AttemptError::Curl)?;

    let code = easy.response_code().map_err(AttemptError::Curl)?;
    if !(200..300).contains(&code) {
        return Err(AttemptError::Http(code));
    }

    let received = written.get();
    if let Some(expected) = content_length.get() {
        if received != expected {
            return Err(AttemptError::PartialTransfer { expected, received });
        }
    }

    file.as_file().sync_all().map_err(AttemptError::Storage)?;
    if let Some(tx) = progress {
        let _ = tx.try_send(FetchProgress {
            bytes_done: received,
            total_bytes: content_length.get().or(Some(received)),
            elapsed: started.elapsed(),
            attempt,
        });
    }
    Ok((file.into_temp_path(), received))
}

fn configure(easy: &mut curl::easy::Easy, net: &NetworkConfig) -> Result<(), curl::Error> {
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(net.max_redirections)?;
    easy.useragent(&net.user_agent)?;
    easy.connect_timeout(Duration::from_secs(net.connect_timeout_secs))?;
    easy.timeout(Duration::from_secs(net.timeout_secs))?;
    easy.low_speed_limit(net.low_speed_limit_bytes)?;
    easy.low_speed_time(Duration::from_secs(net.low_speed_time_secs))?;
    // progress callbacks drive cancellation while the body is stalled
    easy.progress(true)?;
    Ok(())
}

/// Track `Content-Length` of the final response; a status line starts a new
/// response (redirect hops each send their own headers).
fn observe_header(line: &str, content_length: &Cell<Option<u64>>) {
    let line = line.trim_end();
    if line.starts_with("HTTP/") {
        content_length.set(None);
        return;
    }
    if let Some((name, value)) = line.split_once(':') {
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length.set(value.trim().parse().ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_resets_per_response() {
        let cl = Cell::new(None);
        observe_header("HTTP/1.1 302 Found\r\n", &cl);
        observe_header("Content-Length: 0\r\n", &cl);
        assert_eq!(cl.get(), Some(0));
        observe_header("HTTP/1.1 200 OK\r\n", &cl);
        assert_eq!(cl.get(), None);
        observe_header("content-length: 4096\r\n", &cl);
        assert_eq!(cl.get(), Some(4096));
    }

    #[test]
    fn malformed_content_length_ignored() {
        let cl = Cell::new(Some(5));
        observe_header("Content-Length: lots", &cl);
        assert_eq!(cl.get(), None);
    }
}
