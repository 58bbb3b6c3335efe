//! Fetch progress snapshots (bytes done, rate, ETA).
//!
//! The fetcher sends these over an optional tokio channel with `try_send`, so
//! a slow consumer drops snapshots instead of stalling the transfer.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FetchProgress {
    /// Bytes written to the temp file in the current attempt.
    pub bytes_done: u64,
    /// `Content-Length`, when the server sent one.
    pub total_bytes: Option<u64>,
    pub elapsed: Duration,
    /// 1-based attempt number.
    pub attempt: u32,
}

impl FetchProgress {
    /// Download rate in bytes per second (0 if no time has elapsed).
    pub fn bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / secs
    }

    /// Estimated seconds remaining (None without a total or a rate).
    pub fn eta_secs(&self) -> Option<f64> {
        let total = self.total_bytes?;
        let remaining = total.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0], if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total_bytes? {
            0 => Some(1.0),
            total => Some((self.bytes_done as f64 / total as f64).min(1.0)),
        }
    }
}

pub type ProgressSender = tokio::sync::mpsc::Sender<FetchProgress>;

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(done: u64, total: Option<u64>, secs: u64) -> FetchProgress {
        FetchProgress {
            bytes_done: done,
            total_bytes: total,
            elapsed: Duration::from_secs(secs),
            attempt: 1,
        }
    }

    #[test]
    fn rate_and_eta() {
        let p = snap(500, Some(1000), 5);
        assert!((p.bytes_per_sec() - 100.0).abs() < 1e-9);
        assert!((p.eta_secs().unwrap() - 5.0).abs() < 1e-9);
        assert!((p.fraction().unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn unknown_total() {
        let p = snap(500, None, 5);
        assert!(p.eta_secs().is_none());
        assert!(p.fraction().is_none());
    }

    #[test]
    fn zero_elapsed_has_no_rate() {
        let p = snap(10, Some(100), 0);
        assert_eq!(p.bytes_per_sec(), 0.0);
        assert!(p.eta_secs().is_none());
    }
}
