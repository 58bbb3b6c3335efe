use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of fetch attempts (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    /// Out-of-range base delays are clamped to `max_delay`.
    pub fn policy(&self) -> RetryPolicy {
        let max_delay = Duration::from_secs(self.max_delay_secs);
        let base_delay = Duration::try_from_secs_f64(self.base_delay_secs.max(0.0))
            .unwrap_or(max_delay)
            .min(max_delay);
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_delay_secs.is_finite() || self.base_delay_secs < 0.0 {
            anyhow::bail!(
                "retry.base_delay_secs must be a non-negative number of seconds, got {}",
                self.base_delay_secs
            );
        }
        Ok(())
    }
}

/// libcurl transfer limits for the artifact GET.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: u64,
    /// Whole-transfer timeout.
    pub timeout_secs: u64,
    /// Abort when slower than this many bytes/sec for `low_speed_time_secs`.
    pub low_speed_limit_bytes: u32,
    pub low_speed_time_secs: u64,
    pub max_redirections: u32,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 600,
            low_speed_limit_bytes: 1024,
            low_speed_time_secs: 60,
            max_redirections: 10,
            user_agent: concat!("fetchbin/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// What a second installer does when the destination lock is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockContention {
    /// Block until the other install finishes.
    #[default]
    Wait,
    /// Fail immediately with `InstallInProgress`.
    Fail,
}

/// Global configuration loaded from `~/.config/fetchbin/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchbinConfig {
    /// Directory `install` places binaries in when no destination is given.
    /// Defaults to `~/.local/bin`.
    #[serde(default)]
    pub bin_dir: Option<PathBuf>,
    /// Permission bits for installed executables.
    #[serde(default = "default_file_mode")]
    pub file_mode: u32,
    #[serde(default)]
    pub lock_contention: LockContention,
    /// Permit plain-HTTP artifact URLs. Off by default.
    #[serde(default)]
    pub allow_http: bool,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub network: NetworkConfig,
}

fn default_file_mode() -> u32 {
    0o755
}

impl Default for FetchbinConfig {
    fn default() -> Self {
        Self {
            bin_dir: None,
            file_mode: default_file_mode(),
            lock_contention: LockContention::default(),
            allow_http: false,
            retry: None,
            network: NetworkConfig::default(),
        }
    }
}

impl FetchbinConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().policy()
    }

    /// `bin_dir` if set, else `~/.local/bin`.
    pub fn resolved_bin_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.bin_dir {
            return Ok(dir.clone());
        }
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .ok_or_else(|| anyhow::anyhow!("cannot determine home directory; set bin_dir in config"))?;
        Ok(PathBuf::from(home).join(".local").join("bin"))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fetchbin")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FetchbinConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FetchbinConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: FetchbinConfig = toml::from_str(&data)?;
    if let Some(retry) = &cfg.retry {
        retry
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
    }
    Ok(cfg)
}
