use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Restarts are never closer together than this.
pub const MIN_RETRY_DELAY_SECONDS: f64 = 1.0;

/// Typed view of the merged configuration. Built once at startup and split
/// into per-component pieces; nothing reads config globally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Open-trades endpoint polled every cycle.
    pub snapshot_url: String,
    /// Page fetched once when a session is established, to prove the
    /// cookies are accepted before polling starts.
    #[serde(default)]
    pub landing_url: Option<String>,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: f64,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: f64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval_seconds(),
            retry_delay_seconds: default_retry_delay_seconds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_opened_log")]
    pub opened_log: PathBuf,
    #[serde(default = "default_closed_log")]
    pub closed_log: PathBuf,
    #[serde(default = "default_latest_file")]
    pub latest_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            opened_log: default_opened_log(),
            closed_log: default_closed_log(),
            latest_file: default_latest_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_cookie_file")]
    pub cookie_file: PathBuf,
    /// argv of the login helper that rewrites `cookie_file`. Empty means
    /// credentials cannot be refreshed automatically.
    #[serde(default)]
    pub refresh_command: Vec<String>,
    #[serde(default = "default_refresh_timeout_seconds")]
    pub refresh_timeout_seconds: f64,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            cookie_file: default_cookie_file(),
            refresh_command: Vec::new(),
            refresh_timeout_seconds: default_refresh_timeout_seconds(),
        }
    }
}

fn default_request_timeout_seconds() -> f64 {
    10.0
}
fn default_poll_interval_seconds() -> f64 {
    0.3
}
fn default_retry_delay_seconds() -> f64 {
    10.0
}
fn default_state_file() -> PathBuf {
    PathBuf::from("state.json")
}
fn default_opened_log() -> PathBuf {
    PathBuf::from("orders_log.jsonl")
}
fn default_closed_log() -> PathBuf {
    PathBuf::from("orders_closed.jsonl")
}
fn default_latest_file() -> PathBuf {
    PathBuf::from("latest.json")
}
fn default_cookie_file() -> PathBuf {
    PathBuf::from("cookies.json")
}
fn default_refresh_timeout_seconds() -> f64 {
    300.0
}

impl WatchConfig {
    /// Deserialize from the merged config document and validate.
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: WatchConfig = serde_json::from_value(config_json.clone())
            .context("config does not match the watcher schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        check_url("/source/snapshot_url", &self.source.snapshot_url)?;
        if let Some(url) = &self.source.landing_url {
            check_url("/source/landing_url", url)?;
        }
        check_seconds(
            "/source/request_timeout_seconds",
            self.source.request_timeout_seconds,
            0.0,
        )?;
        check_seconds(
            "/polling/poll_interval_seconds",
            self.polling.poll_interval_seconds,
            0.0,
        )?;
        // A zero or tiny restart delay turns a dead session into a
        // credential-refresh storm.
        let retry = self.polling.retry_delay_seconds;
        if !retry.is_finite() || retry < MIN_RETRY_DELAY_SECONDS {
            bail!(
                "CONFIG_INVALID /polling/retry_delay_seconds={} must be >= {}",
                retry,
                MIN_RETRY_DELAY_SECONDS
            );
        }
        check_seconds(
            "/credentials/refresh_timeout_seconds",
            self.credentials.refresh_timeout_seconds,
            0.0,
        )?;
        if self
            .credentials
            .refresh_command
            .first()
            .is_some_and(|prog| prog.trim().is_empty())
        {
            bail!("CONFIG_INVALID /credentials/refresh_command program must not be empty");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        secs(self.polling.poll_interval_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        secs(self.polling.retry_delay_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        secs(self.source.request_timeout_seconds)
    }

    pub fn refresh_timeout(&self) -> Duration {
        secs(self.credentials.refresh_timeout_seconds)
    }
}

/// Values are validated before use; anything unrepresentable collapses to zero.
fn secs(v: f64) -> Duration {
    Duration::try_from_secs_f64(v).unwrap_or(Duration::ZERO)
}

fn check_url(ptr: &str, url: &str) -> Result<()> {
    let u = url.trim();
    if !(u.starts_with("https://") || u.starts_with("http://")) {
        bail!("CONFIG_INVALID {ptr} must be an http(s) URL, got {u:?}");
    }
    Ok(())
}

fn check_seconds(ptr: &str, v: f64, exclusive_min: f64) -> Result<()> {
    if !v.is_finite() || v <= exclusive_min || Duration::try_from_secs_f64(v).is_err() {
        bail!("CONFIG_INVALID {ptr}={v} must be a finite number of seconds > {exclusive_min}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_fill_everything_but_the_url() {
        let cfg = WatchConfig::from_json(&json!({
            "source": {"snapshot_url": "https://example.test/open-trades/"}
        }))
        .unwrap();
        assert_eq!(cfg.poll_interval(), Duration::from_millis(300));
        assert_eq!(cfg.retry_delay(), Duration::from_secs(10));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.refresh_timeout(), Duration::from_secs(300));
        assert_eq!(cfg.storage.state_file, PathBuf::from("state.json"));
        assert_eq!(cfg.storage.opened_log, PathBuf::from("orders_log.jsonl"));
        assert_eq!(cfg.storage.closed_log, PathBuf::from("orders_closed.jsonl"));
        assert_eq!(cfg.storage.latest_file, PathBuf::from("latest.json"));
        assert!(cfg.credentials.refresh_command.is_empty());
    }

    #[test]
    fn missing_source_is_an_error() {
        assert!(WatchConfig::from_json(&json!({})).is_err());
    }
}
