use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, warn};

use crate::{CredentialError, CredentialSource};

/// Longest stderr excerpt carried in a refresh failure.
const STDERR_TAIL_BYTES: usize = 2000;

/// One browser cookie as exported by the login helper.
///
/// **Values are redacted in `Debug` output.**
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, rename = "httpOnly")]
    pub http_only: bool,
    /// Expiry as epoch seconds; absent or negative means a session cookie.
    #[serde(default)]
    pub expires: Option<f64>,
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("value", &"<REDACTED>")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("expires", &self.expires)
            .finish()
    }
}

impl Cookie {
    fn is_expired_at(&self, now_epoch: f64) -> bool {
        matches!(self.expires, Some(exp) if exp > 0.0 && exp <= now_epoch)
    }
}

/// Session material: the cookie jar replayed on every request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Credentials {
    pub cookies: Vec<Cookie>,
}

impl Credentials {
    pub fn new(cookies: Vec<Cookie>) -> Self {
        Self { cookies }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// `Cookie` request header value: `name=value; name2=value2`.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Drop cookies whose expiry has passed.
    pub fn without_expired(mut self, now_epoch: f64) -> Self {
        self.cookies.retain(|c| !c.is_expired_at(now_epoch));
        self
    }
}

/// Cookie jar stored as a JSON array on disk, renewed by running an
/// external login command that rewrites the file.
#[derive(Debug, Clone)]
pub struct CookieFileCredentials {
    cookie_file: PathBuf,
    refresh_command: Vec<String>,
    refresh_timeout: Duration,
}

impl CookieFileCredentials {
    pub fn new(
        cookie_file: impl AsRef<Path>,
        refresh_command: Vec<String>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            cookie_file: cookie_file.as_ref().to_path_buf(),
            refresh_command,
            refresh_timeout,
        }
    }

    pub fn cookie_file(&self) -> &Path {
        &self.cookie_file
    }
}

#[async_trait::async_trait]
impl CredentialSource for CookieFileCredentials {
    /// A missing, unreadable, empty, or fully expired jar is "no
    /// credentials", not an error: the caller's answer to both is a refresh.
    async fn load(&self) -> Result<Option<Credentials>, CredentialError> {
        let raw = match tokio::fs::read_to_string(&self.cookie_file).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %self.cookie_file.display(), "cookie file not found");
                return Ok(None);
            }
            Err(e) => {
                warn!(path = %self.cookie_file.display(), error = %e, "failed to read cookie file");
                return Ok(None);
            }
        };

        let cookies: Vec<Cookie> = match serde_json::from_str(&raw) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %self.cookie_file.display(), error = %e, "failed to parse cookie file");
                return Ok(None);
            }
        };

        let now = Utc::now().timestamp() as f64;
        let creds = Credentials::new(cookies).without_expired(now);
        if creds.is_empty() {
            warn!(path = %self.cookie_file.display(), "cookie file holds no usable cookies");
            return Ok(None);
        }
        Ok(Some(creds))
    }

    async fn refresh(&self) -> Result<(), CredentialError> {
        let (program, args) = match self.refresh_command.split_first() {
            Some(split) => split,
            None => {
                return Err(CredentialError::Unavailable(
                    "no refresh_command configured".to_string(),
                ))
            }
        };

        info!(program = %program, timeout_secs = self.refresh_timeout.as_secs_f64(), "running credential refresh");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = cmd.output();

        let output = match tokio::time::timeout(self.refresh_timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(CredentialError::Io(format!("spawn {program}: {e}"))),
            Err(_) => return Err(CredentialError::Timeout(self.refresh_timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CredentialError::Failed(format!(
                "{program} exited with {}: {}",
                output.status,
                tail(stderr.trim(), STDERR_TAIL_BYTES)
            )));
        }

        info!(path = %self.cookie_file.display(), "credentials refreshed");
        Ok(())
    }
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
