use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info};

use crate::{Credentials, FetchError, Session, SessionError, SessionFactory};

/// Map a non-success HTTP status to a fetch error.
///
/// 401/403 mean the cookies were refused: the session is dead and only a
/// credential refresh can help. Anything else is treated as a hiccup.
pub fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Some(FetchError::Fatal(format!(
            "http status {} (session rejected)",
            status.as_u16()
        )));
    }
    Some(FetchError::Transient(format!("http status {}", status.as_u16())))
}

/// Builds [`HttpSession`]s that replay the stored cookie jar.
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    landing_url: Option<String>,
    request_timeout: Duration,
}

impl HttpSessionFactory {
    pub fn new(landing_url: Option<String>, request_timeout: Duration) -> Self {
        Self {
            landing_url,
            request_timeout,
        }
    }

    fn build_client(&self, credentials: &Credentials) -> Result<reqwest::Client, SessionError> {
        let mut headers = HeaderMap::new();
        let mut cookie = HeaderValue::from_str(&credentials.cookie_header())
            .map_err(|e| SessionError::Transport(format!("invalid cookie header: {e}")))?;
        cookie.set_sensitive(true);
        headers.insert(COOKIE, cookie);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| SessionError::Transport(format!("build http client: {e}")))
    }
}

#[async_trait::async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn establish(&self, credentials: &Credentials) -> Result<Box<dyn Session>, SessionError> {
        let client = self.build_client(credentials)?;

        if let Some(url) = &self.landing_url {
            info!(url = %url, "opening landing page");
            let resp = client
                .get(url)
                .send()
                .await
                .map_err(|e| SessionError::Transport(format!("landing page request failed: {e}")))?;
            let status = resp.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(SessionError::Rejected(format!(
                    "landing page returned {}",
                    status.as_u16()
                )));
            }
            if !status.is_success() {
                return Err(SessionError::Transport(format!(
                    "landing page returned {}",
                    status.as_u16()
                )));
            }
        }

        Ok(Box::new(HttpSession {
            client: Some(client),
        }))
    }
}

/// Cookie-authenticated HTTP session.
pub struct HttpSession {
    client: Option<reqwest::Client>,
}

#[async_trait::async_trait]
impl Session for HttpSession {
    async fn fetch_snapshot(&mut self, url: &str) -> Result<Value, FetchError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| FetchError::Fatal("session already torn down".to_string()))?;

        let resp = client.get(url).send().await.map_err(|e| {
            debug!(timeout = e.is_timeout(), error = %e, "snapshot request failed");
            FetchError::Transient(format!("request failed: {e}"))
        })?;

        if let Some(err) = classify_status(resp.status()) {
            return Err(err);
        }

        resp.json::<Value>()
            .await
            .map_err(|e| FetchError::Transient(format!("response json decode failed: {e}")))
    }

    async fn teardown(&mut self) {
        if self.client.take().is_some() {
            debug!("http session torn down");
        }
    }
}

// -----------------
// Tests (no network)
// -----------------
