//! Session boundary for the order watcher.
//!
//! This crate defines the collaborator contracts the runtime depends on:
//! - [`Session`]: an authenticated context that can fetch a JSON snapshot
//! - [`SessionFactory`]: builds a session from [`Credentials`]
//! - [`CredentialSource`]: loads credentials and refreshes them when stale
//!
//! plus one concrete implementation of each (`reqwest` over a replayed
//! cookie jar, and a cookie file refreshed by an operator-supplied login
//! command). The runtime only ever sees the traits.

mod credentials;
mod http;

use std::fmt;
use std::time::Duration;

use serde_json::Value;

pub use credentials::{Cookie, CookieFileCredentials, Credentials};
pub use http::{classify_status, HttpSession, HttpSessionFactory};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single snapshot fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Skip this cycle and try again next tick (timeout, 5xx, bad body).
    Transient(String),
    /// The session itself is unusable (rejected credentials, dead transport).
    Fatal(String),
}

impl FetchError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Fatal(_))
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transient(msg) => write!(f, "transient fetch error: {msg}"),
            FetchError::Fatal(msg) => write!(f, "fatal session error: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Failure to establish a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Upstream refused the credentials.
    Rejected(String),
    /// Could not reach upstream or build the transport.
    Transport(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Rejected(msg) => write!(f, "session rejected: {msg}"),
            SessionError::Transport(msg) => write!(f, "session transport error: {msg}"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Failure to load or refresh credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// No refresh procedure is configured.
    Unavailable(String),
    /// The refresh procedure ran and reported failure.
    Failed(String),
    /// The refresh procedure did not finish in time and was killed.
    Timeout(Duration),
    /// Reading or launching failed at the OS level.
    Io(String),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::Unavailable(msg) => write!(f, "credential refresh unavailable: {msg}"),
            CredentialError::Failed(msg) => write!(f, "credential refresh failed: {msg}"),
            CredentialError::Timeout(d) => {
                write!(f, "credential refresh timed out after {}s", d.as_secs_f64())
            }
            CredentialError::Io(msg) => write!(f, "credential io error: {msg}"),
        }
    }
}

impl std::error::Error for CredentialError {}

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// An authenticated context able to fetch the open-trades snapshot.
#[async_trait::async_trait]
pub trait Session: Send {
    /// Fetch `url` and return the decoded JSON body.
    async fn fetch_snapshot(&mut self, url: &str) -> Result<Value, FetchError>;

    /// Release transport resources. Called exactly once before the session
    /// is dropped, including on the restart path.
    async fn teardown(&mut self);
}

/// Builds sessions. Object-safe so the supervisor can hold a `Box<dyn SessionFactory>`.
#[async_trait::async_trait]
pub trait SessionFactory: Send + Sync {
    async fn establish(&self, credentials: &Credentials) -> Result<Box<dyn Session>, SessionError>;
}

/// Session material plus the capability to renew it.
#[async_trait::async_trait]
pub trait CredentialSource: Send + Sync {
    /// Currently stored credentials; `Ok(None)` when there are none usable.
    async fn load(&self) -> Result<Option<Credentials>, CredentialError>;

    /// Renew stored credentials. May block on manual interaction.
    async fn refresh(&self) -> Result<(), CredentialError>;
}
