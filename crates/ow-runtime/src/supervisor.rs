use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use ow_schemas::OrderState;
use ow_session::{CredentialSource, Credentials, SessionFactory};

use crate::poll::{LoopError, PollLoop};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Mandatory wait between a failed session and the next attempt.
    pub retry_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// Shutdown was requested; the last session (if any) was torn down.
    Stopped { restarts: u64 },
}

/// How one session attempt ended.
enum Attempt {
    Cancelled,
    /// No usable credentials even after a refresh.
    NoCredentials(String),
    /// Establish failed or the poll loop hit a fatal session error.
    SessionFailed(String),
    Persistence(anyhow::Error),
}

/// Owns the session lifecycle. The [`OrderState`] passed to [`run`] is the
/// single in-memory copy and survives every restart unchanged except by
/// the poll loop itself.
///
/// [`run`]: Supervisor::run
pub struct Supervisor {
    cfg: SupervisorConfig,
    factory: Box<dyn SessionFactory>,
    credentials: Box<dyn CredentialSource>,
    poll_loop: PollLoop,
    restarts: u64,
}

impl Supervisor {
    pub fn new(
        cfg: SupervisorConfig,
        factory: Box<dyn SessionFactory>,
        credentials: Box<dyn CredentialSource>,
        poll_loop: PollLoop,
    ) -> Self {
        Self {
            cfg,
            factory,
            credentials,
            poll_loop,
            restarts: 0,
        }
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    /// Run sessions back to back until `shutdown` fires.
    ///
    /// Returns `Err` only for persistence failures; every session-level
    /// failure is absorbed by tearing down, refreshing credentials, waiting
    /// `retry_delay`, and starting over.
    pub async fn run(
        &mut self,
        state: &mut OrderState,
        shutdown: &CancellationToken,
    ) -> anyhow::Result<SupervisorExit> {
        loop {
            if shutdown.is_cancelled() {
                return Ok(self.stopped());
            }

            match self.attempt(state, shutdown).await {
                Attempt::Cancelled => return Ok(self.stopped()),
                Attempt::Persistence(e) => {
                    error!(error = %format!("{e:#}"), "persistence failure; stopping watcher");
                    return Err(e.context("watcher stopped on persistence failure"));
                }
                Attempt::NoCredentials(reason) => {
                    self.restarts += 1;
                    error!(restarts = self.restarts, reason = %reason, "no usable credentials");
                }
                Attempt::SessionFailed(reason) => {
                    self.restarts += 1;
                    error!(
                        restarts = self.restarts,
                        reason = %reason,
                        "session failed; refreshing credentials before restart"
                    );
                    let refreshed = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => return Ok(self.stopped()),
                        r = self.credentials.refresh() => r,
                    };
                    if let Err(e) = refreshed {
                        error!(error = %e, "credential refresh failed");
                    }
                }
            }

            info!(
                delay_ms = self.cfg.retry_delay.as_millis() as u64,
                "waiting before restart"
            );
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(self.stopped()),
                _ = tokio::time::sleep(self.cfg.retry_delay) => {}
            }
        }
    }

    fn stopped(&self) -> SupervisorExit {
        info!(restarts = self.restarts, "watcher stopped");
        SupervisorExit::Stopped {
            restarts: self.restarts,
        }
    }

    async fn attempt(&mut self, state: &mut OrderState, shutdown: &CancellationToken) -> Attempt {
        let creds = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Attempt::Cancelled,
            r = self.acquire_credentials() => r,
        };
        let creds = match creds {
            Ok(c) => c,
            Err(reason) => return Attempt::NoCredentials(reason),
        };

        let session_id = Uuid::new_v4();
        let span = info_span!("session", session_id = %session_id);
        self.run_session(&creds, state, shutdown)
            .instrument(span)
            .await
    }

    async fn run_session(
        &mut self,
        creds: &Credentials,
        state: &mut OrderState,
        shutdown: &CancellationToken,
    ) -> Attempt {
        let established = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Attempt::Cancelled,
            r = self.factory.establish(creds) => r,
        };
        let mut session = match established {
            Ok(s) => s,
            Err(e) => return Attempt::SessionFailed(e.to_string()),
        };
        info!(open = state.open_orders.len(), "session established");

        let result = self.poll_loop.run(session.as_mut(), state, shutdown).await;
        session.teardown().await;
        info!("session torn down");

        match result {
            Ok(()) => Attempt::Cancelled,
            Err(LoopError::Fatal(e)) => Attempt::SessionFailed(e.to_string()),
            Err(LoopError::Persistence(e)) => Attempt::Persistence(e),
        }
    }

    /// Stored credentials, or one refresh and a second look.
    async fn acquire_credentials(&self) -> Result<Credentials, String> {
        match self.credentials.load().await {
            Ok(Some(c)) => return Ok(c),
            Ok(None) => warn!("no stored credentials; refreshing"),
            Err(e) => warn!(error = %e, "credential load failed; refreshing"),
        }
        self.credentials.refresh().await.map_err(|e| e.to_string())?;
        match self.credentials.load().await {
            Ok(Some(c)) => Ok(c),
            Ok(None) => Err("still no usable credentials after refresh".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}
