//! Scripted collaborators for exercising the runtime without a network.
//!
//! Every fake writes into a shared [`CallLog`] stamped with
//! `tokio::time::Instant`, so tests running on paused time can assert both
//! call order and the delays between calls.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use ow_session::{
    Cookie, CredentialError, CredentialSource, Credentials, FetchError, Session, SessionError,
    SessionFactory,
};

/// One scripted answer to `fetch_snapshot`.
#[derive(Debug, Clone)]
pub enum Step {
    Snapshot(Value),
    Transient(String),
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    Load,
    Refresh,
    /// `session` is the 1-based establish attempt number.
    Establish { session: usize },
    Fetch { session: usize },
    Teardown { session: usize },
}

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub at: Instant,
    pub kind: CallKind,
}

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<CallRecord>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, kind: CallKind) {
        let rec = CallRecord {
            at: Instant::now(),
            kind,
        };
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(rec);
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn kinds(&self) -> Vec<CallKind> {
        self.records().into_iter().map(|r| r.kind).collect()
    }

    /// First record matching `kind`.
    pub fn first(&self, kind: &CallKind) -> Option<CallRecord> {
        self.records().into_iter().find(|r| &r.kind == kind)
    }

    pub fn count(&self, pred: impl Fn(&CallKind) -> bool) -> usize {
        self.records().iter().filter(|r| pred(&r.kind)).count()
    }
}

/// `{"result": [...]}` with one plausible entry per id.
pub fn open_trades(ids: &[&str]) -> Value {
    let entries: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "order_id": id,
                "symbol": "EURUSD",
                "trade_type": "buy",
                "open_price": 1.0842,
                "volume": 0.1
            })
        })
        .collect();
    json!({ "result": entries })
}

pub fn test_credentials() -> Credentials {
    Credentials::new(vec![Cookie {
        name: "sid".to_string(),
        value: "test-session".to_string(),
        domain: None,
        path: None,
        secure: false,
        http_only: false,
        expires: None,
    }])
}

// ---------------------------------------------------------------------------
// Session + factory
// ---------------------------------------------------------------------------

pub struct ScriptedSession {
    id: usize,
    steps: VecDeque<Step>,
    log: CallLog,
    on_exhausted: Option<CancellationToken>,
}

impl ScriptedSession {
    pub fn new(id: usize, steps: Vec<Step>, log: CallLog) -> Self {
        Self {
            id,
            steps: steps.into(),
            log,
            on_exhausted: None,
        }
    }

    /// Once the script runs out, cancel `token` and hang instead of failing.
    pub fn cancel_when_exhausted(mut self, token: CancellationToken) -> Self {
        self.on_exhausted = Some(token);
        self
    }
}

#[async_trait::async_trait]
impl Session for ScriptedSession {
    async fn fetch_snapshot(&mut self, _url: &str) -> Result<Value, FetchError> {
        self.log.push(CallKind::Fetch { session: self.id });
        match self.steps.pop_front() {
            Some(Step::Snapshot(v)) => Ok(v),
            Some(Step::Transient(msg)) => Err(FetchError::Transient(msg)),
            Some(Step::Fatal(msg)) => Err(FetchError::Fatal(msg)),
            None => match &self.on_exhausted {
                Some(token) => {
                    token.cancel();
                    std::future::pending().await
                }
                None => Err(FetchError::Fatal("script exhausted".to_string())),
            },
        }
    }

    async fn teardown(&mut self) {
        self.log.push(CallKind::Teardown { session: self.id });
    }
}

/// Hands out one [`ScriptedSession`] per script, in order.
pub struct ScriptedFactory {
    scripts: Mutex<VecDeque<Result<Vec<Step>, SessionError>>>,
    established: Mutex<usize>,
    log: CallLog,
    shutdown: Option<CancellationToken>,
}

impl ScriptedFactory {
    pub fn new(scripts: Vec<Result<Vec<Step>, SessionError>>, log: CallLog) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            established: Mutex::new(0),
            log,
            shutdown: None,
        }
    }

    /// Cancel `token` when the last scripted session runs dry (or when asked
    /// for a session beyond the script).
    pub fn cancel_when_exhausted(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }
}

#[async_trait::async_trait]
impl SessionFactory for ScriptedFactory {
    async fn establish(&self, _credentials: &Credentials) -> Result<Box<dyn Session>, SessionError> {
        let id = {
            let mut n = self.established.lock().unwrap_or_else(PoisonError::into_inner);
            *n += 1;
            *n
        };
        self.log.push(CallKind::Establish { session: id });

        let (next, remaining) = {
            let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
            let next = scripts.pop_front();
            (next, scripts.len())
        };

        match next {
            Some(Ok(steps)) => {
                let mut session = ScriptedSession::new(id, steps, self.log.clone());
                if remaining == 0 {
                    if let Some(token) = &self.shutdown {
                        session = session.cancel_when_exhausted(token.clone());
                    }
                }
                Ok(Box::new(session))
            }
            Some(Err(e)) => Err(e),
            None => {
                if let Some(token) = &self.shutdown {
                    token.cancel();
                }
                Err(SessionError::Transport("no more scripted sessions".to_string()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Credential source with scripted `load` answers and refresh failures.
/// When the load script runs out, `load` returns [`test_credentials`].
pub struct RecordingCredentials {
    loads: Mutex<VecDeque<Option<Credentials>>>,
    refresh_failures: Mutex<usize>,
    log: CallLog,
}

impl RecordingCredentials {
    pub fn new(log: CallLog) -> Self {
        Self {
            loads: Mutex::new(VecDeque::new()),
            refresh_failures: Mutex::new(0),
            log,
        }
    }

    pub fn with_loads(self, loads: Vec<Option<Credentials>>) -> Self {
        *self.loads.lock().unwrap_or_else(PoisonError::into_inner) = loads.into();
        self
    }

    /// The next `n` refreshes fail.
    pub fn with_refresh_failures(self, n: usize) -> Self {
        *self
            .refresh_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = n;
        self
    }
}

#[async_trait::async_trait]
impl CredentialSource for RecordingCredentials {
    async fn load(&self) -> Result<Option<Credentials>, CredentialError> {
        self.log.push(CallKind::Load);
        let next = self
            .loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        Ok(next.unwrap_or_else(|| Some(test_credentials())))
    }

    async fn refresh(&self) -> Result<(), CredentialError> {
        self.log.push(CallKind::Refresh);
        let mut failures = self
            .refresh_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *failures > 0 {
            *failures -= 1;
            return Err(CredentialError::Failed("scripted refresh failure".to_string()));
        }
        Ok(())
    }
}
