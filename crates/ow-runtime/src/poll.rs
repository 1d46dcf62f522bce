use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ow_diff::{diff_against_state, parse_snapshot};
use ow_journal::EventJournal;
use ow_schemas::{LatestSnapshot, OrderId, OrderState, TransitionEvent};
use ow_session::{FetchError, Session};
use ow_state::StateStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub snapshot_url: String,
    pub poll_interval: Duration,
}

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Snapshot accepted and diffed. Counts are transitions written this cycle.
    Applied {
        opened: usize,
        closed: usize,
        suppressed: usize,
    },
    /// Transient failure; state and logs untouched.
    Skipped { reason: String },
}

/// Why the poll loop stopped without being cancelled.
#[derive(Debug)]
pub enum LoopError {
    /// The session is unusable; the supervisor must rebuild it.
    Fatal(FetchError),
    /// Journal append or state save failed. The on-disk record can no
    /// longer be trusted to match memory, so the process must stop.
    Persistence(anyhow::Error),
}

impl fmt::Display for LoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopError::Fatal(e) => write!(f, "{e}"),
            LoopError::Persistence(e) => write!(f, "persistence failure: {e:#}"),
        }
    }
}

impl std::error::Error for LoopError {}

pub struct PollLoop {
    cfg: PollConfig,
    store: StateStore,
    journal: EventJournal,
    consecutive_failures: u32,
    /// Reappearing closed ids already warned about; repeats log at debug.
    reported_suppressed: BTreeSet<OrderId>,
}

impl PollLoop {
    pub fn new(cfg: PollConfig, store: StateStore, journal: EventJournal) -> Self {
        Self {
            cfg,
            store,
            journal,
            consecutive_failures: 0,
            reported_suppressed: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.cfg
    }

    /// Transient failures since the last accepted snapshot.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// One fetch + apply, without sleeping.
    pub async fn poll_once(
        &mut self,
        session: &mut dyn Session,
        state: &mut OrderState,
    ) -> Result<CycleOutcome, LoopError> {
        let fetched = session.fetch_snapshot(&self.cfg.snapshot_url).await;
        self.handle_fetch(fetched, state)
    }

    /// Poll until cancelled or a fatal/persistence error occurs.
    ///
    /// Cancellation aborts an in-flight fetch and interrupts the sleep. It
    /// never lands between a journal append and the state save: that part
    /// of the cycle has no suspension point.
    pub async fn run(
        &mut self,
        session: &mut dyn Session,
        state: &mut OrderState,
        shutdown: &CancellationToken,
    ) -> Result<(), LoopError> {
        info!(
            url = %self.cfg.snapshot_url,
            interval_ms = self.cfg.poll_interval.as_millis() as u64,
            open = state.open_orders.len(),
            "polling started"
        );
        loop {
            let fetched = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                r = session.fetch_snapshot(&self.cfg.snapshot_url) => r,
            };
            self.handle_fetch(fetched, state)?;

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.cfg.poll_interval) => {}
            }
        }
    }

    fn handle_fetch(
        &mut self,
        fetched: Result<Value, FetchError>,
        state: &mut OrderState,
    ) -> Result<CycleOutcome, LoopError> {
        match fetched {
            Ok(payload) => self.apply_payload(&payload, state),
            Err(e @ FetchError::Fatal(_)) => Err(LoopError::Fatal(e)),
            Err(e @ FetchError::Transient(_)) => Ok(self.skip(e.to_string())),
        }
    }

    fn skip(&mut self, reason: String) -> CycleOutcome {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        warn!(
            consecutive_failures = self.consecutive_failures,
            reason = %reason,
            "poll cycle skipped"
        );
        CycleOutcome::Skipped { reason }
    }

    /// Warn once per reappearing closed id. Returns how many were new.
    fn report_suppressed(&mut self, ids: &[OrderId]) -> usize {
        let mut first_seen = 0;
        for id in ids {
            if self.reported_suppressed.insert(id.clone()) {
                first_seen += 1;
                warn!(order_id = %id, "closed order reappeared in snapshot; not reopening");
            } else {
                debug!(order_id = %id, "closed order still present in snapshot");
            }
        }
        first_seen
    }

    fn apply_payload(
        &mut self,
        payload: &Value,
        state: &mut OrderState,
    ) -> Result<CycleOutcome, LoopError> {
        let orders = match parse_snapshot(payload) {
            Ok(orders) => orders,
            Err(e) => return Ok(self.skip(format!("snapshot rejected: {e}"))),
        };

        if self.consecutive_failures > 0 {
            info!(
                consecutive_failures = self.consecutive_failures,
                "snapshot accepted after failures"
            );
            self.consecutive_failures = 0;
        }

        let d = diff_against_state(state, &orders);
        self.report_suppressed(&d.suppressed);

        let now = Utc::now();
        let mut events: Vec<TransitionEvent> = Vec::with_capacity(d.opened.len() + d.closed.len());
        events.extend(d.opened.iter().map(|order| TransitionEvent::Opened {
            order: order.clone(),
            timestamp: now,
        }));
        events.extend(d.closed.iter().map(|id| TransitionEvent::Closed {
            order_id: id.clone(),
            timestamp: now,
        }));

        if !d.is_empty() {
            // Journal before state: a crash in between replays the cycle.
            for ev in &events {
                self.journal.append(ev).map_err(LoopError::Persistence)?;
                match ev {
                    TransitionEvent::Opened { order, .. } => info!(
                        order_id = %order.order_id,
                        symbol = %order.symbol,
                        trade_type = %order.trade_type,
                        open_price = %order.open_price,
                        "order opened"
                    ),
                    TransitionEvent::Closed { order_id, .. } => {
                        info!(order_id = %order_id, "order closed")
                    }
                }
            }

            let mut next = state.clone();
            d.apply_to(&mut next);
            self.store.save(&next).map_err(LoopError::Persistence)?;
            *state = next;
        } else {
            debug!(open = state.open_orders.len(), "no transitions");
        }

        if let Err(e) = self
            .journal
            .publish_latest(&LatestSnapshot::from_events(now, &events))
        {
            warn!(error = %format!("{e:#}"), "latest snapshot publish failed");
        }

        Ok(CycleOutcome::Applied {
            opened: d.opened.len(),
            closed: d.closed.len(),
            suppressed: d.suppressed.len(),
        })
    }
}
