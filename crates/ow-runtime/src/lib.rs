//! ow-runtime
//!
//! The long-running half of the watcher:
//! - [`PollLoop`]: fetch, diff, journal, persist, sleep; absorbs transient
//!   failures and hands fatal ones upward
//! - [`Supervisor`]: owns the session lifecycle and the in-memory
//!   [`OrderState`](ow_schemas::OrderState), rebuilding the session after
//!   fatal errors without losing state
//!
//! Both are single-task and cooperative. Cancellation is a
//! `tokio_util::sync::CancellationToken` checked at every suspension point.

mod poll;
mod supervisor;

pub use poll::{CycleOutcome, LoopError, PollConfig, PollLoop};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorExit};

pub use tokio_util::sync::CancellationToken;
