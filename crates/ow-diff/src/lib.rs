//! ow-diff
//!
//! Snapshot differ: turns "orders open right now" into opened/closed
//! transitions against the previously known open set.
//!
//! - Ids present now, absent before => opened
//! - Ids present before, absent now => closed
//! - An empty snapshot closes everything (a genuinely empty account looks
//!   exactly like this and must be accepted)
//! - Payloads without the explicit success marker never reach the differ
//!
//! Deterministic, pure logic. No IO.

mod engine;
mod snapshot_adapter;

pub use engine::{diff, diff_against_state, SnapshotDiff};
pub use snapshot_adapter::{parse_snapshot, SnapshotError, RESULT_KEY};
