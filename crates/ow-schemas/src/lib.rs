//! ow-schemas
//!
//! Shared data model for the order watcher: canonical order identifiers,
//! the persisted open/closed order state, and the on-disk record shapes
//! written by the journal.
//!
//! Pure types. No IO.

mod order;
mod records;
mod state;

pub use order::{Order, OrderId};
pub use records::{
    ClosedRecord, LatestClosed, LatestOpen, LatestSnapshot, OpenedRecord, RecordKind,
    TransitionEvent,
};
pub use state::{OrderState, StateRepair};
