use std::collections::BTreeSet;

use ow_schemas::{Order, OrderId, OrderState};

/// Transitions detected in one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotDiff {
    /// Newly opened orders, in snapshot order.
    pub opened: Vec<Order>,
    /// Newly closed ids, in previous-open-set order.
    pub closed: Vec<OrderId>,
    /// Ids that reappeared after being closed. Not reopened.
    pub suppressed: Vec<OrderId>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty()
    }

    /// Apply the transitions to `state`: opened ids are appended to
    /// `open_orders`; closed ids move from `open_orders` to the end of
    /// `closed_orders`.
    pub fn apply_to(&self, state: &mut OrderState) {
        for order in &self.opened {
            state.open_orders.push(order.order_id.clone());
        }
        if !self.closed.is_empty() {
            let closed: BTreeSet<&OrderId> = self.closed.iter().collect();
            state.open_orders.retain(|id| !closed.contains(id));
            state.closed_orders.extend(self.closed.iter().cloned());
        }
    }
}

/// Compare the previously open set to a fresh snapshot.
///
/// Duplicate ids inside one snapshot count once (first occurrence wins).
pub fn diff<'a, I>(previous_open: I, snapshot: &[Order]) -> SnapshotDiff
where
    I: IntoIterator<Item = &'a OrderId>,
{
    let previous: Vec<&OrderId> = previous_open.into_iter().collect();
    let previous_set: BTreeSet<&OrderId> = previous.iter().copied().collect();

    let mut current: BTreeSet<&OrderId> = BTreeSet::new();
    let mut opened = Vec::new();
    for order in snapshot {
        if !current.insert(&order.order_id) {
            continue;
        }
        if !previous_set.contains(&order.order_id) {
            opened.push(order.clone());
        }
    }

    let mut closed = Vec::new();
    let mut seen = BTreeSet::new();
    for id in previous {
        if !current.contains(id) && seen.insert(id) {
            closed.push(id.clone());
        }
    }

    SnapshotDiff {
        opened,
        closed,
        suppressed: Vec::new(),
    }
}

/// [`diff`] against a full state. An id already in `closed_orders` that
/// shows up again is moved to `suppressed` instead of being reopened.
pub fn diff_against_state(state: &OrderState, snapshot: &[Order]) -> SnapshotDiff {
    let mut d = diff(&state.open_orders, snapshot);
    if state.closed_orders.is_empty() {
        return d;
    }

    let closed = state.closed_set();
    let (suppressed, opened): (Vec<Order>, Vec<Order>) = d
        .opened
        .into_iter()
        .partition(|o| closed.contains(&o.order_id));
    d.opened = opened;
    d.suppressed = suppressed.into_iter().map(|o| o.order_id).collect();
    d
}
