use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::OrderId;

/// Persisted tracking state.
///
/// Invariants:
/// - every id in `open_orders` was seen in some snapshot and has not yet
///   been seen absent
/// - `closed_orders` is append-only; an id in it never re-enters
///   `open_orders`
///
/// Both lists keep insertion order so the file on disk reads in the order
/// transitions happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderState {
    #[serde(default)]
    pub open_orders: Vec<OrderId>,
    #[serde(default)]
    pub closed_orders: Vec<OrderId>,
}

/// One correction made by [`OrderState::repair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateRepair {
    DuplicateOpen { order_id: OrderId },
    DuplicateClosed { order_id: OrderId },
    /// Id listed both as open and closed; closed wins.
    OpenAlreadyClosed { order_id: OrderId },
}

impl OrderState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn open_set(&self) -> BTreeSet<OrderId> {
        self.open_orders.iter().cloned().collect()
    }

    pub fn closed_set(&self) -> BTreeSet<OrderId> {
        self.closed_orders.iter().cloned().collect()
    }

    pub fn is_open(&self, id: &OrderId) -> bool {
        self.open_orders.contains(id)
    }

    pub fn is_closed(&self, id: &OrderId) -> bool {
        self.closed_orders.contains(id)
    }

    /// Restore the invariants on a state read from disk.
    ///
    /// Files written by earlier tooling may list an id twice or keep an id
    /// in both lists (an order that reappeared after closing). Duplicates
    /// keep their first position; an id present in both lists is dropped
    /// from `open_orders`.
    pub fn repair(&mut self) -> Vec<StateRepair> {
        let mut repairs = Vec::new();

        let mut seen_closed = BTreeSet::new();
        self.closed_orders.retain(|id| {
            if seen_closed.insert(id.clone()) {
                true
            } else {
                repairs.push(StateRepair::DuplicateClosed {
                    order_id: id.clone(),
                });
                false
            }
        });

        let mut seen_open = BTreeSet::new();
        self.open_orders.retain(|id| {
            if seen_closed.contains(id) {
                repairs.push(StateRepair::OpenAlreadyClosed {
                    order_id: id.clone(),
                });
                return false;
            }
            if seen_open.insert(id.clone()) {
                true
            } else {
                repairs.push(StateRepair::DuplicateOpen {
                    order_id: id.clone(),
                });
                false
            }
        });

        repairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> OrderId {
        OrderId::new(s).unwrap()
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let st: OrderState = serde_json::from_str("{}").unwrap();
        assert_eq!(st, OrderState::empty());
    }

    #[test]
    fn wire_shape_is_two_string_arrays() {
        let st = OrderState {
            open_orders: vec![id("B"), id("C")],
            closed_orders: vec![id("A")],
        };
        let v = serde_json::to_value(&st).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"open_orders": ["B", "C"], "closed_orders": ["A"]})
        );
    }

    #[test]
    fn repair_drops_duplicates_and_reopened_ids() {
        let mut st = OrderState {
            open_orders: vec![id("A"), id("B"), id("A"), id("C")],
            closed_orders: vec![id("C"), id("D"), id("D")],
        };
        let repairs = st.repair();

        assert_eq!(st.open_orders, vec![id("A"), id("B")]);
        assert_eq!(st.closed_orders, vec![id("C"), id("D")]);
        assert_eq!(repairs.len(), 3);
        assert!(repairs.contains(&StateRepair::OpenAlreadyClosed { order_id: id("C") }));
    }

    #[test]
    fn repair_is_noop_on_clean_state() {
        let mut st = OrderState {
            open_orders: vec![id("B")],
            closed_orders: vec![id("A")],
        };
        assert!(st.repair().is_empty());
    }
}
