use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Order, OrderId};

/// `type` discriminator written into every journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    #[serde(rename = "NEW")]
    New,
    #[serde(rename = "CLOSED")]
    Closed,
}

/// A detected transition. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionEvent {
    Opened {
        order: Order,
        timestamp: DateTime<Utc>,
    },
    Closed {
        order_id: OrderId,
        timestamp: DateTime<Utc>,
    },
}

impl TransitionEvent {
    pub fn order_id(&self) -> &OrderId {
        match self {
            TransitionEvent::Opened { order, .. } => &order.order_id,
            TransitionEvent::Closed { order_id, .. } => order_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TransitionEvent::Opened { timestamp, .. } | TransitionEvent::Closed { timestamp, .. } => {
                *timestamp
            }
        }
    }
}

/// One line of the opened-orders log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenedRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub order_id: OrderId,
    pub symbol: String,
    pub trade_type: String,
    pub open_price: Value,
    pub raw: Value,
}

impl OpenedRecord {
    pub fn new(order: &Order, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            kind: RecordKind::New,
            order_id: order.order_id.clone(),
            symbol: order.symbol.clone(),
            trade_type: order.trade_type.clone(),
            open_price: order.open_price.clone(),
            raw: order.raw.clone(),
        }
    }
}

/// One line of the closed-orders log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub order_id: OrderId,
}

impl ClosedRecord {
    pub fn new(order_id: OrderId, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            kind: RecordKind::Closed,
            order_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestOpen {
    pub timestamp: DateTime<Utc>,
    pub order_id: OrderId,
    pub symbol: String,
    pub trade_type: String,
    pub open_price: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestClosed {
    pub timestamp: DateTime<Utc>,
    pub order_id: OrderId,
}

/// Single overwritten artifact for external consumers: the last opened and
/// last closed transition of the most recent cycle. Not historical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestSnapshot {
    pub timestamp: DateTime<Utc>,
    pub latest_open: Option<LatestOpen>,
    pub latest_closed: Option<LatestClosed>,
}

impl LatestSnapshot {
    /// Build from one cycle's events; the last event of each kind wins.
    pub fn from_events(cycle_ts: DateTime<Utc>, events: &[TransitionEvent]) -> Self {
        let mut latest_open = None;
        let mut latest_closed = None;
        for ev in events {
            match ev {
                TransitionEvent::Opened { order, timestamp } => {
                    latest_open = Some(LatestOpen {
                        timestamp: *timestamp,
                        order_id: order.order_id.clone(),
                        symbol: order.symbol.clone(),
                        trade_type: order.trade_type.clone(),
                        open_price: order.open_price.clone(),
                    });
                }
                TransitionEvent::Closed {
                    order_id,
                    timestamp,
                } => {
                    latest_closed = Some(LatestClosed {
                        timestamp: *timestamp,
                        order_id: order_id.clone(),
                    });
                }
            }
        }
        Self {
            timestamp: cycle_ts,
            latest_open,
            latest_closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order(id: &str) -> Order {
        Order::new(
            OrderId::new(id).unwrap(),
            "EURUSD",
            "buy",
            json!(1.0845),
            json!({"order_id": id, "symbol": "EURUSD", "extra": [1, 2]}),
        )
    }

    #[test]
    fn opened_record_wire_shape() {
        let ts = Utc::now();
        let rec = OpenedRecord::new(&order("7"), ts);
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["type"], "NEW");
        assert_eq!(v["order_id"], "7");
        assert_eq!(v["symbol"], "EURUSD");
        assert_eq!(v["trade_type"], "buy");
        assert_eq!(v["open_price"], json!(1.0845));
        assert_eq!(v["raw"]["extra"], json!([1, 2]));
        assert!(v["timestamp"].is_string());
    }

    #[test]
    fn closed_record_wire_shape() {
        let rec = ClosedRecord::new(OrderId::new("9").unwrap(), Utc::now());
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["type"], "CLOSED");
        assert_eq!(v["order_id"], "9");
        assert_eq!(v.as_object().unwrap().len(), 3);
    }

    #[test]
    fn latest_snapshot_keeps_last_of_each_kind() {
        let ts = Utc::now();
        let events = vec![
            TransitionEvent::Opened {
                order: order("1"),
                timestamp: ts,
            },
            TransitionEvent::Opened {
                order: order("2"),
                timestamp: ts,
            },
            TransitionEvent::Closed {
                order_id: OrderId::new("0").unwrap(),
                timestamp: ts,
            },
        ];
        let latest = LatestSnapshot::from_events(ts, &events);
        assert_eq!(latest.latest_open.unwrap().order_id.as_str(), "2");
        assert_eq!(latest.latest_closed.unwrap().order_id.as_str(), "0");
    }

    #[test]
    fn latest_snapshot_without_events_serializes_nulls() {
        let latest = LatestSnapshot::from_events(Utc::now(), &[]);
        let v = serde_json::to_value(&latest).unwrap();
        assert!(v["latest_open"].is_null());
        assert!(v["latest_closed"].is_null());
    }
}
