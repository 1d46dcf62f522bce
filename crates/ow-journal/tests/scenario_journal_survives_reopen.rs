//! Scenario: the journal is append-only across process restarts.
//!
//! GREEN when:
//! - a second `EventJournal` over the same paths appends after existing lines
//! - records written by the first instance are read back unchanged
//! - on-disk lines carry `type: "NEW"` / `type: "CLOSED"` and RFC 3339 timestamps

use chrono::{TimeZone, Utc};
use ow_journal::{read_records, EventJournal, JournalPaths};
use ow_schemas::{ClosedRecord, OpenedRecord, Order, OrderId, TransitionEvent};
use serde_json::json;

fn paths(dir: &std::path::Path) -> JournalPaths {
    JournalPaths {
        opened_log: dir.join("orders_log.jsonl"),
        closed_log: dir.join("orders_closed.jsonl"),
        latest_file: dir.join("latest.json"),
    }
}

#[test]
fn reopened_journal_appends_after_existing_records() {
    let dir = tempfile::tempdir().unwrap();
    let ts = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
    let id = |s: &str| OrderId::new(s).unwrap();
    let order = |s: &str| Order::new(id(s), "EURUSD", "buy", json!(1.0842), json!({"order_id": s}));

    {
        let j = EventJournal::new(paths(dir.path())).unwrap();
        j.append(&TransitionEvent::Opened { order: order("7"), timestamp: ts }).unwrap();
    }
    {
        let j = EventJournal::new(paths(dir.path())).unwrap();
        j.append(&TransitionEvent::Opened { order: order("8"), timestamp: ts }).unwrap();
        j.append(&TransitionEvent::Closed { order_id: id("7"), timestamp: ts }).unwrap();
    }

    let p = paths(dir.path());
    let opened: Vec<OpenedRecord> = read_records(&p.opened_log).unwrap();
    let ids: Vec<&str> = opened.iter().map(|r| r.order_id.as_str()).collect();
    assert_eq!(ids, vec!["7", "8"]);

    let closed: Vec<ClosedRecord> = read_records(&p.closed_log).unwrap();
    assert_eq!(closed, vec![ClosedRecord::new(id("7"), ts)]);

    let first_line = std::fs::read_to_string(&p.opened_log).unwrap();
    let first: serde_json::Value = serde_json::from_str(first_line.lines().next().unwrap()).unwrap();
    assert_eq!(first["type"], "NEW");
    assert_eq!(first["timestamp"], "2024-05-01T09:30:00Z");
    assert_eq!(first["open_price"], json!(1.0842));
}
