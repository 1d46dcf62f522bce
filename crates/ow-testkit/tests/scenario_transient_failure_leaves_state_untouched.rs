//! Scenario: a transient failure between two good cycles changes nothing.
//!
//! GREEN when:
//! - after a timeout / 5xx / error-shaped payload, the state file and both
//!   logs are byte-identical to what the previous good cycle left
//! - the in-memory open set is unchanged
//! - a payload without the success marker never closes open orders

mod common;

use ow_schemas::{OrderId, OrderState};
use ow_testkit::{open_trades, CallLog, ScriptedSession, Step};
use serde_json::json;

#[tokio::test]
async fn transient_failures_between_good_cycles_leave_files_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let f = common::files(dir.path());
    let mut pl = common::poll_loop(dir.path());
    let mut state = OrderState::empty();

    let log = CallLog::new();
    let mut session = ScriptedSession::new(
        1,
        vec![
            Step::Snapshot(open_trades(&["A", "B"])),
            Step::Transient("request timed out".into()),
            Step::Transient("http status 502".into()),
            // error-shaped body: no success marker, must not close A and B
            Step::Snapshot(json!({"error": "session expired", "result": []})),
            Step::Snapshot(json!({})),
            Step::Snapshot(open_trades(&["A", "B"])),
        ],
        log.clone(),
    );

    pl.poll_once(&mut session, &mut state).await.unwrap();
    let state_bytes = common::read_or_empty(&f.state);
    let opened_bytes = common::read_or_empty(&f.opened);
    let closed_bytes = common::read_or_empty(&f.closed);
    let open_before = state.open_orders.clone();

    for _ in 0..4 {
        pl.poll_once(&mut session, &mut state).await.unwrap();
        assert_eq!(common::read_or_empty(&f.state), state_bytes);
        assert_eq!(common::read_or_empty(&f.opened), opened_bytes);
        assert_eq!(common::read_or_empty(&f.closed), closed_bytes);
        assert_eq!(state.open_orders, open_before);
    }
    assert_eq!(pl.consecutive_failures(), 4);

    // Same snapshot again: accepted, no transitions, files still identical.
    pl.poll_once(&mut session, &mut state).await.unwrap();
    assert_eq!(pl.consecutive_failures(), 0);
    assert_eq!(common::read_or_empty(&f.state), state_bytes);
    assert_eq!(common::read_or_empty(&f.opened), opened_bytes);
    assert!(closed_bytes.is_empty());
    assert_eq!(
        state.open_orders,
        vec![OrderId::new("A").unwrap(), OrderId::new("B").unwrap()]
    );
}
