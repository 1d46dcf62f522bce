//! Scenario: a fatal session error is recovered without losing state.
//!
//! GREEN when:
//! - the failed session is torn down before anything else happens
//! - credentials are refreshed, then the supervisor waits `retry_delay`
//! - the new session resumes with the same open set: orders seen before
//!   the failure produce no second NEW record
//! - only genuinely new orders are journaled after the restart

mod common;

use ow_journal::read_records;
use ow_runtime::{CancellationToken, Supervisor, SupervisorConfig, SupervisorExit};
use ow_schemas::{OpenedRecord, OrderId, OrderState};
use ow_testkit::{open_trades, CallKind, CallLog, RecordingCredentials, ScriptedFactory, Step};

#[tokio::test(start_paused = true)]
async fn fatal_error_tears_down_refreshes_waits_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let f = common::files(dir.path());
    let log = CallLog::new();
    let shutdown = CancellationToken::new();

    let factory = ScriptedFactory::new(
        vec![
            Ok(vec![
                Step::Snapshot(open_trades(&["A", "B"])),
                Step::Fatal("http status 401 (session rejected)".into()),
            ]),
            Ok(vec![Step::Snapshot(open_trades(&["A", "B", "C"]))]),
        ],
        log.clone(),
    )
    .cancel_when_exhausted(shutdown.clone());

    let mut sup = Supervisor::new(
        SupervisorConfig {
            retry_delay: common::RETRY_DELAY,
        },
        Box::new(factory),
        Box::new(RecordingCredentials::new(log.clone())),
        common::poll_loop(dir.path()),
    );

    let mut state = OrderState::empty();
    let exit = sup.run(&mut state, &shutdown).await.unwrap();
    assert_eq!(exit, SupervisorExit::Stopped { restarts: 1 });

    assert_eq!(
        log.kinds(),
        vec![
            CallKind::Load,
            CallKind::Establish { session: 1 },
            CallKind::Fetch { session: 1 },
            CallKind::Fetch { session: 1 },
            CallKind::Teardown { session: 1 },
            CallKind::Refresh,
            CallKind::Load,
            CallKind::Establish { session: 2 },
            CallKind::Fetch { session: 2 },
            CallKind::Fetch { session: 2 },
            CallKind::Teardown { session: 2 },
        ]
    );

    let torn_down = log.first(&CallKind::Teardown { session: 1 }).unwrap().at;
    let refreshed = log.first(&CallKind::Refresh).unwrap().at;
    let reestablished = log.first(&CallKind::Establish { session: 2 }).unwrap().at;
    assert!(refreshed >= torn_down);
    assert!(reestablished - refreshed >= common::RETRY_DELAY);

    let ids = |v: &[&str]| v.iter().map(|s| OrderId::new(s).unwrap()).collect::<Vec<_>>();
    assert_eq!(state.open_orders, ids(&["A", "B", "C"]));
    assert!(state.closed_orders.is_empty());

    let opened: Vec<OpenedRecord> = read_records(&f.opened).unwrap();
    let journaled: Vec<&str> = opened.iter().map(|r| r.order_id.as_str()).collect();
    assert_eq!(journaled, vec!["A", "B", "C"]);
}

#[tokio::test(start_paused = true)]
async fn rejected_establish_is_retried_after_delay() {
    let dir = tempfile::tempdir().unwrap();
    let log = CallLog::new();
    let shutdown = CancellationToken::new();

    let factory = ScriptedFactory::new(
        vec![
            Err(ow_session::SessionError::Rejected("landing page returned 403".into())),
            Ok(vec![Step::Snapshot(open_trades(&["A"]))]),
        ],
        log.clone(),
    )
    .cancel_when_exhausted(shutdown.clone());

    let mut sup = Supervisor::new(
        SupervisorConfig {
            retry_delay: common::RETRY_DELAY,
        },
        Box::new(factory),
        Box::new(RecordingCredentials::new(log.clone())),
        common::poll_loop(dir.path()),
    );

    let mut state = OrderState::empty();
    let exit = sup.run(&mut state, &shutdown).await.unwrap();
    assert_eq!(exit, SupervisorExit::Stopped { restarts: 1 });

    // No session existed, so nothing to tear down before the refresh.
    assert_eq!(
        &log.kinds()[..4],
        &[
            CallKind::Load,
            CallKind::Establish { session: 1 },
            CallKind::Refresh,
            CallKind::Load,
        ]
    );
    assert_eq!(state.open_orders, vec![OrderId::new("A").unwrap()]);
}
