#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use ow_journal::{EventJournal, JournalPaths};
use ow_runtime::{PollConfig, PollLoop};
use ow_state::StateStore;

pub const POLL_INTERVAL: Duration = Duration::from_millis(300);
pub const RETRY_DELAY: Duration = Duration::from_secs(10);

pub struct Files {
    pub state: PathBuf,
    pub opened: PathBuf,
    pub closed: PathBuf,
    pub latest: PathBuf,
}

pub fn files(dir: &Path) -> Files {
    Files {
        state: dir.join("state.json"),
        opened: dir.join("orders_log.jsonl"),
        closed: dir.join("orders_closed.jsonl"),
        latest: dir.join("latest.json"),
    }
}

pub fn poll_loop(dir: &Path) -> PollLoop {
    let f = files(dir);
    let store = StateStore::new(&f.state).unwrap();
    let journal = EventJournal::new(JournalPaths {
        opened_log: f.opened,
        closed_log: f.closed,
        latest_file: f.latest,
    })
    .unwrap();
    PollLoop::new(
        PollConfig {
            snapshot_url: "http://broker.test/api/open-trades/".to_string(),
            poll_interval: POLL_INTERVAL,
        },
        store,
        journal,
    )
}

pub fn read_or_empty(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap_or_default()
}
