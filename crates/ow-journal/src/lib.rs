//! ow-journal
//!
//! Append-only transition logs plus the overwritten "latest" artifact.
//!
//! Two JSON Lines files, one record per line:
//! - opened log: `{timestamp, type:"NEW", order_id, symbol, trade_type, open_price, raw}`
//! - closed log: `{timestamp, type:"CLOSED", order_id}`
//!
//! Records are only ever appended. The latest-snapshot file is a
//! best-effort sink for external readers and carries no history.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use ow_schemas::{ClosedRecord, LatestSnapshot, OpenedRecord, TransitionEvent};

/// File locations for one journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalPaths {
    pub opened_log: PathBuf,
    pub closed_log: PathBuf,
    pub latest_file: PathBuf,
}

pub struct EventJournal {
    paths: JournalPaths,
}

impl EventJournal {
    /// Creates the journal and ensures parent dirs exist.
    pub fn new(paths: JournalPaths) -> Result<Self> {
        for p in [&paths.opened_log, &paths.closed_log, &paths.latest_file] {
            if let Some(parent) = p.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("create_dir_all {:?}", parent))?;
                }
            }
        }
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &JournalPaths {
        &self.paths
    }

    pub fn append_opened(&self, rec: &OpenedRecord) -> Result<()> {
        append_record(&self.paths.opened_log, rec)
    }

    pub fn append_closed(&self, rec: &ClosedRecord) -> Result<()> {
        append_record(&self.paths.closed_log, rec)
    }

    /// Route one transition to its log.
    pub fn append(&self, ev: &TransitionEvent) -> Result<()> {
        match ev {
            TransitionEvent::Opened { order, timestamp } => {
                self.append_opened(&OpenedRecord::new(order, *timestamp))
            }
            TransitionEvent::Closed {
                order_id,
                timestamp,
            } => self.append_closed(&ClosedRecord::new(order_id.clone(), *timestamp)),
        }
    }

    /// Overwrite the latest-snapshot artifact (pretty JSON).
    pub fn publish_latest(&self, latest: &LatestSnapshot) -> Result<()> {
        let json =
            serde_json::to_string_pretty(latest).context("serialize latest snapshot failed")?;
        ow_state::write_atomic(&self.paths.latest_file, format!("{json}\n").as_bytes())
            .with_context(|| format!("publish latest snapshot {:?}", self.paths.latest_file))
    }

    pub fn opened_records(&self) -> Result<Vec<OpenedRecord>> {
        read_records(&self.paths.opened_log)
    }

    pub fn closed_records(&self) -> Result<Vec<ClosedRecord>> {
        read_records(&self.paths.closed_log)
    }
}

/// Serialize one record and append it as a single line.
fn append_record<T: Serialize>(path: &Path, rec: &T) -> Result<()> {
    let mut line = serde_json::to_string(rec).context("serialize journal record failed")?;
    line.push('\n');

    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open journal {:?}", path))?;
    // One write per record so a record is never interleaved with another.
    f.write_all(line.as_bytes())
        .with_context(|| format!("write journal line {:?}", path))?;
    f.sync_data()
        .with_context(|| format!("fsync journal {:?}", path))?;
    Ok(())
}

/// Read a JSON Lines log back. A missing file reads as empty; blank lines
/// are skipped; a malformed line is an error naming its line number.
pub fn read_records<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("read journal {:?}", path)),
    };

    let mut out = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let rec = serde_json::from_str(trimmed)
            .with_context(|| format!("parse journal record at {:?} line {}", path, i + 1))?;
        out.push(rec);
    }
    Ok(out)
}
