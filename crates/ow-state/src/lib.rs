//! ow-state
//!
//! Durable store for the open/closed order state.
//!
//! - `load()` never fails on a missing file: first run starts empty.
//! - `save()` is write-then-rename. A crash mid-save leaves either the old
//!   file or the new one in place, never a half-written file under the
//!   real name.
//! - A state file that does not parse is an error. It is never replaced
//!   with an empty state, since that would re-announce every open order.

mod atomic;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ow_schemas::{OrderState, StateRepair};
use tracing::{info, warn};

pub use atomic::{temp_path_for, write_atomic};

/// Owns the state file path. One store per watcher process.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Creates the store and ensures the parent directory exists.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted state, or an empty state when no file exists yet.
    ///
    /// A leftover temp file from an interrupted save is ignored; only the
    /// file under the real name is trusted.
    pub fn load(&self) -> Result<OrderState> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no state file, starting empty");
                return Ok(OrderState::empty());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("read state file {:?}", self.path));
            }
        };

        let mut state: OrderState = serde_json::from_str(&raw)
            .with_context(|| format!("parse state file {:?}", self.path))?;

        let repairs = state.repair();
        for r in &repairs {
            match r {
                StateRepair::DuplicateOpen { order_id } => {
                    warn!(%order_id, "state file listed open order twice; keeping first")
                }
                StateRepair::DuplicateClosed { order_id } => {
                    warn!(%order_id, "state file listed closed order twice; keeping first")
                }
                StateRepair::OpenAlreadyClosed { order_id } => {
                    warn!(%order_id, "state file listed order as both open and closed; treating as closed")
                }
            }
        }

        info!(
            path = %self.path.display(),
            open = state.open_orders.len(),
            closed = state.closed_orders.len(),
            repaired = repairs.len(),
            "state loaded"
        );
        Ok(state)
    }

    /// Fully replace the persisted state.
    pub fn save(&self, state: &OrderState) -> Result<()> {
        let json = serde_json::to_vec(state).context("serialize order state failed")?;
        write_atomic(&self.path, &json)
            .with_context(|| format!("save state file {:?}", self.path))
    }
}
