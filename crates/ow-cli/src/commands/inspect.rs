use anyhow::{Context, Result};
use serde::Serialize;

use ow_journal::read_records;
use ow_schemas::{ClosedRecord, OpenedRecord};
use ow_state::StateStore;

pub fn state(config_paths: &[String]) -> Result<()> {
    let (_, cfg) = super::load_config(config_paths)?;
    let state = StateStore::new(&cfg.storage.state_file)?.load()?;
    let json = serde_json::to_string_pretty(&state).context("serialize state failed")?;
    println!("{json}");
    Ok(())
}

pub fn history(config_paths: &[String], closed: bool, limit: Option<usize>) -> Result<()> {
    let (_, cfg) = super::load_config(config_paths)?;
    if closed {
        let records: Vec<ClosedRecord> = read_records(&cfg.storage.closed_log)?;
        print_tail(&records, limit)
    } else {
        let records: Vec<OpenedRecord> = read_records(&cfg.storage.opened_log)?;
        print_tail(&records, limit)
    }
}

fn print_tail<T: Serialize>(records: &[T], limit: Option<usize>) -> Result<()> {
    let skip = limit.map_or(0, |n| records.len().saturating_sub(n));
    for rec in &records[skip..] {
        println!("{}", serde_json::to_string(rec).context("serialize record failed")?);
    }
    Ok(())
}
