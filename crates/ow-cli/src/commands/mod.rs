pub mod inspect;
pub mod watch;

use anyhow::Result;
use ow_config::{LoadedConfig, WatchConfig};

pub(crate) fn load_config(config_paths: &[String]) -> Result<(LoadedConfig, WatchConfig)> {
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    ow_config::load_watch_config(&path_refs)
}
