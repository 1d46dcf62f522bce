use anyhow::Result;
use tracing::{info, warn};

use ow_config::{report_unused_keys, UnusedKeyPolicy};
use ow_journal::{EventJournal, JournalPaths};
use ow_runtime::{CancellationToken, PollConfig, PollLoop, Supervisor, SupervisorConfig, SupervisorExit};
use ow_session::{CookieFileCredentials, HttpSessionFactory};
use ow_state::StateStore;

pub async fn run(config_paths: &[String], strict_config: bool) -> Result<()> {
    let (loaded, cfg) = super::load_config(config_paths)?;

    let policy = if strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(&loaded.config_json, policy)?;
    for pointer in &report.unused_leaf_pointers {
        warn!(pointer = %pointer, "config key is not used");
    }
    info!(config_hash = %loaded.config_hash, "config loaded");

    let store = StateStore::new(&cfg.storage.state_file)?;
    let mut state = store.load()?;
    let journal = EventJournal::new(JournalPaths {
        opened_log: cfg.storage.opened_log.clone(),
        closed_log: cfg.storage.closed_log.clone(),
        latest_file: cfg.storage.latest_file.clone(),
    })?;

    let poll_loop = PollLoop::new(
        PollConfig {
            snapshot_url: cfg.source.snapshot_url.clone(),
            poll_interval: cfg.poll_interval(),
        },
        store,
        journal,
    );
    let factory = HttpSessionFactory::new(cfg.source.landing_url.clone(), cfg.request_timeout());
    let credentials = CookieFileCredentials::new(
        &cfg.credentials.cookie_file,
        cfg.credentials.refresh_command.clone(),
        cfg.refresh_timeout(),
    );
    if cfg.credentials.refresh_command.is_empty() {
        warn!("no credentials.refresh_command configured; expired cookies cannot be renewed");
    }

    let mut supervisor = Supervisor::new(
        SupervisorConfig {
            retry_delay: cfg.retry_delay(),
        },
        Box::new(factory),
        Box::new(credentials),
        poll_loop,
    );

    let shutdown = CancellationToken::new();
    let ctrl_c = {
        let token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received; shutting down");
                token.cancel();
            }
        })
    };

    let exit = supervisor.run(&mut state, &shutdown).await;
    ctrl_c.abort();

    let SupervisorExit::Stopped { restarts } = exit?;
    info!(
        restarts,
        open = state.open_orders.len(),
        closed = state.closed_orders.len(),
        "watcher exited"
    );
    Ok(())
}
