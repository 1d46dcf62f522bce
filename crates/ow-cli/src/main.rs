use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ow")]
#[command(about = "Order watcher: poll open trades, journal opened/closed orders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the snapshot endpoint until Ctrl-C.
    Watch {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Refuse to start when the config has keys nothing reads.
        #[arg(long, default_value_t = false)]
        strict_config: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> local overrides ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Print the persisted open/closed order state.
    State {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Print journaled transitions, oldest first.
    History {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Read the closed-orders log instead of the opened-orders log.
        #[arg(long, default_value_t = false)]
        closed: bool,

        /// Only the last N records.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Watch {
            config_paths,
            strict_config,
        } => commands::watch::run(&config_paths, strict_config).await?,

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = ow_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::State { config_paths } => commands::inspect::state(&config_paths)?,

        Commands::History {
            config_paths,
            closed,
            limit,
        } => commands::inspect::history(&config_paths, closed, limit)?,
    }

    Ok(())
}

/// Logs go to stderr; stdout carries command output only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
