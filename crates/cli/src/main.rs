mod config_commands;
mod db_commands;
mod rooms_commands;

use std::{path::PathBuf, sync::Arc};

use {
    clap::{Parser, Subcommand},
    crossover_config::CrossoverConfig,
    crossover_relay::{InMemoryTopologyStore, SqliteTopologyStore, TopologyStore},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "crossover", about = "Crossover: relay messages between Discord channels")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Explicit config file (skips discovery).
    #[arg(long, global = true, env = "CROSSOVER_CONFIG")]
    config: Option<PathBuf>,

    /// Custom data directory (overrides default data dir).
    #[arg(long, global = true, env = "CROSSOVER_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay bot (default when no subcommand is provided).
    Run {
        /// Keep topology in memory only; nothing survives a restart.
        #[arg(long)]
        ephemeral: bool,
    },
    /// Database management (reset, clear, migrate).
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Inspect stored rooms.
    Rooms {
        #[command(subcommand)]
        action: rooms_commands::RoomsAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Load the explicit config file, or discover one.
fn load_config(cli: &Cli) -> anyhow::Result<(CrossoverConfig, Option<PathBuf>)> {
    match &cli.config {
        Some(path) => {
            let mut config = crossover_config::load_config(path)?;
            crossover_config::apply_env_overrides(&mut config);
            Ok((config, Some(path.clone())))
        },
        None => Ok(crossover_config::discover_and_load()),
    }
}

/// Open the configured database, creating the data dir for the default
/// location, and bring the schema up to date.
pub(crate) async fn open_store(config: &CrossoverConfig) -> anyhow::Result<SqliteTopologyStore> {
    if config.database.url.is_none() {
        std::fs::create_dir_all(crossover_config::data_dir())?;
    }
    let store = SqliteTopologyStore::connect(
        &config.database.resolved_url(),
        config.database.max_connections,
    )
    .await?;
    crossover_relay::run_migrations(store.pool()).await?;
    Ok(store)
}

async fn run(config: CrossoverConfig, ephemeral: bool) -> anyhow::Result<()> {
    let report = crossover_config::validate(&config);
    for d in &report.diagnostics {
        info!(severity = ?d.severity, path = %d.path, "{}", d.message);
    }
    if report.has_errors() {
        anyhow::bail!("configuration has errors; run `crossover config check`");
    }

    if ephemeral {
        info!("using in-memory topology store");
        let store: Arc<dyn TopologyStore> = Arc::new(InMemoryTopologyStore::new());
        crossover_discord::start(&config, store).await?;
        return Ok(());
    }

    let sqlite = open_store(&config).await?;
    let result = crossover_discord::start(&config, Arc::new(sqlite.clone())).await;
    sqlite.close().await;
    result.map_err(Into::into)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "crossover starting");

    if let Some(ref dir) = cli.data_dir {
        crossover_config::set_data_dir(dir.clone());
    }
    let (config, config_path) = load_config(&cli)?;

    match cli.command {
        None => run(config, false).await,
        Some(Commands::Run { ephemeral }) => run(config, ephemeral).await,
        Some(Commands::Db { action }) => db_commands::handle_db(action, &config).await,
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, &config, config_path.as_deref())
        },
        Some(Commands::Rooms { action }) => rooms_commands::handle_rooms(action, &config).await,
    }
}
