use std::sync::Arc;

use {
    crossover_config::CrossoverConfig,
    crossover_relay::{
        CommandSurface, MembershipCache, RelayEngine, RelaySettings, RoomManager, TopologyStore,
    },
    secrecy::ExposeSecret,
    serenity::Client,
    tokio::sync::mpsc,
    tracing::{info, warn},
};

use crate::{
    error::{Error, Result},
    handler::CrossoverHandler,
    platform::DiscordPlatform,
    state::SessionState,
};

/// Inbound events buffered between the gateway and the relay engine.
const EVENT_BUFFER: usize = 256;

/// Run the bot until the gateway stops or Ctrl-C is pressed.
///
/// The relay engine consumes events on its own task and drains the queue
/// before this returns.
pub async fn start(config: &CrossoverConfig, store: Arc<dyn TopologyStore>) -> Result<()> {
    if !config.discord.has_token() {
        return Err(Error::message("discord.token is not set"));
    }

    let cache = Arc::new(MembershipCache::new());
    let manager = Arc::new(RoomManager::new(Arc::clone(&store), Arc::clone(&cache)));
    if config.relay.warm_cache_on_start {
        manager.warm_cache().await?;
    }

    let session = SessionState::default();
    let platform = Arc::new(DiscordPlatform::new(session.clone()));
    let surface = Arc::new(CommandSurface::new(
        Arc::clone(&manager),
        platform.clone(),
        config.discord.command_prefixes.clone(),
    ));
    let engine = RelayEngine::new(
        store,
        cache,
        platform,
        RelaySettings::from_config(config),
    );

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let handler = CrossoverHandler {
        session,
        surface,
        events: tx,
    };

    let mut client = Client::builder(
        config.discord.token.expose_secret(),
        CrossoverHandler::intents(),
    )
    .event_handler(handler)
    .await?;

    let engine_task = tokio::spawn(async move { engine.run(rx).await });

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            shard_manager.shutdown_all().await;
        }
    });

    info!("connecting to discord gateway");
    let result = client.start().await;

    // The handler owns the only sender; dropping the client lets the engine
    // drain and exit.
    drop(client);
    if let Err(e) = engine_task.await {
        warn!(error = %e, "relay engine task ended abnormally");
    }

    result.map_err(Error::from)
}
