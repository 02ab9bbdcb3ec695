use std::{sync::Arc, time::Duration};

use modbot::bot::{
    commands::{commands::BotResult, general::GeneralModule, interactive::InteractiveModule, moderation::ModerationModule, ModuleRegistry},
    db::{command_log::{subscribe_command_log, SqliteCommandLog}, connect, initialize_database},
    dispatcher::dispatcher::Dispatcher,
    events::events::subscribe_logging,
    platforms::discord::discord::{build_discord_client, DiscordResolver},
    run_event_loop,
    state::def::{AppState, BotConfig, BotSecrets},
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!("Bot stopped: {e}");
        std::process::exit(1);
    }
}

async fn run() -> BotResult<()> {
    let secrets = BotSecrets::from_env()?;
    let config = BotConfig::load()?;

    let pool = connect(&config.database_url).await?;
    initialize_database(&pool).await?;

    let (tx, rx) = mpsc::channel(config.queue_capacity);
    let mut client = build_discord_client(&secrets, tx).await?;

    let resolver = Arc::new(DiscordResolver::new(client.cache.clone(), client.http.clone()));
    let state = Arc::new(AppState::new(config, resolver));

    subscribe_logging(&state.emitter);
    subscribe_command_log(&state.emitter, Arc::new(SqliteCommandLog::new(pool)), state.tasks.clone());

    let mut registry = ModuleRegistry::new(state.clone());
    registry.register(Arc::new(GeneralModule))?;
    registry.register(Arc::new(InteractiveModule))?;
    registry.register(Arc::new(ModerationModule::new()?))?;
    let modules = registry.freeze();
    info!("Registered {} modules", modules.len());

    let dispatcher = Arc::new(Dispatcher::new(state, modules));
    let event_loop = tokio::spawn(run_event_loop(dispatcher, rx));

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await?;
    drop(client);

    match tokio::time::timeout(DRAIN_TIMEOUT, event_loop).await {
        Ok(Ok(())) => info!("Event loop drained"),
        Ok(Err(e)) => error!("Event loop task failed: {e}"),
        Err(_) => warn!("Handlers still running after {:?}, exiting anyway", DRAIN_TIMEOUT),
    }
    Ok(())
}
