//! Sluice bot binary: loads configuration, opens the store, connects to the
//! Bot API and runs until SIGINT or SIGTERM.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sluice_bot::api::{self, AppState};
use sluice_bot::{Bot, BotConfig, Dispatcher, Roster};
use sluice_gateway::{spawn_poller, Gateway, TelegramGateway};
use sluice_store::{Database, Store};

const INBOUND_QUEUE: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sluice_bot=debug")),
        )
        .init();

    info!("Starting Sluice bot v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = Arc::new(BotConfig::from_env()?);
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the store and connect to the Bot API
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    info!(path = ?db.path(), "Database opened");
    let store = Store::new(db);

    let telegram = Arc::new(TelegramGateway::new(&config.api_base_url, &config.token)?);
    let me = telegram.get_me().await?;
    info!(bot = %me.id, "Connected to Bot API");

    let roster = Roster::new();
    let gateway: Arc<dyn Gateway> = telegram.clone();
    let bot = Bot::new(config.clone(), store.clone(), gateway, roster.clone());

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = bot.scheduler().spawn(shutdown_rx.clone());

    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
    tasks.push(spawn_poller(telegram, inbound_tx, shutdown_rx.clone()));
    tasks.push(tokio::spawn(
        Dispatcher::new(bot).run(inbound_rx, shutdown_rx.clone()),
    ));

    if let Some(addr) = config.health_addr {
        let state = AppState {
            store: store.clone(),
            roster: roster.clone(),
        };
        let shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = api::serve(state, addr, shutdown).await {
                error!(error = %e, "Health API failed");
            }
        }));
    }

    // -----------------------------------------------------------------------
    // 5. Wait for shutdown signal
    // -----------------------------------------------------------------------
    wait_for_signal().await;
    info!("Shutdown signal received, draining");

    let _ = shutdown_tx.send(true);
    for result in futures::future::join_all(tasks).await {
        if let Err(e) = result {
            error!(error = %e, "Background task panicked");
        }
    }

    info!("Sluice bot stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            error!(error = %e, "Could not install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
