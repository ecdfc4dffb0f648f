mod config;
mod ports;

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;

use cardsync_client::{EngineConfig, EnginePorts, NowServerClient, SyncEngine, SystemClock};
use cardsync_storage_sqlite::{create_pool, init, run_migrations, spawn_writer, SqliteKeyValueStore};

use config::DaemonConfig;
use ports::{LoggingNotificationSink, StaticPlatformSignals, StaticTokenAuth};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = DaemonConfig::load().context("Failed to load configuration")?;

    let db_path = init(&config.data_dir).context("Failed to prepare data directory")?;
    run_migrations(&db_path).context("Failed to run database migrations")?;
    let pool = create_pool(&db_path).context("Failed to open database")?;
    let writer = spawn_writer(pool.as_ref().clone());

    let remote = NowServerClient::new(&config.api_url).context("Failed to build HTTP client")?;
    info!("[CardSync] Using notification service at {}", remote.base_url());

    let ports = EnginePorts {
        store: Arc::new(SqliteKeyValueStore::new(pool, writer)),
        remote: Arc::new(remote),
        auth: Arc::new(StaticTokenAuth::new(config.access_token.clone())),
        sink: Arc::new(LoggingNotificationSink::default()),
        signals: Arc::new(StaticPlatformSignals::new(
            config.notifications_enabled,
            config.background_enabled,
        )),
        clock: Arc::new(SystemClock),
    };

    let engine = SyncEngine::new(EngineConfig::new(config.ui_locale.clone()), ports);
    engine.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("[CardSync] Shutdown requested");
    engine.shutdown().await;
    Ok(())
}
