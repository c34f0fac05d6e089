mod config;
mod db;
mod ingest;
mod stream;
mod sweep;
#[cfg(test)]
mod testing;

use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{
    config::Config, db::store::PgStore, ingest::service::IngestService,
    stream::nats::NatsConnector, sweep::PresenceSweep,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent — env vars may be set externally)
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env()?;

    // Connect to DB and run migrations
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database ready");

    let store = PgStore::new(pool);
    let cancel = CancellationToken::new();

    // Spawn the ingestion loop. A missing stream descriptor is not fatal to
    // the process; the loop just never starts.
    let ingest_handle = match &config.stream {
        Some(stream_config) => {
            let connector = NatsConnector::new(stream_config.clone());
            let service = IngestService::new(
                connector,
                store.clone(),
                config.retry_policy(),
                config.ingest_enabled,
            );
            Some(tokio::spawn(service.run(cancel.clone())))
        }
        None => {
            warn!("EVENT_STREAM_URL not set; ingestion will not start");
            None
        }
    };

    // Presence sweep: flips devices to inactive once they go quiet.
    let sweep = PresenceSweep::new(store, config.sweep_interval_secs, config.offline_after_secs);
    let sweep_handle = tokio::spawn(sweep.run(cancel.clone()));

    shutdown_signal().await;
    cancel.cancel();

    if let Some(handle) = ingest_handle {
        match handle.await {
            Ok(outcome) => info!(outcome = ?outcome, "Ingestion loop exited"),
            Err(e) => warn!(error = %e, "Ingestion task panicked"),
        }
    }
    let _ = sweep_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
