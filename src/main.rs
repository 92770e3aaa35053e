use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ridepool::api::DynAPI;
use ridepool::config::Config;
use ridepool::db::{MemoryStore, PgStore, Store};
use ridepool::engine::Engine;
use ridepool::error::Error;
use ridepool::server;
use ridepool::worker::TripStatusWorker;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ridepool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = run().await {
        tracing::error!("ridepool stopped: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    let config = Config::from_env()?;

    match &config.database_url {
        Some(url) => {
            let store = PgStore::new(url, config.max_connections).await?;
            start(Arc::new(store), &config).await
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, data is kept in memory only");
            start(Arc::new(MemoryStore::new()), &config).await
        }
    }
}

async fn start<S: Store>(store: Arc<S>, config: &Config) -> Result<(), Error> {
    let api = Arc::new(Engine::new(store.clone())?) as DynAPI;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = TripStatusWorker::new(store, config.trip_status_tick).spawn(shutdown_rx.clone());

    let server = server::serve(api, config.listen_addr, shutdown_rx);
    tokio::pin!(server);

    let result = tokio::select! {
        result = &mut server => result,
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(true);
            server.await
        }
    };

    let _ = shutdown_tx.send(true);

    if let Err(err) = worker.await {
        tracing::error!("trip status worker panicked: {}", err);
    }

    result
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received ctrl-c, shutting down"),
        Err(err) => {
            tracing::error!("failed to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await
        }
    }
}
