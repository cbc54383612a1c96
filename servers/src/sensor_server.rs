//! # Sensor Dashboard Server
//!
//! Receives distance/TDS readings over HTTP and from a serial-attached
//! device, keeps the history in a JSON snapshot, and pushes every accepted
//! reading to connected dashboards over WebSocket.
//!
//! ## Startup:
//! 1. Load `.env`, then configuration (defaults, `sensor_server.conf`, env/CLI).
//! 2. Start `fern` logging.
//! 3. Open the history store and build the coordinator.
//! 4. Spawn the device line reader if a serial port is configured, and the
//!    in-process simulated feed if an interval is configured.
//! 5. Serve the router until Ctrl-C or SIGTERM, then stop the producers.

#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use lib_sensor::{DurableStore, IngestionCoordinator, SubscriberRegistry};

mod sensor_logic;
use sensor_logic::{config, logger, upstream};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config();
    logger::setup_logging(&config.log_dir(), config.log_level())?;
    log::debug!("Effective configuration: {:?}", config);

    let data_file = config.data_file();
    let store = DurableStore::open(&data_file)
        .await
        .with_context(|| format!("failed to open history at {}", data_file.display()))?;
    log::info!("History snapshot at {}", data_file.display());

    let registry = Arc::new(SubscriberRegistry::new(config.subscriber_buffer()));
    let coordinator = Arc::new(IngestionCoordinator::new(Arc::new(store), registry));

    let shutdown = CancellationToken::new();
    let producers: Vec<_> = [
        upstream::spawn(&config, Arc::clone(&coordinator), shutdown.clone()),
        upstream::spawn_simulated(&config, Arc::clone(&coordinator), shutdown.clone()),
    ]
    .into_iter()
    .flatten()
    .collect();

    let app = lib_sensor::web::router(Arc::clone(&coordinator), config.public_dir());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port()));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    log::info!("Server running on http://{}", addr);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    for handle in producers {
        let _ = handle.await;
    }

    log::info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Ctrl-C received, initiating shutdown."),
        _ = terminate => log::info!("SIGTERM received, initiating shutdown."),
    }
}
