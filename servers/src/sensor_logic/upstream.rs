use std::sync::Arc;

use lib_sensor::IngestionCoordinator;
use lib_sensor::ingestors::{DummyGenerator, SerialLineConfig, SerialLineIngestor, SerialPortConnector};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::sensor_logic::config::Config;

/// Starts the device line reader when a serial port is configured.
pub fn spawn(config: &Config, coordinator: Arc<IngestionCoordinator>, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
    let Some(path) = config.serial_port_path.clone() else {
        log::info!("No serial port configured; device line reader disabled.");
        return None;
    };

    let connector = SerialPortConnector {
        path,
        baud_rate: config.baud_rate(),
    };
    let reader_config = SerialLineConfig {
        retry_delay: config.serial_retry_delay(),
        ..Default::default()
    };
    let ingestor = SerialLineIngestor::new(connector, coordinator, reader_config);

    Some(tokio::spawn(async move { ingestor.run(shutdown).await }))
}

/// Starts the in-process simulated feed when an interval is configured.
pub fn spawn_simulated(config: &Config, coordinator: Arc<IngestionCoordinator>, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
    let interval = config.simulate_interval()?;
    Some(tokio::spawn(DummyGenerator::default().feed(coordinator, interval, shutdown)))
}
