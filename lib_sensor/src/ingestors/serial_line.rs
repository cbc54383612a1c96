//! # Device Line Ingestor
//!
//! Reads the device's newline-delimited text stream and submits every decoded
//! line to the coordinator.
//!
//! ## Key Design Principles:
//! - **Transport-agnostic**: the byte stream comes from a `LineConnector`. The
//!   production connector opens a serial port; tests hand in in-memory streams.
//! - **Never dies on bad input**: a line that does not decode is logged and
//!   dropped, and a line longer than the configured limit is discarded without
//!   buffering the rest of it.
//! - **Resilience**: any transport failure (open error, read error, end of
//!   stream) is logged and followed by a fixed delay before reconnecting. This
//!   repeats until the shutdown token is cancelled.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;

use crate::core::coordinator::{IngestionCoordinator, Source};
use crate::ingestors::line_protocol::parse_line;

/// Reader settings.
#[derive(Debug, Clone)]
pub struct SerialLineConfig {
    /// Pause between a transport failure and the next connection attempt.
    pub retry_delay: Duration,
    /// Lines longer than this many bytes are discarded.
    pub max_line_length: usize,
}

impl Default for SerialLineConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
            max_line_length: 1024,
        }
    }
}

/// Why a reading session ended.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The source could not be opened.
    #[error("failed to open {target}: {reason}")]
    Connect {
        /// What was being opened.
        target: String,
        /// Underlying error text.
        reason: String,
    },
    /// Reading from an open source failed.
    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),
    /// The source reached end of stream.
    #[error("stream closed by the device")]
    Closed,
}

/// Opens the byte stream the reader consumes.
pub trait LineConnector: Send + Sync + 'static {
    /// The stream type produced by a successful connection.
    type Stream: AsyncRead + Unpin + Send + 'static;

    /// Human-readable target, for logs.
    fn describe(&self) -> String;

    /// Opens a fresh stream.
    fn connect(&self) -> impl Future<Output = Result<Self::Stream, TransportError>> + Send;
}

/// Opens a serial port with `tokio-serial`.
#[cfg(feature = "serial")]
#[derive(Debug, Clone)]
pub struct SerialPortConnector {
    /// Device path (`/dev/ttyUSB0`, `COM15`, ...).
    pub path: String,
    /// Line speed.
    pub baud_rate: u32,
}

#[cfg(feature = "serial")]
impl LineConnector for SerialPortConnector {
    type Stream = tokio_serial::SerialStream;

    fn describe(&self) -> String {
        format!("serial port {} at {} baud", self.path, self.baud_rate)
    }

    async fn connect(&self) -> Result<Self::Stream, TransportError> {
        use tokio_serial::SerialPortBuilderExt;

        tokio_serial::new(self.path.as_str(), self.baud_rate)
            .open_native_async()
            .map_err(|e| TransportError::Connect {
                target: self.path.clone(),
                reason: e.to_string(),
            })
    }
}

/// Long-lived reader feeding device lines into the coordinator.
pub struct SerialLineIngestor<C> {
    connector: C,
    coordinator: Arc<IngestionCoordinator>,
    config: SerialLineConfig,
}

impl<C: LineConnector> SerialLineIngestor<C> {
    /// Creates a reader over `connector`.
    pub fn new(connector: C, coordinator: Arc<IngestionCoordinator>, config: SerialLineConfig) -> Self {
        Self {
            connector,
            coordinator,
            config,
        }
    }

    /// Reads, reconnecting after every transport failure, until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        let target = self.connector.describe();
        log::info!("Device line reader started for {}", target);

        loop {
            let failure = tokio::select! {
                _ = shutdown.cancelled() => break,
                failure = self.session() => failure,
            };

            log::error!(
                "Device transport error on {}: {}. Retrying in {}ms...",
                target,
                failure,
                self.config.retry_delay.as_millis()
            );

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.retry_delay) => {
                    log::info!("Attempting to reopen {}...", target);
                }
            }
        }

        log::info!("Device line reader for {} stopped.", target);
    }

    /// Decodes and submits one line. Failures are logged, never returned.
    pub async fn handle_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        log::debug!("Received device line: {}", line);

        match parse_line(line) {
            Ok(raw) => {
                // Rejections and storage failures are already logged by the coordinator.
                let _ = self.coordinator.submit(&raw, Source::SerialLine).await;
            }
            Err(e) => {
                log::warn!("Incomplete or invalid sensor data from device ({}): {}", e, line);
            }
        }
    }

    // One connection's lifetime. Always ends in a transport failure.
    async fn session(&self) -> TransportError {
        let stream = match self.connector.connect().await {
            Ok(stream) => stream,
            Err(e) => return e,
        };
        log::info!("{} open", self.connector.describe());

        match self.pump(stream).await {
            Ok(()) => TransportError::Closed,
            Err(e) => e,
        }
    }

    async fn pump(&self, stream: C::Stream) -> Result<(), TransportError> {
        let mut reader = BufReader::new(stream);
        let mut line: Vec<u8> = Vec::with_capacity(128);
        let mut discarding = false;

        loop {
            let (consumed, complete) = {
                let available = reader.fill_buf().await?;
                if available.is_empty() {
                    // A final line without a terminator still counts.
                    if !discarding && !line.is_empty() {
                        let text = String::from_utf8_lossy(&line).into_owned();
                        self.handle_line(&text).await;
                    }
                    return Ok(());
                }
                match available.iter().position(|&b| b == b'\n') {
                    Some(pos) => {
                        if !discarding {
                            line.extend_from_slice(&available[..pos]);
                        }
                        (pos + 1, true)
                    }
                    None => {
                        if !discarding {
                            line.extend_from_slice(available);
                        }
                        (available.len(), false)
                    }
                }
            };
            reader.consume(consumed);

            if !discarding && line.len() > self.config.max_line_length {
                log::warn!(
                    "Dropping device line longer than {} bytes",
                    self.config.max_line_length
                );
                discarding = true;
                line.clear();
            }

            if complete {
                if !discarding {
                    let text = String::from_utf8_lossy(&line).into_owned();
                    self.handle_line(&text).await;
                }
                discarding = false;
                line.clear();
            }
        }
    }
}
