//! # End-to-End Test Harness
//!
//! Boots the real router on a loopback port over a throwaway data directory,
//! so the tests in `tests/` talk to the service exactly as a dashboard or a
//! producer would.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use lib_sensor::{DurableStore, IngestionCoordinator, SubscriberRegistry};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Live feed client type used by the tests.
pub type FeedClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A running server instance. Dropping it aborts the server task and deletes
/// its data directory.
pub struct TestServer {
    /// Address the router is bound to.
    pub addr: SocketAddr,
    /// The coordinator behind the router.
    pub coordinator: Arc<IngestionCoordinator>,
    /// Where the history snapshot lives.
    pub data_file: PathBuf,
    /// Plain HTTP client.
    pub http: reqwest::Client,
    task: JoinHandle<()>,
    _dir: TempDir,
}

impl TestServer {
    /// Starts a server with the given per-viewer queue depth.
    pub async fn start_with_buffer(buffer: usize) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let data_file = dir.path().join("data.json");
        let public_dir = dir.path().join("public");
        std::fs::create_dir_all(&public_dir)?;
        std::fs::write(public_dir.join("index.html"), "<html><body>dashboard</body></html>")?;
        std::fs::write(public_dir.join("app.js"), "console.log('dashboard');")?;

        let store = Arc::new(DurableStore::open(&data_file).await?);
        let registry = Arc::new(SubscriberRegistry::new(buffer));
        let coordinator = Arc::new(IngestionCoordinator::new(store, registry));

        let app = lib_sensor::web::router(Arc::clone(&coordinator), &public_dir);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            coordinator,
            data_file,
            http: reqwest::Client::new(),
            task,
            _dir: dir,
        })
    }

    /// Starts a server with the default queue depth.
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with_buffer(lib_sensor::core::registry::DEFAULT_SUBSCRIBER_BUFFER).await
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Opens a live feed connection and waits until the server has registered it.
    pub async fn connect_feed(&self) -> anyhow::Result<FeedClient> {
        let expected = self.coordinator.registry().len() + 1;
        let (socket, _) = connect_async(format!("ws://{}/ws", self.addr)).await?;
        self.wait_for_subscribers(expected).await?;
        Ok(socket)
    }

    /// Polls until exactly `count` viewers are registered.
    pub async fn wait_for_subscribers(&self, count: usize) -> anyhow::Result<()> {
        for _ in 0..200 {
            if self.coordinator.registry().len() == count {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        anyhow::bail!(
            "expected {} subscribers, have {}",
            count,
            self.coordinator.registry().len()
        )
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Next text frame from the feed, parsed as JSON, or an error after `timeout`.
pub async fn next_json(feed: &mut FeedClient, timeout: Duration) -> anyhow::Result<serde_json::Value> {
    loop {
        let frame = tokio::time::timeout(timeout, feed.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("live feed closed"))??;
        match frame {
            Message::Text(text) => return Ok(serde_json::from_str(text.as_str())?),
            Message::Close(_) => anyhow::bail!("live feed closed"),
            _ => continue,
        }
    }
}
