//! HTTP server for the mdlive development server.
//!
//! This crate provides a native Rust HTTP server using axum, serving:
//! - Rendered markdown, directory listings and static files from a root directory
//! - An event stream at `/refresh/` that tells browsers to reload when files change
//!
//! # Quick Start
//!
//! ```ignore
//! use std::path::PathBuf;
//! use mdlive_server::{ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         root_dir: PathBuf::from("docs"),
//!         ..ServerConfig::default()
//!     };
//!
//!     run_server(config).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum server (mdlive-server)
//!                        │
//!                        ├─► /refresh/ event stream ◄── Hub ◄── ChangeDetector ◄── notify
//!                        │
//!                        └─► Documents: listing / markdown (mdlive-renderer) / static file
//! ```

mod app;
mod error;
mod handlers;
pub mod live_reload;
mod state;
mod templates;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub use error::ServerError;
use live_reload::{ChangeDetector, DEFAULT_DEBOUNCE, Hub};
use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory to serve and watch.
    pub root_dir: PathBuf,
    /// Header template path.
    pub header_path: PathBuf,
    /// Footer template path.
    pub footer_path: PathBuf,
    /// Quiet period that ends a burst of filesystem events.
    pub debounce: Duration,
    /// Interval between keep-alive comments on event streams.
    pub keep_alive: Duration,
    /// Application version (for cache invalidation).
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            root_dir: PathBuf::from("."),
            header_path: PathBuf::from("header.html"),
            footer_path: PathBuf::from("footer.html"),
            debounce: DEFAULT_DEBOUNCE,
            keep_alive: Duration::from_secs(15),
            version: String::new(),
        }
    }
}

/// A bound server with live reload running.
///
/// Binding starts the hub and the change detector, so filesystem changes
/// are observed from the moment [`LiveServer::bind`] returns.
pub struct LiveServer {
    listener: TcpListener,
    state: Arc<AppState>,
    detector: JoinHandle<()>,
}

impl LiveServer {
    /// Validate the configuration, bind the listener and start live reload.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a directory, the address is
    /// invalid, or the port cannot be bound.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        if !config.root_dir.is_dir() {
            return Err(ServerError::InvalidRoot(config.root_dir));
        }

        let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        let hub = Hub::spawn();
        let detector = ChangeDetector::new(config.root_dir.clone(), hub.clone())
            .with_debounce(config.debounce)
            .start();
        let state = Arc::new(AppState::new(&config, hub));

        tracing::info!(
            address = %listener.local_addr()?,
            root = %config.root_dir.display(),
            "Starting server"
        );

        Ok(Self {
            listener,
            state,
            detector,
        })
    }

    /// Address the server is listening on.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Live reload hub shared by the event stream endpoint and the detector.
    #[must_use]
    pub fn hub(&self) -> &Hub {
        &self.state.hub
    }

    /// Serve until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails while running.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` completes.
    ///
    /// Open event streams are closed on shutdown so that in-flight
    /// connections can drain.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails while running.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let hub = self.state.hub.clone();
        let app = app::create_router(self.state);

        let result = axum::serve(self.listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                hub.close_all();
            })
            .await;

        self.detector.abort();
        result.map_err(ServerError::from)
    }
}

/// Run the server.
///
/// # Arguments
///
/// * `config` - Server configuration
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    LiveServer::bind(config).await?.run().await
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;
    use tokio::time::{Instant, timeout};

    use super::*;
    use crate::live_reload::CHANGE_MESSAGE;

    /// Read from `stream` into `buf` until it contains `needle`.
    async fn read_until(stream: &mut TcpStream, buf: &mut String, needle: &str) {
        let mut chunk = [0u8; 1024];
        while !buf.contains(needle) {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before {needle:?} arrived");
            buf.push_str(&String::from_utf8_lossy(&chunk[..n]));
        }
    }

    fn test_config(root: PathBuf) -> ServerConfig {
        ServerConfig {
            port: 0,
            root_dir: root,
            keep_alive: Duration::from_millis(100),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_bind_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().join("missing"));

        let result = LiveServer::bind(config).await;

        assert!(matches!(result, Err(ServerError::InvalidRoot(_))));
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_host() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            host: "not a host".to_owned(),
            ..test_config(dir.path().to_path_buf())
        };

        let result = LiveServer::bind(config).await;

        assert!(matches!(result, Err(ServerError::Address(_))));
    }

    #[tokio::test]
    async fn test_file_change_reaches_open_stream() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.md");
        std::fs::write(&file, "# A\n").unwrap();

        let server = LiveServer::bind(test_config(dir.path().to_path_buf()))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let hub = server.hub().clone();
        let (stop, stopped) = oneshot::channel::<()>();
        let serving = tokio::spawn(server.run_until(async move {
            let _ = stopped.await;
        }));

        let before = hub.client_count().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /refresh/ HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let mut received = String::new();
        read_until(&mut stream, &mut received, "\r\n\r\n").await;
        assert!(received.starts_with("HTTP/1.1 200"));
        assert!(
            received
                .to_ascii_lowercase()
                .contains("content-type: text/event-stream")
        );
        assert_eq!(hub.client_count().await, before + 1);

        std::fs::write(&file, "# A, changed\n").unwrap();

        let frame = format!("data: Message: {CHANGE_MESSAGE}\n\n");
        timeout(
            Duration::from_secs(10),
            read_until(&mut stream, &mut received, &frame),
        )
        .await
        .expect("no change frame arrived");

        // Give a duplicate frame time to show up; keep-alive comments keep
        // the connection producing bytes meanwhile.
        let _ = timeout(
            Duration::from_millis(500),
            read_until(&mut stream, &mut received, "never sent"),
        )
        .await;
        assert_eq!(received.matches(&frame).count(), 1);

        drop(stream);

        let deadline = Instant::now() + Duration::from_secs(5);
        while hub.client_count().await != before {
            assert!(Instant::now() < deadline, "client was never unregistered");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        stop.send(()).unwrap();
        serving.await.unwrap().unwrap();
    }
}
