//! Test server lifecycle management
//!
//! Each test gets an isolated server on a random port with its own store.

use super::constants::*;
use gx_mcp_server::mcp::McpDispatcher;
use gx_mcp_server::server::{serve, RequestsLoggingLevel, ServerConfig};
use gx_mcp_server::services::{CoreConfig, Services};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// When dropped, the server gracefully shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,
    pub services: Services,

    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(ServerConfig::default(), CoreConfig::default()).await
    }

    /// Spawns a server with the given settings. Port and metrics are
    /// always overridden so tests never collide.
    pub async fn spawn_with(config: ServerConfig, core: CoreConfig) -> Self {
        let services = Services::new(&core).expect("Failed to build services");
        let dispatcher = Arc::new(McpDispatcher::new(services.clone()));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            metrics_enabled: false,
            ..config
        };

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            serve(listener, config, dispatcher, async {
                shutdown_rx.await.ok();
            })
            .await
            .expect("Server failed");
        });

        let server = Self {
            base_url,
            services,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/health", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
