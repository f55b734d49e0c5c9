//! Test server wrapper that starts Retort on a random port

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use retort_config::Config;
use retort_core::HandlerRegistry;
use retort_server::Server;
use tokio_util::sync::CancellationToken;

/// A running test server instance
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
}

impl TestServer {
    /// Start a test server with the dispatch layer installed
    ///
    /// Binds to port 0 for automatic port assignment
    pub async fn start(
        config: Config,
        registry: Arc<HandlerRegistry>,
        routes: Router,
    ) -> anyhow::Result<Self> {
        let server = Server::new(&config, registry, routes);
        Self::spawn(server.into_router()).await
    }

    /// Start a test server from a raw router, without the dispatch layer
    ///
    /// Used to exercise misconfiguration paths
    pub async fn start_raw(routes: Router) -> anyhow::Result<Self> {
        Self::spawn(routes).await
    }

    async fn spawn(router: Router) -> anyhow::Result<Self> {
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        let client = reqwest::Client::new();

        Ok(Self {
            addr,
            shutdown,
            client,
        })
    }

    /// Full URL for a path on the running server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Get a reference to the HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
