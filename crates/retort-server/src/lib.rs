//! Axum binding for the reply-normalization pipeline
//!
//! Wires a [`Dispatcher`] around an application router: every request gets
//! a bound reply, handlers mutate it through [`ReplyHandle`], and the
//! dispatcher delivers the resolved envelope.

mod dispatch;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::response::IntoResponse;
use http::StatusCode;
use retort_config::Config;
use retort_core::HandlerRegistry;
use tower_http::trace::TraceLayer;

pub use dispatch::{
    Dispatch, DispatchOptions, Dispatcher, MissingReply, ReplyHandle, ReplyRejection,
    envelope_response,
};

/// Assembled server: application routes behind the dispatch layer
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration, a handler registry, and the
    /// application's routes
    #[must_use]
    pub fn new(config: &Config, registry: Arc<HandlerRegistry>, routes: Router) -> Self {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let dispatcher = Dispatcher::with_options(registry, DispatchOptions::from(&config.reply));

        let mut app = routes;

        // Health check
        if config.server.health.enabled {
            app = app.route(&config.server.health.path, axum::routing::get(health_handler));
        }

        // Dispatch layer — binds a reply to every request, innermost so it
        // runs just around the handlers
        app = app.layer(axum::middleware::from_fn(move |req, next| {
            let dispatcher = dispatcher.clone();
            async move { dispatcher.dispatch(req, next).await }
        }));

        // Tracing
        app = app.layer(TraceLayer::new_for_http());

        Self {
            router: app,
            listen_address,
        }
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
