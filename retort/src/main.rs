#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod routes;

use std::sync::Arc;

use args::Args;
use clap::Parser;
use retort_config::Config;
use retort_core::{HandlerKind, HandlerOptions, HandlerRegistry};
use retort_server::Server;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration; a missing file falls back to defaults so the
    // server runs out of the box
    let mut config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        Config::default()
    };
    if let Some(listen) = args.listen {
        config.server.listen_address = Some(listen);
    }

    init_tracing();

    tracing::info!(
        config_path = %args.config.display(),
        "starting retort"
    );

    // Build the handler registry from configuration
    let registry = build_registry(&config);

    // Build server
    let server = Server::new(&config, registry, routes::router());

    // Set up graceful shutdown
    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_clone.cancel();
    });

    // Run server
    server.serve(shutdown).await?;

    tracing::info!("retort stopped");
    Ok(())
}

/// Registry with defaults, seeded from the reply configuration
fn build_registry(config: &Config) -> Arc<HandlerRegistry> {
    HandlerRegistry::builder()
        .default_options(
            HandlerKind::ErrorToObject,
            HandlerOptions {
                include_stack: Some(config.reply.include_stack),
                locale: config.reply.locale.clone(),
                ..HandlerOptions::default()
            },
        )
        .build()
}

/// Set up fmt logging with an env-derived filter
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
