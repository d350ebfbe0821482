//! AccountSync Web Server - identity provider webhook receiver.
//!
//! This binary:
//! - Verifies signed account lifecycle webhooks
//! - Applies updates and deletes before responding
//! - Acknowledges creates immediately and provisions them in the background
//!
//! On shutdown it waits briefly for background creates to finish.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use accountsync::store::{AccountStore, HttpAccountStore, MemoryAccountStore};
use accountsync::web::{router, AppState, WEBHOOK_PATH};
use accountsync::Config;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        webhook_secret_configured = config.webhook_secret.is_some(),
        webhook_tolerance_secs = config.webhook_tolerance_secs,
        account_store_url = ?config.account_store_url,
        "config_loaded"
    );

    if config.webhook_secret.is_none() {
        warn!("webhook_secret_missing");
    }

    // Pick the account store; nothing connects until the first webhook
    let store: Arc<dyn AccountStore> = match &config.account_store_url {
        Some(url) => Arc::new(
            HttpAccountStore::new(
                url,
                Duration::from_millis(config.account_store_timeout_ms),
            )
            .context("Failed to configure account store")?,
        ),
        None => {
            warn!("account_store_url_missing_using_memory_store");
            Arc::new(MemoryAccountStore::new())
        }
    };

    // Create application state
    let state = AppState::new(config.clone(), store);
    let deferred = state.deferred.clone();

    // Build the router
    let app = router(state).layer(TraceLayer::new_for_http());

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, webhook_path = WEBHOOK_PATH, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Give background creates a chance to land
    info!(in_flight = deferred.in_flight(), "deferred_draining");
    if deferred.drain(DRAIN_TIMEOUT).await {
        info!("deferred_drained");
    }

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
