//! # Shopfront Rates API
//!
//! HTTP server for the storefront's fallback exchange rates.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shopfront_rates_api::{router, AppState, RatesApiConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,shopfront=debug,sqlx=warn")),
        )
        .with_target(true)
        .init();

    info!("Starting Shopfront Rates API...");

    // Load configuration
    let config = RatesApiConfig::load()?;
    if config.exchange_api_key.is_none() {
        warn!("EXCHANGE_API_KEY is not set; rate requests will fail");
    }
    info!(
        port = config.port,
        origin = %config.allowed_origin,
        ttl_secs = config.cache_ttl.as_secs(),
        "Configuration loaded"
    );

    let bind_addr = config.bind_address();
    let app = router(Arc::new(AppState::new(config)))?;

    let listener = TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "Rates API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
