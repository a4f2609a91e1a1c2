//! CallHub Server: real-time call signaling.
//!
//! Main entry point that wires all crates together and starts the server.

use std::future::IntoFuture;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use callhub_api::{AppState, build_app};
use callhub_core::config::AppConfig;
use callhub_core::error::AppError;
use callhub_database::StoreManager;
use callhub_realtime::RealtimeEngine;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("CALLHUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting CallHub v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Stores ───────────────────────────────────────────
    tracing::info!(provider = %config.database.provider, "Initializing call store...");
    let stores = StoreManager::new(&config.database).await?;

    // ── Step 2: Realtime engine ──────────────────────────────────
    let realtime = RealtimeEngine::new(&config, &stores);

    // ── Step 3: Build and start HTTP server ──────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let app = build_app(AppState::new(config, stores.clone(), realtime.clone()));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
    tracing::info!("CallHub server listening on {}", addr);

    // ── Step 4: Graceful shutdown ────────────────────────────────
    let (signalled_tx, mut signalled_rx) = watch::channel(false);
    let engine = realtime.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, closing connections...");
        engine.shutdown();
        let _ = signalled_tx.send(true);
    });
    let mut server = tokio::spawn(server.into_future());

    let outcome = tokio::select! {
        joined = &mut server => Some(joined),
        _ = signalled_rx.changed() => tokio::time::timeout(grace, &mut server).await.ok(),
    };
    match outcome {
        Some(Ok(Ok(()))) => {}
        Some(Ok(Err(e))) => return Err(AppError::internal(format!("Server error: {e}"))),
        Some(Err(e)) => return Err(AppError::internal(format!("Server task failed: {e}"))),
        None => {
            tracing::warn!(
                grace_seconds = grace.as_secs(),
                "Shutdown grace period elapsed, dropping remaining connections"
            );
            server.abort();
        }
    }

    stores.close().await;
    tracing::info!("CallHub server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
}
