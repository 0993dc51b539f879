//! Process-Group Registry Service
//!
//! Runs one supervised, named registry and exposes its health over HTTP.
//!
//! # Servers
//!
//! - HTTP server for health, status and metrics (default: 0.0.0.0:8090)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing (plain or JSON)
//! 3. Initialize Prometheus metrics recorder
//! 4. Start the supervised registry under its configured name
//! 5. Start health HTTP server (`/health`, `/ready`, `/status`, `/metrics`)
//! 6. Wait for shutdown signal

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use pg_service::config::Config;
use pg_service::directory::RegistryDirectory;
use pg_service::observability::{health_router, init_metrics_recorder, HealthState, ProbeState};
use pg_service::supervisor::RegistrySupervisor;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration comes first so the log format can follow it
    let config = Config::from_env()?;

    init_tracing(&config);

    info!("Starting process-group registry");
    info!(
        registry_name = %config.registry_name,
        mailbox_capacity = config.mailbox_capacity,
        call_timeout = ?config.call_timeout,
        health_bind_address = %config.health_bind_address,
        max_restarts = config.max_restarts,
        restart_window_seconds = config.restart_window.as_secs(),
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    info!("Initializing Prometheus metrics recorder...");
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    let health_state = Arc::new(HealthState::new());
    let shutdown_token = CancellationToken::new();

    // Start the supervised registry
    let directory = RegistryDirectory::new();
    let (supervisor, supervisor_task) = RegistrySupervisor::start(
        directory.clone(),
        config.registry_name.clone(),
        config
            .registry_options()
            .with_parent_token(shutdown_token.child_token()),
        config.restart_policy(),
    )
    .map_err(|e| {
        error!(error = %e, name = %config.registry_name, "Failed to start registry");
        e
    })?;
    info!(name = %supervisor.name(), "Registry started");

    // Start health HTTP server (MUST succeed - fail startup if it doesn't)
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;

    let probe_state = ProbeState::new(
        Arc::clone(&health_state),
        directory.clone(),
        config.registry_name.clone(),
    );

    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );

    let app = health_router(probe_state).merge(metrics_router);

    // Bind listener BEFORE spawning to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;
    info!(addr = %health_addr, "Health server bound successfully");

    let health_shutdown_token = shutdown_token.child_token();
    let health_task = tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    health_state.set_ready();
    info!("Process-group registry running - press Ctrl+C to shutdown");

    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Mark as not ready immediately so k8s stops sending traffic
    health_state.set_not_ready();

    // Stops the supervisor, its registry and the health server
    shutdown_token.cancel();
    supervisor.shutdown();

    if let Err(e) = supervisor_task.await {
        warn!(error = %e, "Supervisor task ended abnormally");
    }
    if let Err(e) = health_task.await {
        warn!(error = %e, "Health server task ended abnormally");
    }

    info!(
        restarts = supervisor.restarts(),
        "Process-group registry shutdown complete"
    );
    Ok(())
}

/// Initialize tracing from `RUST_LOG`, falling back to the configured level.
fn init_tracing(config: &Config) {
    // Prefix match covers both the `pg.*` targets and `pg_service` module paths
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("pg={}", config.observability.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
