//! Health endpoints for the registry service.
//!
//! - `GET /health` - Liveness probe (is the process running?)
//! - `GET /ready` - Readiness probe (is the supervised registry running?)
//! - `GET /status` - JSON `RegistryStatus` of the supervised registry
//!
//! The `/metrics` endpoint is served separately via `metrics-exporter-prometheus`.

use crate::actors::RegistryStatus;
use crate::directory::RegistryDirectory;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Health state for the registry service.
#[derive(Debug)]
pub struct HealthState {
    /// Always true after startup.
    live: AtomicBool,
    /// True once the supervised registry is running.
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (live=true, ready=false).
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    /// Mark the service as ready to serve traffic.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark the service as not ready (e.g., during shutdown).
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    /// Check if the service is live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Check if the service is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// State shared by the probe and status handlers.
#[derive(Debug, Clone)]
pub struct ProbeState {
    health: Arc<HealthState>,
    directory: RegistryDirectory,
    registry_name: String,
}

impl ProbeState {
    /// Probe the registry registered as `registry_name` in `directory`.
    #[must_use]
    pub fn new(
        health: Arc<HealthState>,
        directory: RegistryDirectory,
        registry_name: impl Into<String>,
    ) -> Self {
        Self {
            health,
            directory,
            registry_name: registry_name.into(),
        }
    }
}

/// Create the health router with liveness, readiness and status endpoints.
///
/// Readiness requires both the health flag and a running registry, so the
/// service reports not-ready between a registry crash and its restart.
pub fn health_router(state: ProbeState) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

async fn liveness_handler(State(state): State<ProbeState>) -> StatusCode {
    if state.health.is_live() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn readiness_handler(State(state): State<ProbeState>) -> StatusCode {
    if state.health.is_ready() && state.directory.whereis(&state.registry_name).is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn status_handler(
    State(state): State<ProbeState>,
) -> Result<Json<RegistryStatus>, StatusCode> {
    let registry = state
        .directory
        .whereis(&state.registry_name)
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;

    registry.status().await.map(Json).map_err(|e| {
        debug!(
            target: "pg.health",
            name = %state.registry_name,
            error = %e,
            "Status request failed"
        );
        StatusCode::SERVICE_UNAVAILABLE
    })
}
