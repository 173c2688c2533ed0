//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, stream status reporting, and Prometheus metrics.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (checks the stream connection)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::StreamStatus;
use crate::infrastructure::config::IngestMode;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Application version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Where the data path runs.
    pub ingest_mode: &'static str,
    /// Stream connection status.
    pub stream: StreamInfo,
    /// Presentation loop status.
    pub presentation: PresentationInfo,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Stream connected.
    Healthy,
    /// Stream dropped after having been connected; the grid shows stale data.
    Degraded,
    /// Stream never connected.
    Unhealthy,
}

/// Stream connection status.
#[derive(Debug, Clone, Serialize)]
pub struct StreamInfo {
    /// Connection state.
    pub state: &'static str,
    /// Whether the stream is connected.
    pub connected: bool,
    /// When the stream last connected.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Data messages received.
    pub messages_received: u64,
    /// Messages that failed to decode.
    pub decode_errors: u64,
}

/// Presentation loop status.
#[derive(Debug, Clone, Serialize)]
pub struct PresentationInfo {
    /// Records currently displayed.
    pub records: usize,
    /// Frames handed to the sink.
    pub frames_drawn: u64,
    /// Last measured frames per second.
    pub fps: u32,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    ingest_mode: IngestMode,
    status: Arc<StreamStatus>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: String, ingest_mode: IngestMode, status: Arc<StreamStatus>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            ingest_mode,
            status,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.status.state().is_connected() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let status = &state.status;
    let connection = status.state();

    let stream = StreamInfo {
        state: connection.as_str(),
        connected: connection.is_connected(),
        last_connected_at: status.last_connected_at(),
        messages_received: status.messages_received(),
        decode_errors: status.decode_errors(),
    };

    HealthResponse {
        status: determine_health_status(&stream),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        ingest_mode: state.ingest_mode.as_str(),
        stream,
        presentation: PresentationInfo {
            records: status.record_count(),
            frames_drawn: status.frames_drawn(),
            fps: status.fps(),
        },
    }
}

const fn determine_health_status(stream: &StreamInfo) -> HealthStatus {
    if stream.connected {
        HealthStatus::Healthy
    } else if stream.last_connected_at.is_some() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConnectionState;

    fn state_with(status: Arc<StreamStatus>) -> Arc<HealthServerState> {
        Arc::new(HealthServerState::new(
            "0.1.0".to_string(),
            IngestMode::Worker,
            status,
        ))
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn never_connected_is_unhealthy() {
        let state = state_with(Arc::new(StreamStatus::new()));
        let response = build_health_response(&state);

        assert_eq!(response.status, HealthStatus::Unhealthy);
        assert_eq!(response.stream.state, "DISCONNECTED");
        assert_eq!(response.ingest_mode, "worker");
    }

    #[test]
    fn connected_is_healthy() {
        let status = Arc::new(StreamStatus::new());
        status.set_state(ConnectionState::Connected);
        status.set_record_count(250);
        status.increment_messages();

        let response = build_health_response(&state_with(status));

        assert_eq!(response.status, HealthStatus::Healthy);
        assert!(response.stream.connected);
        assert!(response.stream.last_connected_at.is_some());
        assert_eq!(response.stream.messages_received, 1);
        assert_eq!(response.presentation.records, 250);
    }

    #[test]
    fn dropped_stream_is_degraded() {
        let status = Arc::new(StreamStatus::new());
        status.set_state(ConnectionState::Connected);
        status.set_state(ConnectionState::Disconnected);

        let response = build_health_response(&state_with(status));
        assert_eq!(response.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn readiness_follows_connection() {
        let status = Arc::new(StreamStatus::new());
        let state = state_with(Arc::clone(&status));

        let response = readiness_handler(State(Arc::clone(&state)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        status.set_state(ConnectionState::Connected);
        let response = readiness_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_unavailable_before_first_connect() {
        let state = state_with(Arc::new(StreamStatus::new()));
        let response = health_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
