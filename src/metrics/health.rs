//! Health check endpoints and Prometheus metrics server
//!
//! This module provides HTTP endpoints for health checks and Prometheus metrics
//! for the session-elo service using Axum.

use crate::metrics::collector::MetricsCollector;
use crate::rating::PlayerStore;
use crate::session::SessionDriver;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    /// Port to bind the health server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the health server
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub store: Option<Arc<dyn PlayerStore>>,
    pub session: Option<Arc<dyn SessionDriver>>,
    pub started_at: Instant,
}

/// Health server that provides HTTP endpoints for monitoring
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    /// Create a new health server
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                store: None,
                session: None,
                started_at: Instant::now(),
            },
            shutdown_tx,
        }
    }

    /// Report store health and player counts
    pub fn with_store(mut self, store: Arc<dyn PlayerStore>) -> Self {
        self.state.store = Some(store);
        self
    }

    /// Report the state of the watched session
    pub fn with_session(mut self, session: Arc<dyn SessionDriver>) -> Self {
        self.state.session = Some(session);
        self
    }

    /// Start the health server
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr).await?;

        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server shutdown signal received");
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    /// Create the Axum router with all health endpoints
    fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/stats", get(stats_handler))
            .with_state(self.state.clone())
    }

    /// Stop the health server
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping health server...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to health server: {}", e);
        }

        Ok(())
    }
}

/// Root endpoint handler - shows service information
async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "session-elo",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/metrics", "/stats"]
    }))
}

/// Health check endpoint handler
async fn health_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Health check requested");

    let Some(store) = &state.store else {
        state.metrics_collector.update_health_status(0);
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "session-elo",
                "error": "Service not initialized"
            })),
        );
    };

    match store.player_count() {
        Ok(players) => {
            state.metrics_collector.update_health_status(2);
            (
                StatusCode::OK,
                Json(json!({
                    "status": "healthy",
                    "service": "session-elo",
                    "version": env!("CARGO_PKG_VERSION"),
                    "players": players
                })),
            )
        }
        Err(e) => {
            error!("Player store unavailable: {:#}", e);
            state.metrics_collector.update_health_status(0);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "session-elo",
                    "error": "Player store unavailable"
                })),
            )
        }
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<HealthServerState>) -> Response {
    debug!("Metrics endpoint requested");

    state
        .metrics_collector
        .service()
        .uptime_seconds
        .set(state.started_at.elapsed().as_secs() as i64);

    let metric_families = state.metrics_collector.registry().gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_output) => (
            StatusCode::OK,
            [("content-type", encoder.format_type().to_string())],
            metrics_output,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

/// Service statistics endpoint handler (for debugging/human consumption)
async fn stats_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Stats endpoint requested");

    let Some(store) = &state.store else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": "Service not initialized",
                "timestamp": chrono::Utc::now()
            })),
        );
    };

    let players = match store.player_count() {
        Ok(players) => players,
        Err(e) => {
            error!("Failed to get stats: {:#}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "Failed to get service stats",
                    "timestamp": chrono::Utc::now()
                })),
            );
        }
    };

    let session = match &state.session {
        Some(session) => json!({
            "state": session.get_state().await.to_string(),
            "join_reference": session.join_reference().await
        }),
        None => serde_json::Value::Null,
    };

    let rating = state.metrics_collector.rating();
    (
        StatusCode::OK,
        Json(json!({
            "service": {
                "name": "session-elo",
                "version": env!("CARGO_PKG_VERSION"),
                "uptime_seconds": state.started_at.elapsed().as_secs()
            },
            "session": session,
            "ratings": {
                "players": players,
                "matches_rated": rating.matches_rated_total.get(),
                "no_change_matches": rating.no_change_matches_total.get(),
                "persistence_failures": rating.persistence_failures_total.get()
            },
            "timestamp": chrono::Utc::now()
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::InMemoryPlayerStore;
    use crate::session::{MockSessionPlatform, SessionStateMachine};
    use crate::types::Player;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tower::ServiceExt; // for oneshot

    fn collector() -> Arc<MetricsCollector> {
        Arc::new(MetricsCollector::new().expect("Failed to create collector"))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let server = HealthServer::new(HealthServerConfig::default(), collector());

        let response = server.create_router().oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let collector = collector();
        collector.record_no_change();
        let server = HealthServer::new(HealthServerConfig::default(), collector);

        let response = server
            .create_router()
            .oneshot(get("/metrics"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("session_elo_no_change_matches_total 1"));
    }

    #[tokio::test]
    async fn test_endpoints_without_store() {
        let server = HealthServer::new(HealthServerConfig::default(), collector());
        let app = server.create_router();

        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app.oneshot(get("/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_and_stats_with_store() {
        let store = Arc::new(InMemoryPlayerStore::default());
        store.update_player(Player::new("Alice")).unwrap();
        store.commit().unwrap();

        let session = Arc::new(SessionStateMachine::new(
            Arc::new(MockSessionPlatform::new()),
            crate::config::SessionConfig::fast(),
        ));

        let server = HealthServer::new(HealthServerConfig::default(), collector())
            .with_store(store)
            .with_session(session);
        let app = server.create_router();

        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let stats: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(stats["ratings"]["players"], 1);
        assert_eq!(stats["session"]["state"], "STOPPED");
    }

    #[tokio::test]
    async fn test_404_handling() {
        let server = HealthServer::new(HealthServerConfig::default(), collector());

        let response = server
            .create_router()
            .oneshot(get("/nonexistent"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_health_server_config() {
        let config = HealthServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
    }
}
