//! HTTP routes and middleware

use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::webhook;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(&state.config.server.cors_origins);
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        // WhatsApp webhook
        .route("/webhook", get(webhook::verify).post(webhook::receive))
        // Health check
        .route("/health", get(health_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        // Admin endpoints
        .route("/admin/cache/refresh", post(admin::refresh_cache))
        .route("/admin/knowledge/clear", post(admin::clear_knowledge))
        .route("/admin/tenants", get(admin::list_tenants))
        .route("/admin/tenants/:id/selftest", get(admin::selftest))
        .route("/admin/contacts", get(admin::find_contacts))
        .route("/admin/contacts/welcome", post(admin::resend_welcome))
        .route("/admin/backfill", post(admin::backfill))
        .route("/admin/notifications", get(admin::list_notifications))
        .route("/admin/notifications/count", get(admin::count_notifications))
        .route("/admin/notifications/seen", post(admin::mark_notifications_seen))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        .with_state(state)
}

/// Any origin when none are configured, otherwise the listed ones
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed.is_empty() {
        tracing::error!("All configured CORS origins are invalid, allowing any origin");
        return base.allow_origin(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed.len());
    base.allow_origin(parsed)
}

/// `GET /health` liveness
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": format!("{:?}", state.config.environment).to_lowercase(),
            "metrics": state.metrics.is_some(),
        })),
    )
}
