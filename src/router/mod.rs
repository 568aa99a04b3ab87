//! Router configuration.
//!
//! The webhook route sits behind the function-key check; health and metrics
//! are open. Only the open routes get the request timeout; the webhook
//! handler is bounded by the outbound client and credential timeouts and must
//! run to completion once the create call is sent.

use axum::{
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::app_state::AppState;
use crate::auth::middleware::function_key_middleware;
use crate::handlers::{get_prometheus_metrics, health_check, webhook_to_devops};
use crate::middleware::{metrics_middleware, request_logger_middleware};

pub const WEBHOOK_ROUTE: &str = "/api/webhook-to-devops";

/// Build the application router.
pub fn build_router(app_state: AppState) -> Router {
    let timeout = Duration::from_secs(app_state.config.request_timeout);

    let webhook = Router::new()
        .route(WEBHOOK_ROUTE, post(webhook_to_devops))
        .route_layer(from_fn_with_state(app_state.clone(), function_key_middleware));

    let public = Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
        .route("/metrics", get(get_prometheus_metrics))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout));

    Router::new()
        .merge(public)
        .merge(webhook)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(request_logger_middleware))
                .layer(from_fn(metrics_middleware)),
        )
        .with_state(app_state)
}
