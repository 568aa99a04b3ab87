use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{counter, histogram};
use std::time::Instant;

/// Label for requests that hit no route
pub const UNMATCHED_PATH: &str = "unmatched";

/// Route template for the label, never the raw path
fn path_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string())
}

/// Metrics middleware that tracks request metrics
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = path_label(&request);
    let start = Instant::now();

    counter!("http_requests_total", "method" => method.clone(), "path" => path.clone()).increment(1);

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    histogram!(
        "http_request_duration_seconds",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.clone()
    )
    .record(start.elapsed().as_secs_f64());

    counter!(
        "http_responses_total",
        "method" => method,
        "path" => path,
        "status" => status
    )
    .increment(1);

    response
}

/// Track a work item created downstream
pub fn track_work_item_created(work_item_type: &str) {
    counter!("work_items_created_total", "type" => work_item_type.to_string()).increment(1);
}

/// Track a webhook that did not produce a work item
pub fn track_webhook_failure(reason: &'static str) {
    counter!("webhook_failures_total", "reason" => reason).increment(1);
}

/// Track rejected function keys
pub fn track_auth_failure(reason: &'static str) {
    counter!("auth_failures_total", "reason" => reason).increment(1);
}
