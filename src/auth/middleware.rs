use axum::{
    body::Body,
    extract::{Query, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::warn;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::track_auth_failure;

/// Header carrying the function-level key
pub const FUNCTION_KEY_HEADER: &str = "x-functions-key";

#[derive(Debug, Deserialize)]
struct FunctionKeyQuery {
    code: Option<String>,
}

fn presented_key(request: &Request<Body>) -> Option<String> {
    if let Some(key) = request
        .headers()
        .get(FUNCTION_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
    {
        return Some(key.to_string());
    }

    Query::<FunctionKeyQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(query)| query.code)
}

/// Compare without short-circuiting on the first differing byte.
fn keys_match(expected: &str, presented: &str) -> bool {
    let (a, b) = (expected.as_bytes(), presented.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Function-level key check for the webhook route.
///
/// The key is read from the `x-functions-key` header or the `code` query
/// parameter. When no key is configured the check is skipped.
pub async fn function_key_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.config.function_key.as_deref() else {
        return next.run(request).await;
    };

    match presented_key(&request) {
        Some(key) if keys_match(expected, &key) => next.run(request).await,
        Some(_) => {
            warn!(uri = %request.uri().path(), "Rejected webhook with invalid function key");
            track_auth_failure("invalid_key");
            ApiError::Unauthorized("Invalid function key".to_string()).into_response()
        }
        None => {
            warn!(uri = %request.uri().path(), "Rejected webhook without function key");
            track_auth_failure("missing_key");
            ApiError::Unauthorized("Function key required".to_string()).into_response()
        }
    }
}
