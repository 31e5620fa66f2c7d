// Middleware stack for observability and protection

use axum::{http::StatusCode, BoxError};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Request tracing: method, path, status and latency per request
pub fn tracing_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}

/// Rejects bodies above `limit` bytes with 413
pub fn body_size_limit_layer(limit: usize) -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(limit)
}

/// Converts errors from the timeout layer into HTTP responses
pub async fn handle_timeout_error(e: BoxError) -> (StatusCode, String) {
    if e.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "request timed out".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}
