//! Request logging middleware.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{debug, info};

/// Logs each request with its status and latency.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let duration_ms = start.elapsed().as_millis();

    if status.is_success() {
        debug!(%method, %path, status = status.as_u16(), duration_ms, "Request completed");
    } else {
        info!(%method, %path, status = status.as_u16(), duration_ms, "Request failed");
    }

    response
}
