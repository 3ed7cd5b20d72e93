//! Axum server setup and routing.

use std::net::SocketAddr;

use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::api::{handlers, middleware as api_middleware};
use crate::app_state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/events", get(handlers::events::get_events));

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(middleware::from_fn(api_middleware::logging::log_requests));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware_stack)
        .with_state(state)
}

/// Serve the API on `port` until the task is cancelled.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails.
pub async fn run_server(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(addr = %addr, "Starting API server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio::sync::watch;
    use tower::ServiceExt;

    fn idle_state() -> AppState {
        let (_tx, rx) = watch::channel(None);
        AppState::new(rx, 5)
    }

    async fn status_of(uri: &str) -> StatusCode {
        let response = router(idle_state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn test_health_without_session() {
        assert_eq!(status_of("/api/v1/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_events_without_session_is_unavailable() {
        assert_eq!(status_of("/api/v1/events").await, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_events_bad_page() {
        assert_eq!(status_of("/api/v1/events?page=abc").await, StatusCode::BAD_REQUEST);
    }
}
