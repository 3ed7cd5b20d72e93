//! API request and response models.

use serde::{Deserialize, Serialize};

use crate::sync::{Page, SessionStatus};

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: HealthStatus,
    /// Crate version.
    pub version: String,
    /// Seconds since the server started.
    pub uptime_seconds: u64,
    /// Current session, if one is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionStatus>,
}

/// Health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// A session is running.
    Healthy,
    /// Serving, but no session is ready.
    Idle,
}

/// Query parameters for `/events`.
///
/// `page` is kept as text so a malformed value gets a JSON 400.
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// 1-based page number; defaults to 1.
    #[serde(default)]
    pub page: Option<String>,
}

/// One page of the current session's swaps.
#[derive(Debug, Clone, Serialize)]
pub struct EventsResponse {
    /// Wallet the swaps belong to.
    pub address: String,
    /// Network chain id.
    pub chain_id: u64,
    /// Records and page metadata.
    #[serde(flatten)]
    pub page: Page,
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error kind.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}
