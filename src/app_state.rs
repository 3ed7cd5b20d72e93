//! Shared application state for the API server.

use std::time::SystemTime;

use tokio::sync::watch;

use crate::sync::Session;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Always holds the engine's current session, if one is running.
    pub sessions: watch::Receiver<Option<Session>>,
    /// Records per page for `/events`.
    pub page_size: usize,
    /// Application start time for uptime tracking.
    pub start_time: SystemTime,
}

impl AppState {
    /// Create state reading sessions from `sessions`.
    pub fn new(sessions: watch::Receiver<Option<Session>>, page_size: usize) -> Self {
        Self {
            sessions,
            page_size: page_size.max(1),
            start_time: SystemTime::now(),
        }
    }

    /// The session currently published by the engine.
    pub fn current_session(&self) -> Option<Session> {
        self.sessions.borrow().clone()
    }
}
