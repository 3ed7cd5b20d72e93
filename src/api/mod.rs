//! HTTP API exposing the current session's swap history.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod server;
