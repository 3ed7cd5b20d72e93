//! Chain access.
//!
//! - [`source`]: the [`LogSource`] capability the engine is written against
//! - [`http`]: HTTP provider, the production [`LogSource`]
//! - [`websocket`]: new-head subscriptions that trigger live ticks
//!
//! ```text
//!   backfill ──┐
//!              ├── LogSource (HTTP) ── eth_getLogs / eth_blockNumber / eth_getBlockByNumber
//!   live ──────┘
//!     └── WebSocket new heads (subscribe mode only, trigger)
//! ```

pub mod http;
pub mod source;
pub mod websocket;

pub use http::{check_connection, create_provider, get_chain_id, get_latest_block, Provider};
pub use source::LogSource;
pub use websocket::{ReconnectingWebSocket, WebSocketProvider};
