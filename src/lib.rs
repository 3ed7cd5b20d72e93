//! # Swap Event Sync
//!
//! Keeps an up-to-date, deduplicated, timestamp-ordered list of one wallet's
//! `SwapTo` events emitted by a swap helper contract, using
//! [Alloy](https://github.com/alloy-rs/alloy) for chain access.
//!
//! ## Features
//!
//! - **Bounded backfill** over a lookback window, newest batch first
//! - **Live tail** by interval polling or WebSocket new-head subscription
//! - **Retry with linear backoff** per block range; failed ranges are skipped, never fatal
//! - **Dedup by transaction hash**, so backfill and live ticks can overlap freely
//! - **Session reset** when the wallet, network or provider changes
//! - **Pagination** for display, over the CLI and an HTTP API
//!
//! ## Architecture
//!
//! 1. **Config** ([`config`]) - environment variables
//! 2. **RPC** ([`rpc`]) - the [`LogSource`](rpc::LogSource) capability and its providers
//! 3. **Events** ([`events`]) - `SwapTo` decoding
//! 4. **Sync** ([`sync`]) - planner, fetcher, store, backfill, live poller, engine
//! 5. **Surfaces** ([`cli`], [`api`], [`window`])
//!
//! ## Using as a Library
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use swap_event_sync::{config::Config, rpc, sync::{SessionIdentity, SyncEngine}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let provider = Arc::new(rpc::create_provider(config.rpc_url()).await?);
//!     let chain_id = rpc::get_chain_id(&provider).await?;
//!
//!     let mut engine = SyncEngine::new(config.sync().clone());
//!     engine.apply_identity(SessionIdentity::new(config.wallet_address(), Some(chain_id), Some(provider)));
//!
//!     if let Some(report) = engine.wait_backfill().await {
//!         println!("{} swaps merged", report.records_merged);
//!     }
//!     if let Some(page) = engine.page(1).await {
//!         println!("{} swaps in total", page.total_records);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return [`error::SyncResult<T>`](error::SyncResult).
//! Nothing inside the engine is fatal: abandoned ranges and missing block
//! metadata are logged and the session carries on.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod app_state;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod observability;
pub mod rpc;
pub mod sync;
pub mod window;
