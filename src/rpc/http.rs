//! HTTP provider construction and session-identity probes.
//!
//! Every log query and block lookup goes over HTTP. The WebSocket connection
//! in [`websocket`](super::websocket) is only used as a new-head trigger.
//!
//! ## Example
//!
//! ```no_run
//! use swap_event_sync::rpc::{create_provider, get_chain_id};
//! use swap_event_sync::error::SyncResult;
//!
//! # async fn example() -> SyncResult<()> {
//! let provider = create_provider("https://bsc-dataseed.bnbchain.org").await?;
//! let chain_id = get_chain_id(&provider).await?;
//! println!("Connected to chain {chain_id}");
//! # Ok(())
//! # }
//! ```

use crate::error::{SyncError, SyncResult};
use alloy::providers::{Provider as AlloyProvider, ProviderBuilder, RootProvider};
use alloy::transports::http::{Client, Http};
use tracing::{debug, info, instrument, warn};

/// HTTP provider type used by the engine.
pub type Provider = RootProvider<Http<Client>>;

/// Strip credentials and path from an RPC URL for logging.
#[must_use]
pub fn redact_url(rpc_url: &str) -> &str {
    let without_scheme = rpc_url.find("://").map_or(0, |i| i + 3);
    rpc_url[without_scheme..]
        .find('/')
        .map_or(rpc_url, |end| &rpc_url[..without_scheme + end])
}

/// Create a new RPC provider connected via HTTP.
///
/// # Errors
///
/// Returns [`SyncError::RpcError`] if the URL cannot be parsed.
#[allow(clippy::unused_async)]
#[instrument(skip(rpc_url), fields(rpc_host = tracing::field::Empty))]
pub async fn create_provider(rpc_url: &str) -> SyncResult<Provider> {
    let host = redact_url(rpc_url);
    tracing::Span::current().record("rpc_host", host);
    debug!(rpc_host = host, "Creating HTTP provider");

    let url = rpc_url.parse().map_err(|e| {
        SyncError::rpc(
            format!("Failed to parse RPC URL '{host}'. Expected e.g. 'https://bsc-dataseed.bnbchain.org'"),
            Some(Box::new(e)),
        )
    })?;

    let provider = ProviderBuilder::new().on_http(url);

    info!(rpc_host = host, "RPC provider initialized");

    Ok(provider)
}

/// Get the latest block number.
///
/// # Errors
///
/// Returns an error if the RPC request fails.
#[instrument(skip(provider), fields(block = tracing::field::Empty, duration_ms = tracing::field::Empty))]
pub async fn get_latest_block(provider: &Provider) -> SyncResult<u64> {
    let start = std::time::Instant::now();
    let block_number = provider
        .get_block_number()
        .await
        .map_err(|e| SyncError::rpc("Failed to fetch latest block number", Some(Box::new(e))))?;

    let duration = start.elapsed();
    tracing::Span::current().record("block", block_number);
    tracing::Span::current().record("duration_ms", duration.as_millis() as u64);

    debug!(block = block_number, "Latest block fetched");

    Ok(block_number)
}

/// Get the chain id the provider is connected to.
///
/// The chain id is the "network" half of a session identity; a change
/// restarts the session.
///
/// # Errors
///
/// Returns an error if the RPC request fails.
#[instrument(skip(provider))]
pub async fn get_chain_id(provider: &Provider) -> SyncResult<u64> {
    provider
        .get_chain_id()
        .await
        .map_err(|e| SyncError::rpc("Failed to fetch chain id", Some(Box::new(e))))
}

/// Check that the provider answers by fetching the latest block.
///
/// # Errors
///
/// Returns an error if the RPC connection is not working.
#[instrument(skip(provider))]
pub async fn check_connection(provider: &Provider) -> SyncResult<()> {
    match get_latest_block(provider).await {
        Ok(block) => {
            info!(block, "Connection check successful");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Connection check failed");
            Err(SyncError::rpc(
                format!("Provider connection health check failed: {e}"),
                None,
            ))
        }
    }
}
