//! WebSocket new-head subscriptions for the push-based live poller.
//!
//! # Strategy
//!
//! The live poller subscribes to new block headers and, for every header,
//! runs the same pull pipeline the interval poller uses over
//! `[last_processed_block + 1, header.number]`:
//! - No missed events: every block range is queried over HTTP
//! - One subscription regardless of how many wallets are tracked
//! - Cursor semantics identical to polling
//!
//! Subscribing to `SwapTo` logs directly would save the range query but
//! would not advance the cursor over empty blocks.

use std::time::Duration;

use alloy::{
    providers::{Provider, ProviderBuilder, RootProvider},
    pubsub::SubscriptionStream,
    rpc::types::Header,
    transports::BoxTransport,
};
use eyre::Result;
use tracing::{debug, error, info, instrument, warn};

use super::http::redact_url;

/// WebSocket provider used as a new-head trigger.
pub struct WebSocketProvider {
    provider: RootProvider<BoxTransport>,
}

impl WebSocketProvider {
    /// Connects to a WebSocket RPC endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the handshake fails.
    #[instrument(skip(ws_url), fields(ws_host = tracing::field::Empty, duration_ms = tracing::field::Empty))]
    pub async fn connect(ws_url: String) -> Result<Self> {
        let host = redact_url(&ws_url).to_string();
        tracing::Span::current().record("ws_host", host.as_str());

        info!(ws_host = %host, "Connecting to WebSocket");
        let start = std::time::Instant::now();

        let provider = ProviderBuilder::new()
            .on_builtin(&ws_url)
            .await
            .map_err(|e| {
                error!(error = %e, ws_host = %host, "WebSocket connection failed");
                eyre::eyre!("WebSocket connection failed: {}", e)
            })?;

        let duration = start.elapsed();
        tracing::Span::current().record("duration_ms", duration.as_millis() as u64);
        info!(ws_host = %host, duration_ms = duration.as_millis(), "WebSocket connected");

        Ok(Self { provider })
    }

    /// Subscribes to new block headers.
    ///
    /// The stream ends when the connection drops.
    ///
    /// # Errors
    ///
    /// Returns error if the subscription request fails.
    #[instrument(skip(self))]
    pub async fn subscribe_heads(&self) -> Result<SubscriptionStream<Header>> {
        let sub = self.provider.subscribe_blocks().await.map_err(|e| {
            error!(error = %e, "Block subscription failed");
            eyre::eyre!("Block subscription failed: {}", e)
        })?;

        info!("New-head subscription active");
        Ok(sub.into_stream())
    }
}

/// WebSocket connector with exponential backoff and jitter.
pub struct ReconnectingWebSocket {
    url: String,
    provider: Option<WebSocketProvider>,
    max_reconnect_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl ReconnectingWebSocket {
    /// Creates a connector with default settings.
    ///
    /// - Max reconnect attempts: 5
    /// - Initial delay: 1 second
    /// - Max delay: 30 seconds
    pub fn new(url: String) -> Self {
        Self::with_settings(url, 5, Duration::from_secs(1), Duration::from_secs(30))
    }

    /// Creates a connector with custom settings.
    pub fn with_settings(
        url: String,
        max_reconnect_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            url,
            provider: None,
            max_reconnect_attempts: max_reconnect_attempts.max(1),
            initial_delay,
            max_delay,
        }
    }

    /// Connects, retrying with exponential backoff and ±12.5% jitter.
    ///
    /// # Errors
    ///
    /// Returns error once `max_reconnect_attempts` connections have failed.
    pub async fn connect(&mut self) -> Result<&WebSocketProvider> {
        let mut attempt = 0;
        let mut delay = self.initial_delay;

        loop {
            match WebSocketProvider::connect(self.url.clone()).await {
                Ok(provider) => {
                    return Ok(self.provider.insert(provider));
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_reconnect_attempts {
                        error!(attempts = attempt, "Max WebSocket reconnection attempts reached");
                        return Err(eyre::eyre!(
                            "Failed to connect after {} attempts: {}",
                            attempt,
                            e
                        ));
                    }

                    warn!(
                        attempt,
                        max = self.max_reconnect_attempts,
                        error = %e,
                        delay_ms = delay.as_millis(),
                        "WebSocket connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;

                    delay = jittered(std::cmp::min(delay * 2, self.max_delay));
                    debug!(delay_ms = delay.as_millis(), "Next WebSocket retry delay");
                }
            }
        }
    }

    /// Drops the current connection and connects again.
    ///
    /// # Errors
    ///
    /// Returns error if every reconnection attempt fails.
    pub async fn reconnect(&mut self) -> Result<&WebSocketProvider> {
        warn!("Reconnecting WebSocket after disconnection");
        self.provider = None;
        self.connect().await
    }

    /// Checks if currently connected.
    pub const fn is_connected(&self) -> bool {
        self.provider.is_some()
    }
}

fn jittered(delay: Duration) -> Duration {
    let factor = 0.25 * (rand::random::<f64>() - 0.5);
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let jitter_ms = (delay.as_millis() as f64 * factor).round() as i64;
    if jitter_ms >= 0 {
        delay + Duration::from_millis(jitter_ms.unsigned_abs())
    } else {
        delay.saturating_sub(Duration::from_millis(jitter_ms.unsigned_abs()))
    }
}
