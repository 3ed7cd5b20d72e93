//! Configuration management for the swap event synchronization engine.
//!
//! This module handles loading and validating configuration from environment
//! variables using the `dotenvy` crate. All operations return [`SyncResult`]
//! for comprehensive error handling.
//!
//! ## Environment Variables
//!
//! Required:
//! - `RPC_URL`: HTTP(S) JSON-RPC endpoint used for every log query
//!
//! Optional (with defaults):
//! - `WS_URL`: WebSocket endpoint for new-head subscriptions (no default)
//! - `SWAP_CONTRACT`: contract emitting `SwapTo` (default: AlphaBot)
//! - `WINDOW_CONTRACT`: contract exposing `activeTimeStampMap` (default: AlphaBot window)
//! - `WALLET_ADDRESS`: wallet whose swaps are tracked (no default)
//! - `LOOKBACK_BLOCKS`: backfill window in blocks (default: 1000)
//! - `BATCH_SIZE`: maximum blocks per log query (default: 1000)
//! - `POLL_INTERVAL_MS`: live poll interval (default: 2000)
//! - `MAX_ATTEMPTS`: attempts per block range (default: 3)
//! - `RETRY_BASE_DELAY_MS`: linear backoff unit (default: 1000)
//! - `PAGE_SIZE`: records per page (default: 5)
//! - `LIVE_MODE`: `poll` or `subscribe` (default: poll)
//! - `API_PORT`: port for the `serve` command (default: 8080)
//! - `RUST_LOG`: Logging level (default: "info")
//!
//! ## Example
//!
//! ```no_run
//! use swap_event_sync::config::Config;
//! use swap_event_sync::error::SyncResult;
//!
//! # fn main() -> SyncResult<()> {
//! let config = Config::from_env()?;
//! println!("RPC URL: {}", config.rpc_url());
//! # Ok(())
//! # }
//! ```

use crate::error::{SyncError, SyncResult};
use alloy::primitives::{address, Address};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Contract emitting `SwapTo(address indexed sender, address fromToken, address toToken, uint256 fee)`.
pub const DEFAULT_SWAP_CONTRACT: Address = address!("cb4C74125CE9f3240DedAE1bf087208C549B1d39");

/// Contract exposing `activeTimeStampMap(address)` for the trading window.
pub const DEFAULT_WINDOW_CONTRACT: Address = address!("EB4386a28aE5797eecF8eB6d29c4873E0405BB62");

/// How the live poller learns about new blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiveMode {
    /// Query the block height on a fixed interval.
    #[default]
    Poll,
    /// Subscribe to new heads over WebSocket, falling back to polling.
    Subscribe,
}

impl FromStr for LiveMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "poll" => Ok(Self::Poll),
            "subscribe" | "ws" => Ok(Self::Subscribe),
            other => Err(SyncError::config(
                format!("LIVE_MODE must be 'poll' or 'subscribe', got: {other}"),
                None,
            )),
        }
    }
}

/// Tunables shared by the backfill driver, fetcher and live poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Contract emitting `SwapTo`.
    pub swap_contract: Address,
    /// Number of blocks behind the head covered by the backfill.
    pub lookback_blocks: u64,
    /// Maximum blocks per log query.
    pub batch_size: u64,
    /// Interval between live polls.
    pub poll_interval: Duration,
    /// Attempts per block range before it is abandoned.
    pub max_attempts: u32,
    /// Linear backoff unit; attempt `n` waits `n * retry_base_delay`.
    pub retry_base_delay: Duration,
    /// Records per page in the pagination view.
    pub page_size: usize,
    /// Live poller strategy.
    pub live_mode: LiveMode,
    /// WebSocket endpoint, required for [`LiveMode::Subscribe`].
    pub ws_url: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            swap_contract: DEFAULT_SWAP_CONTRACT,
            lookback_blocks: 1_000,
            batch_size: 1_000,
            poll_interval: Duration::from_millis(2_000),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(1_000),
            page_size: 5,
            live_mode: LiveMode::Poll,
            ws_url: None,
        }
    }
}

/// Main configuration struct.
///
/// Contains all runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP JSON-RPC endpoint
    rpc_url: String,

    /// Wallet whose swap activity is tracked
    wallet_address: Option<Address>,

    /// Contract exposing the trading window deadline
    window_contract: Address,

    /// Port for the HTTP API
    api_port: u16,

    /// Engine tunables
    sync: SyncSettings,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This function:
    /// 1. Loads `.env` file using `dotenvy` (if present)
    /// 2. Reads and validates all environment variables
    /// 3. Applies defaults for optional variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `RPC_URL` is missing or not an HTTP(S) URL
    /// - A numeric variable does not parse or is zero where a positive value is required
    /// - An address variable is not a valid Ethereum address
    /// - `LIVE_MODE` is `subscribe` but `WS_URL` is not set
    pub fn from_env() -> SyncResult<Self> {
        // Load .env file if present (ignore error if file doesn't exist)
        dotenvy::dotenv().ok();

        let rpc_url = env::var("RPC_URL").map_err(|e| {
            SyncError::config("RPC_URL environment variable is required", Some(Box::new(e)))
        })?;

        if !(rpc_url.starts_with("http://") || rpc_url.starts_with("https://")) {
            return Err(SyncError::config(
                format!("RPC_URL must be an http(s) URL, got: {rpc_url}"),
                None,
            ));
        }

        let ws_url = env::var("WS_URL").ok().filter(|url| !url.is_empty());

        let wallet_address = env::var("WALLET_ADDRESS")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| parse_address("WALLET_ADDRESS", &s))
            .transpose()?;

        let swap_contract = env::var("SWAP_CONTRACT")
            .ok()
            .map(|s| parse_address("SWAP_CONTRACT", &s))
            .transpose()?
            .unwrap_or(DEFAULT_SWAP_CONTRACT);

        let window_contract = env::var("WINDOW_CONTRACT")
            .ok()
            .map(|s| parse_address("WINDOW_CONTRACT", &s))
            .transpose()?
            .unwrap_or(DEFAULT_WINDOW_CONTRACT);

        let lookback_blocks = parse_var::<u64>("LOOKBACK_BLOCKS", "1000")?;
        let batch_size = positive("BATCH_SIZE", parse_var::<u64>("BATCH_SIZE", "1000")?)?;
        let poll_interval_ms =
            positive("POLL_INTERVAL_MS", parse_var::<u64>("POLL_INTERVAL_MS", "2000")?)?;
        let max_attempts = parse_var::<u32>("MAX_ATTEMPTS", "3")?;
        if max_attempts == 0 {
            return Err(SyncError::config("MAX_ATTEMPTS must be at least 1", None));
        }
        let retry_base_delay_ms = parse_var::<u64>("RETRY_BASE_DELAY_MS", "1000")?;
        let page_size = parse_var::<usize>("PAGE_SIZE", "5")?;
        if page_size == 0 {
            return Err(SyncError::config("PAGE_SIZE must be at least 1", None));
        }
        let api_port = parse_var::<u16>("API_PORT", "8080")?;

        let live_mode = env::var("LIVE_MODE")
            .unwrap_or_else(|_| "poll".to_string())
            .parse::<LiveMode>()?;

        if live_mode == LiveMode::Subscribe && ws_url.is_none() {
            return Err(SyncError::config(
                "LIVE_MODE=subscribe requires WS_URL to be set",
                None,
            ));
        }

        Ok(Self {
            rpc_url,
            wallet_address,
            window_contract,
            api_port,
            sync: SyncSettings {
                swap_contract,
                lookback_blocks,
                batch_size,
                poll_interval: Duration::from_millis(poll_interval_ms),
                max_attempts,
                retry_base_delay: Duration::from_millis(retry_base_delay_ms),
                page_size,
                live_mode,
                ws_url,
            },
        })
    }

    /// Get the HTTP RPC URL.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Get the configured wallet address, if any.
    #[must_use]
    pub const fn wallet_address(&self) -> Option<Address> {
        self.wallet_address
    }

    /// Get the trading window contract address.
    #[must_use]
    pub const fn window_contract(&self) -> Address {
        self.window_contract
    }

    /// Get the HTTP API port.
    #[must_use]
    pub const fn api_port(&self) -> u16 {
        self.api_port
    }

    /// Get the engine settings.
    #[must_use]
    pub const fn sync(&self) -> &SyncSettings {
        &self.sync
    }

    /// Get mutable engine settings, used to apply CLI overrides.
    pub fn sync_mut(&mut self) -> &mut SyncSettings {
        &mut self.sync
    }
}

fn parse_var<T>(name: &str, default: &str) -> SyncResult<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .map_err(|e| SyncError::config(format!("{name} must be a valid number"), Some(Box::new(e))))
}

fn positive(name: &str, value: u64) -> SyncResult<u64> {
    if value == 0 {
        return Err(SyncError::config(format!("{name} must be positive"), None));
    }
    Ok(value)
}

fn parse_address(name: &str, value: &str) -> SyncResult<Address> {
    value.parse::<Address>().map_err(|e| {
        SyncError::config(
            format!("{name} must be a valid Ethereum address (0x + 40 hex chars), got: {value}"),
            Some(Box::new(e)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize the tests touching them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "RPC_URL",
        "WS_URL",
        "WALLET_ADDRESS",
        "SWAP_CONTRACT",
        "BATCH_SIZE",
        "LIVE_MODE",
        "PAGE_SIZE",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_config_missing_rpc_url() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();

        assert!(Config::from_env().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        env::set_var("RPC_URL", "https://bsc-dataseed.example.org");

        let config = Config::from_env();
        assert!(config.is_ok());

        if let Ok(config) = config {
            assert_eq!(config.rpc_url(), "https://bsc-dataseed.example.org");
            assert_eq!(config.sync().lookback_blocks, 1_000);
            assert_eq!(config.sync().batch_size, 1_000);
            assert_eq!(config.sync().max_attempts, 3);
            assert_eq!(config.sync().page_size, 5);
            assert_eq!(config.sync().poll_interval, Duration::from_secs(2));
            assert_eq!(config.sync().swap_contract, DEFAULT_SWAP_CONTRACT);
            assert_eq!(config.sync().live_mode, LiveMode::Poll);
            assert!(config.wallet_address().is_none());
        }

        clear_env();
    }

    #[test]
    fn test_config_invalid_wallet_address() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        env::set_var("RPC_URL", "https://bsc-dataseed.example.org");
        env::set_var("WALLET_ADDRESS", "not_an_address");

        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_config_zero_batch_size_rejected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        env::set_var("RPC_URL", "https://bsc-dataseed.example.org");
        env::set_var("BATCH_SIZE", "0");

        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_config_subscribe_requires_ws_url() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        env::set_var("RPC_URL", "https://bsc-dataseed.example.org");
        env::set_var("LIVE_MODE", "subscribe");

        assert!(Config::from_env().is_err());

        env::set_var("WS_URL", "wss://bsc-ws.example.org");
        let config = Config::from_env();
        assert!(matches!(config, Ok(ref c) if c.sync().live_mode == LiveMode::Subscribe));

        clear_env();
    }

    #[test]
    fn test_live_mode_parsing() {
        assert_eq!("poll".parse::<LiveMode>().ok(), Some(LiveMode::Poll));
        assert_eq!("WS".parse::<LiveMode>().ok(), Some(LiveMode::Subscribe));
        assert!("push".parse::<LiveMode>().is_err());
    }
}
