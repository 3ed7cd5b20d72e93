//! Trading window status.
//!
//! The window contract stores, per wallet, the unix timestamp until which
//! the trading bot is armed. Zero means it was never armed.

use std::fmt;

use alloy::primitives::{Address, U256};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{SyncError, SyncResult};
use crate::events::IAlphaBot;
use crate::rpc::Provider;

/// A wallet's trading window relative to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TradingWindow {
    /// The deadline is in the future.
    Active {
        /// Deadline (unix seconds).
        expires_at: u64,
        /// Seconds until the deadline.
        remaining_secs: u64,
    },
    /// The deadline has passed.
    Expired {
        /// Deadline (unix seconds).
        expired_at: u64,
    },
    /// No deadline was ever set.
    NotArmed,
}

impl TradingWindow {
    /// Classify `deadline` against `now`, both unix seconds.
    #[must_use]
    pub const fn classify(deadline: u64, now: u64) -> Self {
        if deadline == 0 {
            Self::NotArmed
        } else if deadline > now {
            Self::Active {
                expires_at: deadline,
                remaining_secs: deadline - now,
            }
        } else {
            Self::Expired {
                expired_at: deadline,
            }
        }
    }

    /// Whether trading is currently allowed.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

impl fmt::Display for TradingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active { remaining_secs, .. } => {
                let hours = remaining_secs / 3_600;
                let minutes = (remaining_secs % 3_600) / 60;
                write!(f, "Active ({hours}h {minutes}m left)")
            }
            Self::Expired { .. } => write!(f, "Expired"),
            Self::NotArmed => write!(f, "Not armed"),
        }
    }
}

/// Read the raw deadline for `account`.
///
/// # Errors
///
/// Returns [`SyncError::RpcError`] if the contract call fails.
#[instrument(skip(provider))]
pub async fn read_deadline(provider: &Provider, contract: Address, account: Address) -> SyncResult<u64> {
    let window = IAlphaBot::new(contract, provider.clone());
    let deadline: U256 = window
        .activeTimeStampMap(account)
        .call()
        .await
        .map_err(|e| SyncError::rpc("activeTimeStampMap call failed", Some(Box::new(e))))?
        ._0;

    debug!(%deadline, "Read trading deadline");
    Ok(u64::try_from(deadline).unwrap_or(u64::MAX))
}

/// Read and classify the trading window for `account` at `now`.
///
/// # Errors
///
/// Returns [`SyncError::RpcError`] if the contract call fails.
pub async fn trading_window(
    provider: &Provider,
    contract: Address,
    account: Address,
    now: u64,
) -> SyncResult<TradingWindow> {
    let deadline = read_deadline(provider, contract, account).await?;
    Ok(TradingWindow::classify(deadline, now))
}
