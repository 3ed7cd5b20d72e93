//! `SwapTo` event definition, log filters, and the event decoder.
//!
//! The swap helper contract emits one event per executed swap:
//!
//! ```text
//! event SwapTo(address indexed sender, address fromToken, address toToken, uint256 fee)
//! ```
//!
//! Alloy's `sol!` macro generates the typed event, so the signature hash and
//! the topic/data layout come from the Solidity declaration rather than from
//! hand-written offsets. `sender` is topic 1; the tokens and fee live in the
//! data section.
//!
//! ## Decoding
//!
//! [`decode_swap_log`] turns a raw RPC log into an [`EventRecord`]. The
//! timestamp is resolved from the log itself when the node includes
//! `blockTimestamp`, otherwise from the block header via the
//! [`LogSource`](crate::rpc::LogSource). When neither is available the
//! current wall-clock time is used and the approximation is logged.

use std::collections::HashMap;

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, Log as PrimitiveLog, B256};
use alloy::rpc::types::{Filter, Log};
use alloy::sol;
use alloy::sol_types::SolEvent;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::rpc::LogSource;

sol! {
    /// Swap helper contract.
    #[sol(rpc)]
    interface IAlphaBot {
        /// Emitted once per bot-executed swap.
        ///
        /// # Fields
        /// - `sender`: wallet the swap was executed for (indexed)
        /// - `fromToken`: token sold
        /// - `toToken`: token bought
        /// - `fee`: fee charged, in the chain's smallest native unit
        event SwapTo(address indexed sender, address fromToken, address toToken, uint256 fee);

        /// Unix timestamp until which the wallet's trading window is armed.
        function activeTimeStampMap(address account) external view returns (uint256);
    }
}

pub use IAlphaBot::SwapTo;

/// Which logs a session cares about: `SwapTo` from one contract for one sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapFilter {
    /// Contract emitting `SwapTo`.
    pub contract: Address,
    /// Wallet the swaps were executed for.
    pub sender: Address,
}

impl SwapFilter {
    /// Create a filter scope.
    #[must_use]
    pub const fn new(contract: Address, sender: Address) -> Self {
        Self { contract, sender }
    }

    /// Build the range-bounded `eth_getLogs` filter for this scope.
    ///
    /// Unbounded queries are never issued; every filter carries both ends.
    #[must_use]
    pub fn to_filter(&self, from_block: u64, to_block: u64) -> Filter {
        Filter::new()
            .address(self.contract)
            .event_signature(SwapTo::SIGNATURE_HASH)
            .topic1(self.sender.into_word())
            .from_block(from_block)
            .to_block(to_block)
    }
}

/// One observed swap. Identity is `transaction_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Wallet the swap was executed for.
    pub sender: Address,
    /// Token sold.
    pub from_token: Address,
    /// Token bought.
    pub to_token: Address,
    /// Fee as a decimal amount of the native token.
    pub fee: String,
    /// Block timestamp (unix seconds), or wall-clock time if unavailable.
    pub timestamp: u64,
    /// Transaction that emitted the event.
    pub transaction_hash: B256,
    /// Block that included the transaction.
    pub block_number: u64,
}

/// Per-pass cache of block timestamps so logs sharing a block cost one lookup.
#[derive(Debug, Default)]
pub struct BlockTimestamps {
    known: HashMap<u64, Option<u64>>,
}

impl BlockTimestamps {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the timestamp of `block_number`, querying `source` at most once.
    ///
    /// Failed lookups are cached as missing for the rest of the pass.
    pub async fn resolve<S: LogSource>(
        &mut self,
        source: &S,
        block_number: u64,
    ) -> SyncResult<Option<u64>> {
        if let Some(cached) = self.known.get(&block_number) {
            return Ok(*cached);
        }
        let result = source.block_timestamp(block_number).await;
        let value = result.as_ref().ok().copied().flatten();
        self.known.insert(block_number, value);
        result
    }
}

/// Current wall-clock time in unix seconds.
#[must_use]
pub fn wall_clock_seconds() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

/// Decode the `SwapTo` fields of a raw log without resolving its timestamp.
///
/// # Errors
///
/// Returns [`SyncError::DecodingError`] if the log is not a `SwapTo` event,
/// its data is malformed, or it lacks a block number or transaction hash.
pub fn decode_swap_fields(log: &Log) -> SyncResult<(SwapTo, u64, B256)> {
    let block_number = log
        .block_number
        .ok_or_else(|| SyncError::decoding("Log missing block number", None))?;
    let transaction_hash = log
        .transaction_hash
        .ok_or_else(|| SyncError::decoding("Log missing transaction hash", None))?;

    let primitive_log = PrimitiveLog {
        address: log.address(),
        data: log.data().clone(),
    };

    let decoded = SwapTo::decode_log(&primitive_log, true).map_err(|e| {
        SyncError::decoding(
            format!("Failed to decode SwapTo in tx {transaction_hash}"),
            Some(Box::new(e)),
        )
    })?;

    Ok((decoded.data, block_number, transaction_hash))
}

/// Decode a raw log into an [`EventRecord`], resolving its block timestamp.
///
/// Missing block metadata never fails the decode: the record is emitted with
/// the wall-clock time and a [`SyncError::DecodeIncomplete`] warning is logged.
///
/// # Errors
///
/// Returns [`SyncError::DecodingError`] when the log itself is malformed.
pub async fn decode_swap_log<S: LogSource>(
    log: &Log,
    source: &S,
    timestamps: &mut BlockTimestamps,
) -> SyncResult<EventRecord> {
    let (event, block_number, transaction_hash) = decode_swap_fields(log)?;

    let timestamp = if let Some(ts) = log.block_timestamp {
        ts
    } else {
        match timestamps.resolve(source, block_number).await {
            Ok(Some(ts)) => ts,
            Ok(None) => {
                let incomplete = SyncError::decode_incomplete(block_number, "block not found");
                warn!(error = %incomplete, tx = %transaction_hash, "Using wall-clock timestamp");
                wall_clock_seconds()
            }
            Err(e) => {
                let incomplete = SyncError::decode_incomplete(block_number, e.to_string());
                warn!(error = %incomplete, tx = %transaction_hash, "Using wall-clock timestamp");
                wall_clock_seconds()
            }
        }
    };

    let record = EventRecord {
        sender: event.sender,
        from_token: event.fromToken,
        to_token: event.toToken,
        fee: format_ether(event.fee),
        timestamp,
        transaction_hash,
        block_number,
    };

    debug!(
        tx = %record.transaction_hash,
        block = record.block_number,
        timestamp = record.timestamp,
        "Decoded SwapTo"
    );

    Ok(record)
}

/// Decode a batch of logs for `scope`, skipping malformed logs and foreign senders.
pub async fn decode_batch<S: LogSource>(
    logs: &[Log],
    source: &S,
    scope: &SwapFilter,
) -> Vec<EventRecord> {
    let mut timestamps = BlockTimestamps::new();
    let mut records = Vec::with_capacity(logs.len());

    for log in logs {
        match decode_swap_log(log, source, &mut timestamps).await {
            Ok(record) if record.sender == scope.sender => records.push(record),
            Ok(record) => {
                debug!(tx = %record.transaction_hash, sender = %record.sender, "Skipping swap for another sender");
            }
            Err(e) => warn!(error = %e, "Skipping undecodable log"),
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256, LogData, U256};

    const CONTRACT: Address = address!("cb4C74125CE9f3240DedAE1bf087208C549B1d39");
    const SENDER: Address = address!("1111111111111111111111111111111111111111");

    fn swap_log(block_timestamp: Option<u64>) -> Log {
        let event = SwapTo {
            sender: SENDER,
            fromToken: address!("2222222222222222222222222222222222222222"),
            toToken: address!("3333333333333333333333333333333333333333"),
            fee: U256::from(1_500_000_000_000_000_u128),
        };
        Log {
            inner: PrimitiveLog {
                address: CONTRACT,
                data: event.encode_log_data(),
            },
            block_hash: None,
            block_number: Some(77),
            block_timestamp,
            transaction_hash: Some(b256!(
                "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
            )),
            transaction_index: None,
            log_index: None,
            removed: false,
        }
    }

    #[test]
    fn test_swap_signature() {
        assert_eq!(
            SwapTo::SIGNATURE,
            "SwapTo(address,address,address,uint256)"
        );
        assert_eq!(SwapTo::SIGNATURE_HASH.len(), 32);
    }

    #[test]
    fn test_decode_fields() {
        let log = swap_log(None);
        let decoded = decode_swap_fields(&log);
        assert!(decoded.is_ok());
        if let Ok((event, block, _)) = decoded {
            assert_eq!(event.sender, SENDER);
            assert_eq!(event.fee, U256::from(1_500_000_000_000_000_u128));
            assert_eq!(block, 77);
            assert!(format_ether(event.fee).starts_with("0.0015"));
        }
    }

    #[test]
    fn test_decode_rejects_foreign_signature() {
        let mut log = swap_log(None);
        log.inner.data = LogData::new_unchecked(vec![B256::ZERO], log.inner.data.data.clone());
        assert!(matches!(
            decode_swap_fields(&log),
            Err(SyncError::DecodingError { .. })
        ));
    }

    #[test]
    fn test_decode_requires_transaction_hash() {
        let mut log = swap_log(None);
        log.transaction_hash = None;
        assert!(decode_swap_fields(&log).is_err());
    }

    #[test]
    fn test_filter_creation() {
        let scope = SwapFilter::new(CONTRACT, SENDER);
        let filter = scope.to_filter(100, 199);
        assert_eq!(filter.get_from_block(), Some(100));
        assert_eq!(filter.get_to_block(), Some(199));
    }
}
