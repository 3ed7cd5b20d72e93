//! Log source adapter: the remote capabilities the engine consumes.
//!
//! The engine never talks to a provider directly. Everything it needs from
//! the chain goes through [`LogSource`], which keeps the backfill driver,
//! fetcher and live poller testable against an in-memory source.

use std::future::Future;

use alloy::providers::Provider as AlloyProvider;
use alloy::rpc::types::{BlockTransactionsKind, Log};
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::events::SwapFilter;
use crate::rpc::http::Provider;
use crate::sync::BlockRange;

/// Remote chain-log query capability. Pure request/response, no state.
pub trait LogSource: Send + Sync + 'static {
    /// Current chain height.
    fn block_height(&self) -> impl Future<Output = SyncResult<u64>> + Send;

    /// Logs matching `scope` within `range` (both ends inclusive).
    fn query_logs(
        &self,
        scope: &SwapFilter,
        range: BlockRange,
    ) -> impl Future<Output = SyncResult<Vec<Log>>> + Send;

    /// Timestamp of `number`, or `None` if the node does not know the block.
    fn block_timestamp(&self, number: u64) -> impl Future<Output = SyncResult<Option<u64>>> + Send;
}

impl LogSource for Provider {
    fn block_height(&self) -> impl Future<Output = SyncResult<u64>> + Send {
        async move {
            self.get_block_number()
                .await
                .map_err(|e| SyncError::rpc("Failed to fetch block height", Some(Box::new(e))))
        }
    }

    fn query_logs(
        &self,
        scope: &SwapFilter,
        range: BlockRange,
    ) -> impl Future<Output = SyncResult<Vec<Log>>> + Send {
        let filter = scope.to_filter(range.from, range.to);
        async move {
            let logs = self.get_logs(&filter).await.map_err(|e| {
                SyncError::rpc(format!("eth_getLogs failed for {range}"), Some(Box::new(e)))
            })?;
            debug!(range = %range, logs = logs.len(), "Fetched logs");
            Ok(logs)
        }
    }

    fn block_timestamp(&self, number: u64) -> impl Future<Output = SyncResult<Option<u64>>> + Send {
        async move {
            let block = self
                .get_block_by_number(number.into(), BlockTransactionsKind::Hashes)
                .await
                .map_err(|e| {
                    SyncError::rpc(format!("Failed to fetch block {number}"), Some(Box::new(e)))
                })?;
            Ok(block.map(|b| b.header.timestamp))
        }
    }
}
