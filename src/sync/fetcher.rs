//! Retrying fetcher: one block range through the log source, with backoff.

use std::sync::Arc;

use alloy::rpc::types::Log;
use tracing::{debug, instrument};

use crate::error::{SyncError, SyncResult};
use crate::events::SwapFilter;
use crate::rpc::LogSource;
use crate::sync::planner::BlockRange;
use crate::sync::retry::{retry_with_backoff, RetryPolicy};

/// Fetches logs for one [`SwapFilter`] scope with bounded retry.
pub struct RetryingFetcher<S> {
    source: Arc<S>,
    scope: SwapFilter,
    policy: RetryPolicy,
}

impl<S> Clone for RetryingFetcher<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            scope: self.scope,
            policy: self.policy,
        }
    }
}

impl<S: LogSource> RetryingFetcher<S> {
    /// Create a fetcher over `source` for `scope`.
    pub const fn new(source: Arc<S>, scope: SwapFilter, policy: RetryPolicy) -> Self {
        Self {
            source,
            scope,
            policy,
        }
    }

    /// The underlying log source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The filter scope queried.
    pub const fn scope(&self) -> &SwapFilter {
        &self.scope
    }

    /// Retry policy applied to every call.
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch every matching log in `range`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SourceUnavailable`] only after every attempt failed.
    #[instrument(skip_all, fields(range = %range))]
    pub async fn fetch(&self, range: BlockRange) -> SyncResult<Vec<Log>> {
        let label = format!("eth_getLogs {range}");
        let logs = retry_with_backoff(&self.policy, &label, |_| {
            self.source.query_logs(&self.scope, range)
        })
        .await
        .map_err(|exhausted| {
            SyncError::source_unavailable(
                range.from,
                range.to,
                exhausted.attempts,
                exhausted.last_error.to_string(),
            )
        })?;

        debug!(logs = logs.len(), "Range fetched");
        Ok(logs)
    }

    /// Fetch the current chain height with the same retry policy.
    ///
    /// # Errors
    ///
    /// Returns the last RPC error once every attempt failed.
    pub async fn block_height(&self) -> SyncResult<u64> {
        retry_with_backoff(&self.policy, "eth_blockNumber", |_| self.source.block_height())
            .await
            .map_err(|exhausted| exhausted.last_error)
    }
}
