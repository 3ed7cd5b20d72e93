//! In-memory log source shared by the integration tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::{ready, Future};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, Log as PrimitiveLog, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use swap_event_sync::config::DEFAULT_SWAP_CONTRACT;
use swap_event_sync::error::{SyncError, SyncResult};
use swap_event_sync::events::{EventRecord, SwapFilter, SwapTo};
use swap_event_sync::rpc::LogSource;
use swap_event_sync::sync::BlockRange;

pub const WALLET: Address = Address::repeat_byte(0xaa);
pub const OTHER_WALLET: Address = Address::repeat_byte(0xbb);

/// Chain contents and failure script.
#[derive(Default)]
pub struct ScriptedSource {
    height: AtomicU64,
    logs: Mutex<Vec<Log>>,
    // Remaining failures per exact range; u32::MAX fails forever.
    failures: Mutex<HashMap<(u64, u64), u32>>,
    calls: Mutex<Vec<BlockRange>>,
    block_times: Mutex<HashMap<u64, u64>>,
    broken_blocks: Mutex<Vec<u64>>,
}

impl ScriptedSource {
    pub fn new(height: u64) -> Arc<Self> {
        let source = Self::default();
        source.height.store(height, Ordering::SeqCst);
        Arc::new(source)
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// Add a `SwapTo` for `sender` in `block`, with the block timestamp on the log.
    pub fn push_swap(&self, sender: Address, tx: u8, block: u64, timestamp: u64) {
        self.push_log(swap_log(sender, tx, block, Some(timestamp)));
    }

    pub fn push_log(&self, log: Log) {
        self.logs.lock().unwrap().push(log);
    }

    pub fn set_block_time(&self, block: u64, timestamp: u64) {
        self.block_times.lock().unwrap().insert(block, timestamp);
    }

    /// Make every timestamp lookup for `block` return an RPC error.
    pub fn fail_block_time(&self, block: u64) {
        self.broken_blocks.lock().unwrap().push(block);
    }

    pub fn fail_range(&self, from: u64, to: u64, times: u32) {
        self.failures.lock().unwrap().insert((from, to), times);
    }

    pub fn heal_range(&self, from: u64, to: u64) {
        self.failures.lock().unwrap().remove(&(from, to));
    }

    pub fn calls(&self) -> Vec<BlockRange> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, from: u64, to: u64) -> usize {
        self.calls()
            .iter()
            .filter(|r| r.from == from && r.to == to)
            .count()
    }

    fn answer(&self, scope: &SwapFilter, range: BlockRange) -> SyncResult<Vec<Log>> {
        self.calls.lock().unwrap().push(range);

        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&(range.from, range.to)) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                return Err(SyncError::rpc(format!("scripted failure for {range}"), None));
            }
        }
        drop(failures);

        let sender_topic = scope.sender.into_word();
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| {
                let block = log.block_number.unwrap_or_default();
                log.address() == scope.contract
                    && log.topics().get(1) == Some(&sender_topic)
                    && block >= range.from
                    && block <= range.to
            })
            .cloned()
            .collect())
    }
}

impl LogSource for ScriptedSource {
    fn block_height(&self) -> impl Future<Output = SyncResult<u64>> + Send {
        ready(Ok(self.height.load(Ordering::SeqCst)))
    }

    fn query_logs(
        &self,
        scope: &SwapFilter,
        range: BlockRange,
    ) -> impl Future<Output = SyncResult<Vec<Log>>> + Send {
        ready(self.answer(scope, range))
    }

    fn block_timestamp(&self, number: u64) -> impl Future<Output = SyncResult<Option<u64>>> + Send {
        let result = if self.broken_blocks.lock().unwrap().contains(&number) {
            Err(SyncError::rpc(format!("scripted failure for block {number}"), None))
        } else {
            Ok(self.block_times.lock().unwrap().get(&number).copied())
        };
        ready(result)
    }
}

pub fn tx_hash(tx: u8) -> B256 {
    B256::repeat_byte(tx)
}

pub fn swap_log(sender: Address, tx: u8, block: u64, timestamp: Option<u64>) -> Log {
    let event = SwapTo {
        sender,
        fromToken: Address::repeat_byte(0x01),
        toToken: Address::repeat_byte(0x02),
        fee: U256::from(1_000_000_000_000_000_u64),
    };
    Log {
        inner: PrimitiveLog {
            address: DEFAULT_SWAP_CONTRACT,
            data: event.encode_log_data(),
        },
        block_hash: None,
        block_number: Some(block),
        block_timestamp: timestamp,
        transaction_hash: Some(tx_hash(tx)),
        transaction_index: None,
        log_index: None,
        removed: false,
    }
}

pub fn hashes(records: &[EventRecord]) -> Vec<B256> {
    records.iter().map(|r| r.transaction_hash).collect()
}

pub fn assert_sorted_desc(records: &[EventRecord]) {
    assert!(
        records.windows(2).all(|w| w[0].timestamp >= w[1].timestamp),
        "records not timestamp-descending"
    );
}
