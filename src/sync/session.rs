//! Sessions: the (wallet, network, provider) scope of one sync run.
//!
//! A [`Session`] owns its [`SessionState`] and an `active` flag. Every merge
//! takes the state's write lock and checks the flag under it, so once
//! [`Session::deactivate`] returns no in-flight task can write into the
//! session again. A replacement session always gets a fresh state object;
//! stale tasks can never reach it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::Address;
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};
use crate::events::EventRecord;
use crate::rpc::LogSource;
use crate::sync::pagination::{paginate, Page};
use crate::sync::store::SessionState;

/// The ready form of a session identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionKey {
    /// Wallet whose swaps are tracked.
    pub address: Address,
    /// Network the provider is connected to.
    pub chain_id: u64,
}

/// Wallet address, network and provider, each possibly absent.
pub struct SessionIdentity<S> {
    /// Connected wallet.
    pub address: Option<Address>,
    /// Network chain id.
    pub chain_id: Option<u64>,
    /// Log source handle.
    pub source: Option<Arc<S>>,
}

impl<S> Clone for SessionIdentity<S> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            chain_id: self.chain_id,
            source: self.source.clone(),
        }
    }
}

impl<S> std::fmt::Debug for SessionIdentity<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("source", &self.source.as_ref().map(|_| "<source>"))
            .finish()
    }
}

impl<S: LogSource> SessionIdentity<S> {
    /// Build an identity.
    pub const fn new(address: Option<Address>, chain_id: Option<u64>, source: Option<Arc<S>>) -> Self {
        Self {
            address,
            chain_id,
            source,
        }
    }

    /// The key and source, if every part is present.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SessionNotReady`] naming the first missing part.
    pub fn ready(&self) -> SyncResult<(SessionKey, Arc<S>)> {
        let address = self
            .address
            .ok_or_else(|| SyncError::session_not_ready("wallet address"))?;
        let chain_id = self
            .chain_id
            .ok_or_else(|| SyncError::session_not_ready("chain id"))?;
        let source = self
            .source
            .clone()
            .ok_or_else(|| SyncError::session_not_ready("provider"))?;
        Ok((SessionKey { address, chain_id }, source))
    }

    /// Whether `other` names the same wallet, network and provider handle.
    pub fn same_as(&self, other: &Self) -> bool {
        let same_source = match (&self.source, &other.source) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.address == other.address && self.chain_id == other.chain_id && same_source
    }
}

/// Point-in-time summary of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    /// Session sequence number within the engine.
    pub id: u64,
    /// Wallet and network.
    pub key: SessionKey,
    /// Whether the session still accepts merges.
    pub active: bool,
    /// Live cursor position.
    pub last_processed_block: Option<u64>,
    /// Records in the store.
    pub total_records: usize,
    /// Mutation counter.
    pub revision: u64,
}

/// One sync session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Session {
    id: u64,
    key: SessionKey,
    state: Arc<RwLock<SessionState>>,
    active: Arc<AtomicBool>,
    revisions: Arc<watch::Sender<u64>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create an active session with empty state.
    #[must_use]
    pub fn new(id: u64, key: SessionKey) -> Self {
        let (revisions, _) = watch::channel(0);
        info!(session = id, address = %key.address, chain_id = key.chain_id, "Session created");
        Self {
            id,
            key,
            state: Arc::new(RwLock::new(SessionState::new())),
            active: Arc::new(AtomicBool::new(true)),
            revisions: Arc::new(revisions),
        }
    }

    /// Session sequence number.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Wallet and network.
    #[must_use]
    pub const fn key(&self) -> SessionKey {
        self.key
    }

    /// Whether the session still accepts merges.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop accepting merges. Idempotent.
    pub fn deactivate(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            info!(session = self.id, "Session deactivated");
        }
    }

    /// Receiver notified with the new revision after every mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revisions.subscribe()
    }

    /// Merge `records` if the session is still active.
    ///
    /// Returns `None` when the session was torn down; nothing is written then.
    pub async fn merge(&self, records: Vec<EventRecord>) -> Option<usize> {
        self.apply(records, None).await
    }

    /// Merge `records` and advance the cursor to `block` in one step.
    ///
    /// Returns `None` when the session was torn down.
    pub async fn merge_and_advance(&self, records: Vec<EventRecord>, block: u64) -> Option<usize> {
        self.apply(records, Some(block)).await
    }

    /// Anchor the live cursor at `height`.
    ///
    /// Returns `false` when the session was torn down.
    pub async fn anchor(&self, height: u64) -> bool {
        self.apply(Vec::new(), Some(height)).await.is_some()
    }

    async fn apply(&self, records: Vec<EventRecord>, advance_to: Option<u64>) -> Option<usize> {
        let mut state = self.state.write().await;
        if !self.is_active() {
            debug!(session = self.id, "Dropping merge for inactive session");
            return None;
        }

        let before = state.revision();
        let inserted = state.merge(records);
        if let Some(block) = advance_to {
            state.advance_cursor(block);
        }

        let after = state.revision();
        if after != before {
            self.revisions.send_replace(after);
        }
        Some(inserted)
    }

    /// Next block the live walk should query, once the session is anchored.
    pub async fn next_block(&self) -> Option<u64> {
        self.state.read().await.cursor().next_block()
    }

    /// Live cursor position.
    pub async fn last_processed_block(&self) -> Option<u64> {
        self.state.read().await.cursor().last_processed_block()
    }

    /// Records, newest first.
    pub async fn snapshot(&self) -> Vec<EventRecord> {
        self.state.read().await.snapshot()
    }

    /// Render `page` of the store.
    pub async fn page(&self, page_size: usize, page: usize) -> Page {
        let state = self.state.read().await;
        paginate(state.store().records(), page_size, page)
    }

    /// Status summary.
    pub async fn status(&self) -> SessionStatus {
        let state = self.state.read().await;
        SessionStatus {
            id: self.id,
            key: self.key,
            active: self.is_active(),
            last_processed_block: state.cursor().last_processed_block(),
            total_records: state.store().len(),
            revision: state.revision(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use alloy::primitives::B256;

    fn key() -> SessionKey {
        SessionKey {
            address: Address::repeat_byte(0xaa),
            chain_id: 56,
        }
    }

    fn record(n: u8, timestamp: u64) -> EventRecord {
        EventRecord {
            sender: Address::repeat_byte(0xaa),
            from_token: Address::ZERO,
            to_token: Address::ZERO,
            fee: "0".to_string(),
            timestamp,
            transaction_hash: B256::repeat_byte(n),
            block_number: 1,
        }
    }

    #[tokio::test]
    async fn test_merge_after_deactivate_is_dropped() {
        let session = Session::new(1, key());
        assert_eq!(session.merge(vec![record(1, 10)]).await, Some(1));

        session.deactivate();
        assert_eq!(session.merge(vec![record(2, 20)]).await, None);
        assert_eq!(session.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_merge_and_advance_empty_batch_moves_cursor() {
        let session = Session::new(1, key());
        assert_eq!(session.merge_and_advance(Vec::new(), 500).await, Some(0));
        assert_eq!(session.last_processed_block().await, Some(500));
        assert_eq!(session.next_block().await, Some(501));
    }

    #[tokio::test]
    async fn test_revision_notifications() {
        let session = Session::new(1, key());
        let mut revisions = session.subscribe();

        session.merge(vec![record(1, 10)]).await;
        assert!(revisions.has_changed().unwrap_or(false));
        assert_eq!(*revisions.borrow_and_update(), 1);

        // A duplicate merge is not a mutation.
        session.merge(vec![record(1, 10)]).await;
        assert!(!revisions.has_changed().unwrap_or(true));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overlapping_merges() {
        let session = Session::new(1, key());

        // Eight writers, each covering a window that overlaps its neighbours.
        let writers: Vec<_> = (0..8_u8)
            .map(|w| {
                let session = session.clone();
                tokio::spawn(async move {
                    for n in w * 4..w * 4 + 12 {
                        let batch = vec![
                            record(n, u64::from(n) * 10),
                            record(n / 2, u64::from(n / 2) * 10),
                        ];
                        session.merge(batch).await;
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let state = session.state.read().await;
        let records = state.store().records();
        // Hashes 0..40 were each written several times.
        assert_eq!(records.len(), 40);
        assert_eq!(state.cursor().seen_count(), records.len());
        assert!(records.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

        let mut hashes: Vec<_> = records.iter().map(|r| r.transaction_hash).collect();
        hashes.sort();
        hashes.dedup();
        assert_eq!(hashes.len(), records.len());
    }

    #[tokio::test]
    async fn test_status() {
        let session = Session::new(9, key());
        session.merge_and_advance(vec![record(1, 10)], 42).await;
        let status = session.status().await;
        assert_eq!(status.id, 9);
        assert_eq!(status.total_records, 1);
        assert_eq!(status.last_processed_block, Some(42));
        assert!(status.active);
    }
}
