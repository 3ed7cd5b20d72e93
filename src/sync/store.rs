//! Session state: the sync cursor and the deduplicated event store.
//!
//! ## Invariants
//!
//! - `EventStore` is sorted by `timestamp` descending; ties keep insertion order.
//! - No two records in the store share a `transaction_hash`.
//! - `SyncCursor::last_processed_block` never decreases.
//! - `SyncCursor::seen` only grows, and contains exactly the hashes in the store.
//!
//! Dedup consults the cursor's seen-set, not the store. Both live in one
//! [`SessionState`] behind a single lock so a merge checks and updates the
//! seen-set and inserts into the store as one step.

use std::collections::HashSet;

use alloy::primitives::B256;
use tracing::debug;

use crate::events::EventRecord;

/// Progress of the live walk plus every transaction hash merged so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCursor {
    last_processed_block: Option<u64>,
    seen: HashSet<B256>,
}

impl SyncCursor {
    /// Create an empty cursor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest block fully processed by the live walk, if any.
    #[must_use]
    pub const fn last_processed_block(&self) -> Option<u64> {
        self.last_processed_block
    }

    /// Next block the live walk should query.
    #[must_use]
    pub fn next_block(&self) -> Option<u64> {
        self.last_processed_block.map(|b| b.saturating_add(1))
    }

    /// Advance to `block`. Never moves backwards.
    ///
    /// Returns `true` if the cursor moved.
    pub fn advance_to(&mut self, block: u64) -> bool {
        match self.last_processed_block {
            Some(current) if current >= block => false,
            _ => {
                self.last_processed_block = Some(block);
                true
            }
        }
    }

    /// Whether `hash` has been merged.
    #[must_use]
    pub fn has_seen(&self, hash: &B256) -> bool {
        self.seen.contains(hash)
    }

    /// Record `hash`; returns `false` if it was already present.
    pub fn mark_seen(&mut self, hash: B256) -> bool {
        self.seen.insert(hash)
    }

    /// Number of distinct hashes merged.
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

/// Timestamp-descending collection of unique swap records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStore {
    records: Vec<EventRecord>,
}

impl EventStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records, newest first.
    #[must_use]
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn insert_batch(&mut self, batch: Vec<EventRecord>) {
        if batch.is_empty() {
            return;
        }
        self.records.extend(batch);
        // Stable: equal timestamps keep insertion order.
        self.records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }
}

/// Everything a session owns: cursor, store and a mutation counter.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    cursor: SyncCursor,
    store: EventStore,
    revision: u64,
}

impl SessionState {
    /// Fresh state for a new session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The sync cursor.
    #[must_use]
    pub const fn cursor(&self) -> &SyncCursor {
        &self.cursor
    }

    /// The event store.
    #[must_use]
    pub const fn store(&self) -> &EventStore {
        &self.store
    }

    /// Incremented on every change visible to readers.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Merge `records`, dropping any whose hash was already seen.
    ///
    /// Idempotent: merging the same batch again changes nothing. Returns the
    /// number of records actually inserted.
    pub fn merge<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = EventRecord>,
    {
        let fresh: Vec<EventRecord> = records
            .into_iter()
            .filter(|record| self.cursor.mark_seen(record.transaction_hash))
            .collect();

        let inserted = fresh.len();
        if inserted > 0 {
            self.store.insert_batch(fresh);
            self.revision += 1;
            debug!(inserted, total = self.store.len(), "Merged records");
        }
        inserted
    }

    /// Advance the live cursor to `block`; see [`SyncCursor::advance_to`].
    pub fn advance_cursor(&mut self, block: u64) -> bool {
        let moved = self.cursor.advance_to(block);
        if moved {
            self.revision += 1;
        }
        moved
    }

    /// Clone of the current records, newest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.store.records.clone()
    }
}
