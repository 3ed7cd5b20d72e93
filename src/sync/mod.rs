//! Swap event synchronization.
//!
//! ```text
//! SyncEngine ── Session ──┬── BackfillDriver ─┐
//!                         └── LivePoller ─────┴─ RetryingFetcher ── LogSource
//!                                                        │
//!                                             decode_batch ── SessionState (cursor + store)
//! ```
//!
//! - [`planner`]: bounded block ranges, newest-first or oldest-first
//! - [`retry`]: linear-backoff retry primitive
//! - [`fetcher`]: one range through the log source, with retry
//! - [`store`]: deduplicating, timestamp-ordered store and the sync cursor
//! - [`session`]: per-wallet session with cancellation
//! - [`backfill`]: historical pass over the lookback window
//! - [`live`]: interval or subscription driven tail of the chain
//! - [`engine`]: session lifecycle
//! - [`pagination`]: page slices for display

pub mod backfill;
pub mod engine;
pub mod fetcher;
pub mod live;
pub mod pagination;
pub mod planner;
pub mod retry;
pub mod session;
pub mod store;

pub use backfill::{BackfillDriver, BackfillPhase, BackfillReport};
pub use engine::{SessionChange, SyncEngine};
pub use fetcher::RetryingFetcher;
pub use live::{LiveHandle, LivePoller, LiveStrategy, TickOutcome};
pub use pagination::{paginate, Page, PageView, DEFAULT_PAGE_SIZE};
pub use planner::{BlockRange, Direction, RangePlan};
pub use retry::{retry_with_backoff, RetriesExhausted, RetryPolicy};
pub use session::{Session, SessionIdentity, SessionKey, SessionStatus};
pub use store::{EventStore, SessionState, SyncCursor};
