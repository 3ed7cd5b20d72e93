//! Historical backfill driver.
//!
//! Walks the lookback window newest-first, one batch at a time, and merges
//! each batch into the session as soon as it is decoded so the newest swaps
//! show up first. A range that still fails after every retry is abandoned;
//! the walk carries on with the next one.
//!
//! Phases: `Idle -> Planning -> (FetchingBatch -> Merging)* -> Done`, with
//! `Cancelled` reachable from any phase once the session is torn down.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::events::decode_batch;
use crate::rpc::LogSource;
use crate::sync::fetcher::RetryingFetcher;
use crate::sync::planner::{BlockRange, RangePlan};
use crate::sync::session::Session;

/// Where the driver is in its walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum BackfillPhase {
    /// Not started.
    Idle,
    /// Building the range plan.
    Planning,
    /// Waiting on the fetcher for `range`.
    FetchingBatch {
        /// Range being fetched.
        range: BlockRange,
    },
    /// Merging the decoded batch for `range`.
    Merging {
        /// Range being merged.
        range: BlockRange,
    },
    /// Every range processed or abandoned.
    Done,
    /// Session torn down mid-walk.
    Cancelled,
}

impl fmt::Display for BackfillPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Planning => write!(f, "planning"),
            Self::FetchingBatch { range } => write!(f, "fetching {range}"),
            Self::Merging { range } => write!(f, "merging {range}"),
            Self::Done => write!(f, "done"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of one backfill pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Final phase, `Done` or `Cancelled`.
    pub phase: BackfillPhase,
    /// Ranges fetched successfully.
    pub batches_fetched: u64,
    /// Ranges given up on after retries.
    pub abandoned: Vec<BlockRange>,
    /// Records newly inserted into the store.
    pub records_merged: usize,
}

impl BackfillReport {
    fn new() -> Self {
        Self {
            phase: BackfillPhase::Idle,
            batches_fetched: 0,
            abandoned: Vec::new(),
            records_merged: 0,
        }
    }

    /// Whether every planned range was fetched.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == BackfillPhase::Done && self.abandoned.is_empty()
    }
}

/// Drives one historical pass for a session.
pub struct BackfillDriver<S> {
    fetcher: RetryingFetcher<S>,
    session: Session,
    lookback: u64,
    batch_size: u64,
    report: BackfillReport,
}

impl<S: LogSource> BackfillDriver<S> {
    /// Create a driver for `session` covering `lookback` blocks in batches of `batch_size`.
    pub fn new(fetcher: RetryingFetcher<S>, session: Session, lookback: u64, batch_size: u64) -> Self {
        Self {
            fetcher,
            session,
            lookback,
            batch_size,
            report: BackfillReport::new(),
        }
    }

    /// Current phase.
    pub const fn phase(&self) -> BackfillPhase {
        self.report.phase
    }

    fn enter(&mut self, phase: BackfillPhase) {
        debug!(session = self.session.id(), from = %self.report.phase, to = %phase, "Backfill phase");
        self.report.phase = phase;
    }

    fn cancelled(&mut self) -> bool {
        if self.session.is_active() {
            return false;
        }
        self.enter(BackfillPhase::Cancelled);
        true
    }

    /// Walk `[height - lookback, height]` newest-first.
    #[instrument(skip(self), fields(session = self.session.id()))]
    pub async fn run(mut self, height: u64) -> BackfillReport {
        self.enter(BackfillPhase::Planning);
        let plan = RangePlan::lookback(self.lookback, self.batch_size, height);
        info!(ranges = plan.total(), lookback = self.lookback, "Backfill started");

        for range in plan {
            if self.cancelled() {
                return self.report;
            }

            self.enter(BackfillPhase::FetchingBatch { range });
            let logs = match self.fetcher.fetch(range).await {
                Ok(logs) => logs,
                Err(e) => {
                    warn!(error = %e, "Abandoning range");
                    self.report.abandoned.push(range);
                    continue;
                }
            };
            self.report.batches_fetched += 1;

            if self.cancelled() {
                return self.report;
            }

            self.enter(BackfillPhase::Merging { range });
            let records = decode_batch(&logs, self.fetcher.source(), self.fetcher.scope()).await;
            match self.session.merge(records).await {
                Some(inserted) => self.report.records_merged += inserted,
                None => {
                    self.enter(BackfillPhase::Cancelled);
                    return self.report;
                }
            }
        }

        self.enter(BackfillPhase::Done);
        info!(
            fetched = self.report.batches_fetched,
            abandoned = self.report.abandoned.len(),
            merged = self.report.records_merged,
            "Backfill finished"
        );
        self.report
    }
}
