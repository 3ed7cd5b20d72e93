//! Live poller: keeps the store current after the session is anchored.
//!
//! Every tick reads the chain height and walks `[cursor + 1, height]`
//! oldest-first in batches. After each batch is merged the cursor advances
//! to the batch end, empty batches included. A batch that fails after every
//! retry stops the tick; the cursor stays put and the next tick starts from
//! the same block. Once the same batch has stopped as many ticks in a row as
//! the retry policy has attempts, it is abandoned: logged as source
//! unavailable and stepped over so later blocks keep flowing.
//!
//! Ticks are driven either by a fixed interval or by a WebSocket new-head
//! subscription. In subscribe mode the logs themselves are still fetched
//! through the HTTP log source, so both modes share one cursor discipline.
//! When the WebSocket cannot be (re)established the poller falls back to
//! interval polling for the rest of the session.

use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::config::{LiveMode, SyncSettings};
use crate::error::SyncResult;
use crate::events::decode_batch;
use crate::rpc::websocket::ReconnectingWebSocket;
use crate::rpc::LogSource;
use crate::sync::fetcher::RetryingFetcher;
use crate::sync::planner::{BlockRange, RangePlan};
use crate::sync::session::Session;

/// What triggers a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveStrategy {
    /// Tick on a fixed interval.
    Poll {
        /// Time between ticks.
        interval: Duration,
    },
    /// Tick on every new head from a WebSocket subscription.
    Subscribe {
        /// WebSocket endpoint.
        ws_url: String,
        /// Interval used if the subscription cannot be kept up.
        fallback_interval: Duration,
    },
}

impl LiveStrategy {
    /// Pick the strategy configured in `settings`.
    ///
    /// Subscribe mode without a WebSocket URL degrades to polling.
    #[must_use]
    pub fn from_settings(settings: &SyncSettings) -> Self {
        match (settings.live_mode, settings.ws_url.as_ref()) {
            (LiveMode::Subscribe, Some(ws_url)) => Self::Subscribe {
                ws_url: ws_url.clone(),
                fallback_interval: settings.poll_interval,
            },
            _ => Self::Poll {
                interval: settings.poll_interval,
            },
        }
    }
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TickOutcome {
    /// The session has no anchor yet; nothing was queried.
    Unanchored,
    /// The cursor is already at the chain head.
    UpToDate {
        /// Current cursor.
        cursor: u64,
    },
    /// One or more ranges were processed.
    Advanced {
        /// Ranges merged this tick.
        ranges: u64,
        /// Ranges stepped over after stalling too many ticks.
        abandoned: u64,
        /// Records newly inserted.
        merged: usize,
        /// Cursor after the tick.
        cursor: u64,
    },
    /// The session was torn down mid-tick.
    Inactive,
}

/// Handle to a running live poller.
#[derive(Debug)]
pub struct LiveHandle {
    session: Session,
    task: JoinHandle<()>,
}

impl LiveHandle {
    /// Stop the poller. No merge happens after this returns.
    pub fn cancel(&self) {
        self.session.deactivate();
        self.task.abort();
    }

    /// Whether the poller task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// A range that stopped consecutive ticks.
#[derive(Debug, Clone, Copy)]
struct Stall {
    from: u64,
    ticks: u32,
}

/// Walks new blocks for one session.
pub struct LivePoller<S> {
    fetcher: RetryingFetcher<S>,
    session: Session,
    batch_size: u64,
    strategy: LiveStrategy,
    stalled: Option<Stall>,
}

impl<S: LogSource> LivePoller<S> {
    /// Create a poller for `session`.
    pub fn new(
        fetcher: RetryingFetcher<S>,
        session: Session,
        batch_size: u64,
        strategy: LiveStrategy,
    ) -> Self {
        Self {
            fetcher,
            session,
            batch_size,
            strategy,
            stalled: None,
        }
    }

    /// Spawn the poller loop.
    pub fn start(self) -> LiveHandle {
        let session = self.session.clone();
        let task = tokio::spawn(self.run());
        LiveHandle { session, task }
    }

    async fn run(mut self) {
        match self.strategy.clone() {
            LiveStrategy::Poll { interval } => self.poll_loop(interval).await,
            LiveStrategy::Subscribe {
                ws_url,
                fallback_interval,
            } => self.subscribe_loop(ws_url, fallback_interval).await,
        }
        debug!(session = self.session.id(), "Live poller exited");
    }

    async fn poll_loop(&mut self, period: Duration) {
        info!(session = self.session.id(), interval_ms = period.as_millis(), "Live polling started");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.session.is_active() {
            interval.tick().await;
            self.tick_logged().await;
        }
    }

    async fn subscribe_loop(&mut self, ws_url: String, fallback: Duration) {
        let mut ws = ReconnectingWebSocket::new(ws_url);

        while self.session.is_active() {
            let connected = if ws.is_connected() {
                ws.reconnect().await
            } else {
                ws.connect().await
            };
            let heads = match connected {
                Ok(provider) => provider.subscribe_heads().await,
                Err(e) => {
                    warn!(error = %e, "WebSocket unavailable, falling back to polling");
                    return self.poll_loop(fallback).await;
                }
            };

            let mut heads = match heads {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "New-head subscription failed, retrying");
                    tokio::time::sleep(fallback).await;
                    continue;
                }
            };

            info!(session = self.session.id(), "Live subscription started");
            // Catch up on anything produced while connecting.
            self.tick_logged().await;

            while let Some(header) = heads.next().await {
                if !self.session.is_active() {
                    return;
                }
                debug!(head = header.number, "New head");
                self.tick_logged().await;
            }

            warn!("New-head stream ended, reconnecting");
        }
    }

    async fn tick_logged(&mut self) {
        match self.tick().await {
            Ok(TickOutcome::Advanced {
                ranges,
                abandoned,
                merged,
                cursor,
            }) => debug!(ranges, abandoned, merged, cursor, "Live tick"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Live tick stopped, will resume from cursor"),
        }
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// Returns the height lookup error or the
    /// [`SourceUnavailable`](crate::error::SyncError::SourceUnavailable) of the
    /// first range that failed and has not yet stalled long enough to be
    /// abandoned. Ranges merged before the failure stay merged.
    #[instrument(skip(self), fields(session = self.session.id()))]
    pub async fn tick(&mut self) -> SyncResult<TickOutcome> {
        if !self.session.is_active() {
            return Ok(TickOutcome::Inactive);
        }
        let Some(from) = self.session.next_block().await else {
            return Ok(TickOutcome::Unanchored);
        };

        let height = self.fetcher.block_height().await?;
        if from > height {
            return Ok(TickOutcome::UpToDate { cursor: from - 1 });
        }

        let mut ranges = 0;
        let mut abandoned = 0;
        let mut merged = 0;
        for range in RangePlan::forward(from, height, self.batch_size) {
            if !self.session.is_active() {
                return Ok(TickOutcome::Inactive);
            }

            let (records, skipped) = match self.fetcher.fetch(range).await {
                Ok(logs) => {
                    self.stalled = None;
                    let records =
                        decode_batch(&logs, self.fetcher.source(), self.fetcher.scope()).await;
                    (records, false)
                }
                Err(e) => {
                    if !self.stall(range) {
                        return Err(e);
                    }
                    warn!(error = %e, range = %range, "Abandoning live range");
                    (Vec::new(), true)
                }
            };

            match self.session.merge_and_advance(records, range.to).await {
                Some(inserted) => merged += inserted,
                None => return Ok(TickOutcome::Inactive),
            }
            if skipped {
                abandoned += 1;
            } else {
                ranges += 1;
            }
        }

        Ok(TickOutcome::Advanced {
            ranges,
            abandoned,
            merged,
            cursor: height,
        })
    }

    /// Record that `range` stopped this tick. Returns `true` once it should be abandoned.
    fn stall(&mut self, range: BlockRange) -> bool {
        let ticks = match self.stalled {
            Some(stall) if stall.from == range.from => stall.ticks + 1,
            _ => 1,
        };
        if ticks >= self.fetcher.policy().max_attempts() {
            self.stalled = None;
            return true;
        }
        debug!(range = %range, ticks, "Live range stalled");
        self.stalled = Some(Stall {
            from: range.from,
            ticks,
        });
        false
    }
}
