//! Batch range planning.
//!
//! Log providers cap how many blocks one `eth_getLogs` call may span. The
//! planner splits an interval into bounded, inclusive [`BlockRange`]s. The
//! backfill walks newest to oldest so recent activity shows up first; the
//! live poller walks oldest to newest so the cursor advances in order.

use std::fmt;

use serde::Serialize;
use tracing::debug;

/// Inclusive block interval, `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BlockRange {
    /// First block (inclusive).
    pub from: u64,
    /// Last block (inclusive).
    pub to: u64,
}

impl BlockRange {
    /// Create a range, or `None` if `from > to`.
    #[must_use]
    pub const fn new(from: u64, to: u64) -> Option<Self> {
        if from > to {
            None
        } else {
            Some(Self { from, to })
        }
    }

    /// Number of blocks spanned.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.to - self.from + 1
    }

    /// Always false; a range spans at least one block.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

/// Walk direction of a [`RangePlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Oldest block first.
    Forward,
    /// Newest block first.
    Reverse,
}

/// Lazy, finite sequence of bounded block ranges.
///
/// `Clone` restarts the walk from the current position; [`RangePlan::restart`]
/// rewinds to the beginning.
#[derive(Debug, Clone)]
pub struct RangePlan {
    low: u64,
    high: u64,
    batch_size: u64,
    direction: Direction,
    // Next boundary to emit from; `None` once exhausted.
    cursor: Option<u64>,
    emitted: u64,
}

impl RangePlan {
    /// Plan the backfill window `[max(0, height - lookback), height]`, newest first.
    ///
    /// A `batch_size` of zero is treated as one block.
    #[must_use]
    pub fn lookback(lookback: u64, batch_size: u64, height: u64) -> Self {
        Self::reverse(height.saturating_sub(lookback), height, batch_size)
    }

    /// Plan `[low, high]` newest first.
    #[must_use]
    pub fn reverse(low: u64, high: u64, batch_size: u64) -> Self {
        Self::build(low, high, batch_size, Direction::Reverse)
    }

    /// Plan `[low, high]` oldest first.
    #[must_use]
    pub fn forward(low: u64, high: u64, batch_size: u64) -> Self {
        Self::build(low, high, batch_size, Direction::Forward)
    }

    fn build(low: u64, high: u64, batch_size: u64, direction: Direction) -> Self {
        let mut plan = Self {
            low,
            high,
            batch_size: batch_size.max(1),
            direction,
            cursor: None,
            emitted: 0,
        };
        plan.restart();
        plan
    }

    /// Rewind to the first range.
    pub fn restart(&mut self) {
        self.emitted = 0;
        self.cursor = if self.low > self.high {
            None
        } else {
            match self.direction {
                Direction::Forward => Some(self.low),
                Direction::Reverse => Some(self.high),
            }
        };
    }

    /// Total number of ranges in the plan.
    #[must_use]
    pub const fn total(&self) -> u64 {
        if self.low > self.high {
            0
        } else {
            (self.high - self.low) / self.batch_size + 1
        }
    }

    /// Number of ranges yielded since the last restart.
    #[must_use]
    pub const fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Walk direction.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }
}

impl Iterator for RangePlan {
    type Item = BlockRange;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        let span = self.batch_size - 1;

        let range = match self.direction {
            Direction::Forward => {
                let to = current.saturating_add(span).min(self.high);
                self.cursor = if to >= self.high { None } else { Some(to + 1) };
                BlockRange { from: current, to }
            }
            Direction::Reverse => {
                let from = current.saturating_sub(span).max(self.low);
                self.cursor = if from <= self.low { None } else { Some(from - 1) };
                BlockRange { from, to: current }
            }
        };

        self.emitted += 1;
        if self.emitted % 10 == 0 {
            debug!(emitted = self.emitted, total = self.total(), "Planned batches");
        }

        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.cursor.is_none() {
            0
        } else {
            self.total().saturating_sub(self.emitted)
        };
        match usize::try_from(remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(from: u64, to: u64) -> BlockRange {
        BlockRange { from, to }
    }

    #[test]
    fn lookback_newest_first() {
        let plan: Vec<_> = RangePlan::lookback(150, 50, 250).collect();
        assert_eq!(plan, vec![r(201, 250), r(151, 200), r(101, 150), r(100, 100)]);
    }

    #[test]
    fn lookback_clamps_at_genesis() {
        let plan: Vec<_> = RangePlan::lookback(1_000, 400, 30).collect();
        assert_eq!(plan, vec![r(0, 30)]);
    }

    #[test]
    fn lookback_covers_window_without_gaps() {
        let plan: Vec<_> = RangePlan::lookback(1_000, 333, 10_000).collect();
        assert_eq!(plan.first().map(|b| b.to), Some(10_000));
        assert_eq!(plan.last().map(|b| b.from), Some(9_000));
        for pair in plan.windows(2) {
            assert_eq!(pair[1].to + 1, pair[0].from);
        }
        assert!(plan.iter().all(|b| b.len() <= 333));
    }

    #[test]
    fn forward_basic() {
        let plan: Vec<_> = RangePlan::forward(100, 250, 50).collect();
        assert_eq!(plan, vec![r(100, 149), r(150, 199), r(200, 249), r(250, 250)]);
    }

    #[test]
    fn exact_boundary() {
        let plan: Vec<_> = RangePlan::reverse(100, 199, 50).collect();
        assert_eq!(plan, vec![r(150, 199), r(100, 149)]);
    }

    #[test]
    fn single_block() {
        let plan: Vec<_> = RangePlan::forward(7, 7, 1_000).collect();
        assert_eq!(plan, vec![r(7, 7)]);
    }

    #[test]
    fn empty_interval() {
        assert_eq!(RangePlan::forward(200, 100, 50).count(), 0);
        assert_eq!(RangePlan::forward(200, 100, 50).total(), 0);
    }

    #[test]
    fn zero_batch_size_is_one_block() {
        let plan: Vec<_> = RangePlan::reverse(5, 7, 0).collect();
        assert_eq!(plan, vec![r(7, 7), r(6, 6), r(5, 5)]);
    }

    #[test]
    fn restart_replays_the_plan() {
        let mut plan = RangePlan::lookback(100, 30, 1_000);
        let first: Vec<_> = plan.by_ref().collect();
        assert_eq!(plan.next(), None);
        plan.restart();
        let second: Vec<_> = plan.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn size_hint_matches_count() {
        let mut plan = RangePlan::forward(0, 99, 10);
        assert_eq!(plan.size_hint(), (10, Some(10)));
        plan.next();
        assert_eq!(plan.size_hint(), (9, Some(9)));
    }

    #[test]
    fn block_range_validation() {
        assert!(BlockRange::new(5, 4).is_none());
        assert_eq!(BlockRange::new(4, 5).map(|b| b.len()), Some(2));
        assert_eq!(r(1, 9).to_string(), "1..=9");
    }
}
