//! Live poller cursor discipline against the scripted source.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{hashes, tx_hash, ScriptedSource, WALLET};
use swap_event_sync::config::DEFAULT_SWAP_CONTRACT;
use swap_event_sync::events::SwapFilter;
use swap_event_sync::sync::{
    BackfillDriver, LivePoller, LiveStrategy, RetryPolicy, RetryingFetcher, Session, SessionKey,
    TickOutcome,
};

const POLL: Duration = Duration::from_secs(2);

fn session() -> Session {
    Session::new(
        1,
        SessionKey {
            address: WALLET,
            chain_id: 56,
        },
    )
}

fn fetcher(source: &Arc<ScriptedSource>) -> RetryingFetcher<ScriptedSource> {
    RetryingFetcher::new(
        source.clone(),
        SwapFilter::new(DEFAULT_SWAP_CONTRACT, WALLET),
        RetryPolicy::default(),
    )
}

fn poller(source: &Arc<ScriptedSource>, session: &Session, batch_size: u64) -> LivePoller<ScriptedSource> {
    LivePoller::new(
        fetcher(source),
        session.clone(),
        batch_size,
        LiveStrategy::Poll { interval: POLL },
    )
}

#[tokio::test(start_paused = true)]
async fn test_unanchored_tick_queries_nothing() {
    let source = ScriptedSource::new(100);
    let session = session();

    let outcome = poller(&source, &session, 10).tick().await.unwrap();
    assert_eq!(outcome, TickOutcome::Unanchored);
    assert!(source.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cursor_advances_over_empty_ranges() {
    let source = ScriptedSource::new(150);
    let session = session();
    assert!(session.anchor(100).await);
    let mut poller = poller(&source, &session, 20);

    let outcome = poller.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Advanced {
            ranges: 3,
            abandoned: 0,
            merged: 0,
            cursor: 150
        }
    );
    assert_eq!(session.last_processed_block().await, Some(150));

    assert_eq!(
        poller.tick().await.unwrap(),
        TickOutcome::UpToDate { cursor: 150 }
    );

    source.set_height(155);
    source.push_swap(WALLET, 1, 153, 9_000);
    poller.tick().await.unwrap();
    assert_eq!(session.last_processed_block().await, Some(155));
    assert_eq!(hashes(&session.snapshot().await), vec![tx_hash(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_range_stops_tick_without_advancing() {
    let source = ScriptedSource::new(130);
    source.push_swap(WALLET, 1, 125, 9_000);
    source.fail_range(111, 120, u32::MAX);

    let session = session();
    assert!(session.anchor(100).await);
    let mut poller = poller(&source, &session, 10);

    assert!(poller.tick().await.is_err());
    assert_eq!(session.last_processed_block().await, Some(110));
    // Nothing past the failed range was queried.
    assert_eq!(source.calls_for(121, 130), 0);

    source.heal_range(111, 120);
    poller.tick().await.unwrap();
    assert_eq!(session.last_processed_block().await, Some(130));
    assert_eq!(session.snapshot().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_range_failing_every_tick_is_abandoned() {
    let source = ScriptedSource::new(130);
    source.push_swap(WALLET, 1, 125, 9_000);
    source.fail_range(111, 120, u32::MAX);

    let session = session();
    assert!(session.anchor(100).await);
    let mut poller = poller(&source, &session, 10);

    // Two ticks stop at the broken range with the cursor held before it.
    assert!(poller.tick().await.is_err());
    assert!(poller.tick().await.is_err());
    assert_eq!(session.last_processed_block().await, Some(110));
    assert_eq!(source.calls_for(121, 130), 0);

    // The third stall steps over it and the blocks behind it sync.
    assert_eq!(
        poller.tick().await.unwrap(),
        TickOutcome::Advanced {
            ranges: 1,
            abandoned: 1,
            merged: 1,
            cursor: 130
        }
    );
    assert_eq!(source.calls_for(111, 120), 9);
    assert_eq!(session.last_processed_block().await, Some(130));
    assert_eq!(hashes(&session.snapshot().await), vec![tx_hash(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_cursor_never_moves_backwards() {
    let source = ScriptedSource::new(200);
    let session = session();
    assert!(session.anchor(200).await);

    // A reorg-shortened height must not rewind the cursor.
    source.set_height(190);
    let mut poller = poller(&source, &session, 10);
    assert_eq!(
        poller.tick().await.unwrap(),
        TickOutcome::UpToDate { cursor: 200 }
    );
    assert_eq!(session.last_processed_block().await, Some(200));
}

#[tokio::test(start_paused = true)]
async fn test_backfill_and_live_overlap_stored_once() {
    let source = ScriptedSource::new(1_000);
    source.push_swap(WALLET, 1, 995, 5_000);
    source.push_swap(WALLET, 2, 990, 4_000);

    let session = session();
    // Live anchored below the swaps so both walkers see them.
    assert!(session.anchor(980).await);

    let mut live = poller(&source, &session, 100);
    live.tick().await.unwrap();

    let report = BackfillDriver::new(fetcher(&source), session.clone(), 100, 50)
        .run(1_000)
        .await;
    assert_eq!(report.records_merged, 0);

    let records = session.snapshot().await;
    assert_eq!(hashes(&records), vec![tx_hash(1), tx_hash(2)]);
}

#[tokio::test(start_paused = true)]
async fn test_polling_loop_picks_up_new_blocks_until_cancelled() {
    let source = ScriptedSource::new(500);
    let session = session();
    assert!(session.anchor(500).await);

    let handle = poller(&source, &session, 100).start();

    source.set_height(520);
    source.push_swap(WALLET, 1, 510, 7_000);
    tokio::time::sleep(POLL * 2).await;

    assert_eq!(session.last_processed_block().await, Some(520));
    assert_eq!(session.snapshot().await.len(), 1);

    handle.cancel();
    tokio::time::sleep(POLL).await;
    assert!(handle.is_finished());

    // Nothing merges into a cancelled session.
    source.set_height(540);
    source.push_swap(WALLET, 2, 530, 8_000);
    tokio::time::sleep(POLL * 2).await;
    assert_eq!(session.snapshot().await.len(), 1);
    assert_eq!(session.last_processed_block().await, Some(520));
}
