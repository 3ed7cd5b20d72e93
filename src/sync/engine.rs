//! Sync engine: owns the current session and reacts to identity changes.
//!
//! Applying an identity that differs from the last one tears the running
//! session down (flag flipped, tasks aborted) before a new session with an
//! empty store is created. Until the identity is complete the engine stays
//! idle. The current session is published on a `watch` channel so the API
//! and CLI always read from the live one.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SyncSettings;
use crate::error::SyncError;
use crate::events::SwapFilter;
use crate::rpc::LogSource;
use crate::sync::backfill::{BackfillDriver, BackfillReport};
use crate::sync::fetcher::RetryingFetcher;
use crate::sync::live::{LiveHandle, LivePoller, LiveStrategy};
use crate::sync::pagination::Page;
use crate::sync::retry::RetryPolicy;
use crate::sync::session::{Session, SessionIdentity, SessionKey};

/// What [`SyncEngine::apply_identity`] did.
#[derive(Debug)]
pub enum SessionChange {
    /// Same identity as before; nothing happened.
    Unchanged,
    /// Identity incomplete; any previous session was torn down.
    Idle {
        /// The [`SessionNotReady`](crate::error::SyncError::SessionNotReady) naming what is missing.
        reason: SyncError,
    },
    /// A new session started.
    Started(Session),
}

struct RunningSession {
    session: Session,
    backfill: Option<JoinHandle<Option<BackfillReport>>>,
    live: LiveHandle,
}

/// Session lifecycle manager.
pub struct SyncEngine<S> {
    settings: SyncSettings,
    identity: Option<SessionIdentity<S>>,
    current: Option<RunningSession>,
    published: watch::Sender<Option<Session>>,
    next_id: u64,
}

impl<S: LogSource> SyncEngine<S> {
    /// Create an idle engine.
    #[must_use]
    pub fn new(settings: SyncSettings) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            settings,
            identity: None,
            current: None,
            published,
            next_id: 0,
        }
    }

    /// Engine tunables.
    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Receiver that always holds the current session, if any.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.published.subscribe()
    }

    /// The running session.
    pub fn current(&self) -> Option<Session> {
        self.current.as_ref().map(|running| running.session.clone())
    }

    /// Switch to `identity`.
    ///
    /// Idempotent for an identical identity. Must be called inside a Tokio
    /// runtime; the new session's tasks are spawned on it.
    pub fn apply_identity(&mut self, identity: SessionIdentity<S>) -> SessionChange {
        if self
            .identity
            .as_ref()
            .is_some_and(|last| last.same_as(&identity))
        {
            debug!("Identity unchanged");
            return SessionChange::Unchanged;
        }

        self.teardown();
        let ready = identity.ready();
        self.identity = Some(identity);

        match ready {
            Ok((key, source)) => SessionChange::Started(self.start(key, source)),
            Err(reason) => {
                debug!(%reason, "Engine idle");
                SessionChange::Idle { reason }
            }
        }
    }

    fn start(&mut self, key: SessionKey, source: std::sync::Arc<S>) -> Session {
        self.next_id += 1;
        let session = Session::new(self.next_id, key);
        let settings = &self.settings;

        let fetcher = RetryingFetcher::new(
            source,
            SwapFilter::new(settings.swap_contract, key.address),
            RetryPolicy::new(settings.max_attempts, settings.retry_base_delay),
        );

        let live = LivePoller::new(
            fetcher.clone(),
            session.clone(),
            settings.batch_size,
            LiveStrategy::from_settings(settings),
        )
        .start();

        let backfill = tokio::spawn(bootstrap(
            fetcher,
            session.clone(),
            settings.lookback_blocks,
            settings.batch_size,
            settings.poll_interval,
        ));

        self.current = Some(RunningSession {
            session: session.clone(),
            backfill: Some(backfill),
            live,
        });
        self.published.send_replace(Some(session.clone()));
        session
    }

    /// Wait for the running session's backfill to finish.
    ///
    /// Returns `None` if there is no session, the report was already taken,
    /// or the session was torn down first.
    pub async fn wait_backfill(&mut self) -> Option<BackfillReport> {
        let handle = self.current.as_mut()?.backfill.take()?;
        handle.await.ok().flatten()
    }

    /// Current page of the running session's store.
    pub async fn page(&self, page: usize) -> Option<Page> {
        let session = self.current()?;
        Some(session.page(self.settings.page_size, page).await)
    }
}

impl<S> SyncEngine<S> {
    /// Tear down the running session and forget the identity.
    pub fn shutdown(&mut self) {
        self.teardown();
        self.identity = None;
    }

    fn teardown(&mut self) {
        if let Some(running) = self.current.take() {
            running.session.deactivate();
            running.live.cancel();
            if let Some(backfill) = running.backfill {
                backfill.abort();
            }
            info!(session = running.session.id(), "Session torn down");
        }
        self.published.send_replace(None);
    }
}

impl<S> Drop for SyncEngine<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Anchor the session at the current height, then run the backfill from it.
///
/// The height lookup is retried until it succeeds or the session ends; the
/// live poller stays unanchored until then.
async fn bootstrap<S: LogSource>(
    fetcher: RetryingFetcher<S>,
    session: Session,
    lookback: u64,
    batch_size: u64,
    retry_every: Duration,
) -> Option<BackfillReport> {
    let height = loop {
        if !session.is_active() {
            return None;
        }
        match fetcher.block_height().await {
            Ok(height) => break height,
            Err(e) => {
                warn!(session = session.id(), error = %e, "Cannot anchor session, retrying");
                tokio::time::sleep(retry_every).await;
            }
        }
    };

    if !session.anchor(height).await {
        return None;
    }
    info!(session = session.id(), height, "Session anchored");

    Some(
        BackfillDriver::new(fetcher, session, lookback, batch_size)
            .run(height)
            .await,
    )
}
