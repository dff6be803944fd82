//! Push-channel client: connection lifecycle, staleness detection and
//! silent self-healing.
//!
//! Everything here recovers by retrying after one fixed delay, forever.
//! There is no backoff and no retry cap: the client drives an unattended
//! display and the only acceptable steady state is "trying again soon".

use crate::error::StreamError;
use crate::sse::PushFrame;
use crate::transport::{PushStream, PushTransport, SnapshotApi};
use futures::StreamExt;
use marquee_core::{DurationExt, ResyncRequest, StateStore, StreamConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle of the push subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Heartbeats stopped while the channel still looked open. Only ever
    /// entered from `Connected`, and always leaves through `Disconnected`.
    Stale,
}

/// Why a served connection ended.
enum CycleEnd {
    Stale,
    Decode(StreamError),
    Transport(StreamError),
    Closed,
    Cancelled,
}

/// Maintains a live feed of update events into the state store.
pub struct StreamClient {
    push: Arc<dyn PushTransport>,
    snapshots: Arc<dyn SnapshotApi>,
    store: Arc<StateStore>,
    heartbeat_timeout: Duration,
    retry_delay: Duration,
    state_tx: watch::Sender<ConnectionState>,
    transitions_tx: broadcast::Sender<ConnectionState>,
    /// Token of the one snapshot fetch allowed in flight; a newly scheduled
    /// fetch cancels it.
    pending_fetch: Mutex<Option<CancellationToken>>,
    cancel_token: CancellationToken,
}

impl StreamClient {
    #[must_use]
    pub fn new(
        push: Arc<dyn PushTransport>,
        snapshots: Arc<dyn SnapshotApi>,
        store: Arc<StateStore>,
        config: &StreamConfig,
        cancel_token: CancellationToken,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (transitions_tx, _) = broadcast::channel(32);
        Arc::new(Self {
            push,
            snapshots,
            store,
            heartbeat_timeout: config.heartbeat_timeout(),
            retry_delay: config.retry_delay(),
            state_tx,
            transitions_tx,
            pending_fetch: Mutex::new(None),
            cancel_token,
        })
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Subscribe to connection state transitions.
    pub fn transitions(&self) -> broadcast::Receiver<ConnectionState> {
        self.transitions_tx.subscribe()
    }

    /// Start the connection loop and the resync command servicer.
    #[must_use]
    pub fn start(
        self: Arc<Self>,
        resync_rx: mpsc::Receiver<ResyncRequest>,
    ) -> tokio::task::JoinHandle<()> {
        let servicer = Arc::clone(&self);
        tokio::spawn(async move {
            servicer.resync_loop(resync_rx).await;
        });
        tokio::spawn(async move {
            self.connection_loop().await;
        })
    }

    async fn connection_loop(self: Arc<Self>) {
        // Bootstrap with a full snapshot so something renders before the
        // subscription settles
        self.schedule_fetch(true, Duration::ZERO).await;

        loop {
            if self.cancel_token.is_cancelled() {
                break;
            }
            self.set_state(ConnectionState::Connecting);
            match self.push.open().await {
                Ok(stream) => match self.serve(stream).await {
                    CycleEnd::Cancelled => break,
                    CycleEnd::Stale => {
                        let stale = StreamError::Stale {
                            timeout_ms: self.heartbeat_timeout.as_millis_u64(),
                        };
                        warn!("{stale}, restarting the channel");
                        self.set_state(ConnectionState::Stale);
                        self.schedule_fetch(true, Duration::ZERO).await;
                    }
                    CycleEnd::Decode(error) => {
                        warn!("Push payload no longer decodes ({error}), refetching state");
                        self.schedule_fetch(true, Duration::ZERO).await;
                    }
                    CycleEnd::Transport(error) => warn!("Push channel dropped: {error}"),
                    CycleEnd::Closed => warn!("Push channel closed by server"),
                },
                Err(error) => warn!("Failed to open push channel: {error}"),
            }
            self.set_state(ConnectionState::Disconnected);

            tokio::select! {
                () = self.cancel_token.cancelled() => break,
                () = tokio::time::sleep(self.retry_delay) => {}
            }
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Pump frames off an open subscription until it goes quiet, errors, or
    /// is cancelled.
    async fn serve(self: &Arc<Self>, mut stream: PushStream) -> CycleEnd {
        self.set_state(ConnectionState::Connected);
        info!("Push channel connected");
        loop {
            // Every frame, heartbeat or data, re-arms the watchdog
            let deadline = Instant::now() + self.heartbeat_timeout;
            tokio::select! {
                () = self.cancel_token.cancelled() => return CycleEnd::Cancelled,
                () = tokio::time::sleep_until(deadline) => return CycleEnd::Stale,
                frame = stream.next() => match frame {
                    None => return CycleEnd::Closed,
                    Some(Err(error)) if error.is_decode() => return CycleEnd::Decode(error),
                    Some(Err(error)) => return CycleEnd::Transport(error),
                    Some(Ok(PushFrame::Heartbeat)) => {}
                    Some(Ok(PushFrame::Event(event))) => {
                        if self.store.is_idle().await {
                            // A display waking from idle must not trust a
                            // differential push
                            debug!("Update while idle, forcing a full fetch");
                            self.schedule_fetch(true, Duration::ZERO).await;
                        } else {
                            self.store.apply(event).await;
                        }
                    }
                }
            }
        }
    }

    async fn resync_loop(self: Arc<Self>, mut resync_rx: mpsc::Receiver<ResyncRequest>) {
        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => break,
                request = resync_rx.recv() => match request {
                    Some(ResyncRequest { full, delay }) => self.schedule_fetch(full, delay).await,
                    None => break,
                }
            }
        }
    }

    /// Schedule a one-shot snapshot fetch. The newest scheduled fetch wins:
    /// a fetch still waiting out its delay or retrying is cancelled.
    async fn schedule_fetch(self: &Arc<Self>, full: bool, delay: Duration) {
        let token = {
            let mut pending = self.pending_fetch.lock().await;
            if let Some(previous) = pending.take() {
                previous.cancel();
            }
            let token = self.cancel_token.child_token();
            *pending = Some(token.clone());
            token
        };
        let client = Arc::clone(self);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::select! {
                    () = token.cancelled() => return,
                    () = tokio::time::sleep(delay) => {}
                }
            }
            client.fetch_with_retry(full, &token).await;
        });
    }

    /// Fetch a snapshot and merge it, retrying after the fixed delay for as
    /// long as it takes, unless superseded.
    async fn fetch_with_retry(&self, full: bool, token: &CancellationToken) {
        loop {
            tokio::select! {
                () = token.cancelled() => return,
                fetched = self.snapshots.fetch(full) => match fetched {
                    Ok(event) => {
                        debug!(full, "Snapshot fetched");
                        self.store.apply(event).await;
                        return;
                    }
                    Err(error) => warn!(
                        "Snapshot fetch failed: {error}, retrying in {:?}",
                        self.retry_delay
                    ),
                }
            }
            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(self.retry_delay) => {}
            }
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state_tx.send_replace(next);
        if previous != next {
            debug!(?previous, ?next, "Connection state changed");
            let _ = self.transitions_tx.send(next);
        }
    }
}
