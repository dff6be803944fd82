//! Local playback-progress extrapolation between server updates.
//!
//! The extrapolator owns the periodic display tick and the idle watchdog.
//! Between authoritative updates it advances a time cursor using the
//! monotonic clock, clamped at the track length, and asks the stream client
//! to resynchronize when the track end is reached.

use crate::snapshot::PlaybackSnapshot;
use crate::store::{StateChange, StateStore};
use crate::surface::DisplaySurface;
use crate::text::render_progress;
use crate::timefmt::DurationExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A request for the stream client to refresh state out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncRequest {
    /// Fetch the full snapshot rather than the incremental one.
    pub full: bool,
    /// Wait this long before fetching.
    pub delay: Duration,
}

impl ResyncRequest {
    /// Immediate full refresh: the push channel can no longer be trusted.
    #[must_use]
    pub const fn full_now() -> Self {
        Self {
            full: true,
            delay: Duration::ZERO,
        }
    }
}

/// The extrapolation anchor: a snapshot time plus the monotonic instant it
/// was observed at.
struct Cursor {
    reference_ms: u64,
    anchored_at: Instant,
}

/// Tunables for the extrapolator, all defaulted in
/// [`ProgressConfig`](crate::config::ProgressConfig).
struct Timings {
    tick_interval: Duration,
    idle_timeout: Duration,
    track_end_refetch_delay: Duration,
    max_post_end_refetches: u32,
}

/// Advances the displayed play position between merges and watches for the
/// display going idle.
pub struct ProgressExtrapolator {
    store: Arc<StateStore>,
    surface: Arc<dyn DisplaySurface>,
    resync_tx: mpsc::Sender<ResyncRequest>,
    timings: Timings,
    status_fallback: String,
    cancel_token: CancellationToken,
}

// Stand-in deadline while the idle watchdog is unarmed
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

impl ProgressExtrapolator {
    pub fn new(
        store: Arc<StateStore>,
        surface: Arc<dyn DisplaySurface>,
        resync_tx: mpsc::Sender<ResyncRequest>,
        config: &crate::config::ProgressConfig,
        status_fallback: String,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            store,
            surface,
            resync_tx,
            timings: Timings {
                tick_interval: config.tick_interval(),
                idle_timeout: config.idle_timeout(),
                track_end_refetch_delay: config.track_end_refetch_delay(),
                max_post_end_refetches: config.max_post_end_refetches,
            },
            status_fallback,
            cancel_token,
        }
    }

    /// Start the tick loop in a background task.
    #[must_use]
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        let mut rx = self.store.subscribe();
        let mut snapshot = PlaybackSnapshot::default();
        let mut cursor: Option<Cursor> = None;
        let mut post_end_ticks: u32 = 0;
        let mut ticking = false;
        let mut idle_deadline: Option<Instant> = None;
        let mut tick = tokio::time::interval(self.timings.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let idle_at = idle_deadline.unwrap_or_else(|| Instant::now() + FAR_FUTURE);
            tokio::select! {
                () = self.cancel_token.cancelled() => break,
                change = rx.recv() => match change {
                    Ok(StateChange { snapshot: merged, changes }) => {
                        snapshot = merged;
                        let now = Instant::now();
                        if changes.anchor || cursor.is_none() {
                            cursor = Some(Cursor {
                                reference_ms: snapshot.time_current_ms,
                                anchored_at: now,
                            });
                            post_end_ticks = 0;
                        } else if let Some(cursor) = cursor.as_mut() {
                            // No progress keys in this event: keep the locally
                            // advanced reference, renew the wall-clock anchor
                            cursor.anchored_at = now;
                        }
                        ticking = true;
                        tick.reset();
                        idle_deadline = Some(now + self.timings.idle_timeout);
                        self.surface.set_visible(true);
                    }
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Missed {missed} change notifications, re-reading store");
                        snapshot = self.store.snapshot().await;
                        cursor = Some(Cursor {
                            reference_ms: snapshot.time_current_ms,
                            anchored_at: Instant::now(),
                        });
                        post_end_ticks = 0;
                    }
                },
                _ = tick.tick(), if ticking => {
                    self.advance(&mut snapshot, &mut cursor, &mut post_end_ticks).await;
                }
                () = tokio::time::sleep_until(idle_at), if idle_deadline.is_some() => {
                    info!("No updates for {:?}, hiding the display", self.timings.idle_timeout);
                    self.store.enter_idle().await;
                    self.surface.set_visible(false);
                    snapshot = PlaybackSnapshot::default();
                    cursor = None;
                    post_end_ticks = 0;
                    ticking = false;
                    idle_deadline = None;
                }
            }
        }
    }

    async fn advance(
        &self,
        snapshot: &mut PlaybackSnapshot,
        cursor: &mut Option<Cursor>,
        post_end_ticks: &mut u32,
    ) {
        if snapshot.paused {
            *post_end_ticks = 0;
            return;
        }
        let total = snapshot.time_total_ms;
        if total == 0 {
            // No track length known yet, nothing to extrapolate
            return;
        }
        let Some(cursor) = cursor.as_mut() else {
            return;
        };

        let now = Instant::now();
        let elapsed = now.duration_since(cursor.anchored_at).as_millis_u64();
        let projected = cursor.reference_ms.saturating_add(elapsed);
        cursor.anchored_at = now;

        if projected >= total {
            *post_end_ticks += 1;
            if *post_end_ticks > self.timings.max_post_end_refetches {
                // The push channel should have announced the next track by
                // now; assume it is stalled and refetch everything
                debug!("Track end passed {post_end_ticks} ticks ago, forcing full resync");
                self.request_resync(ResyncRequest::full_now()).await;
            } else if cursor.reference_ms < total {
                // First tick across the boundary: the next track is one
                // short fetch away
                self.request_resync(ResyncRequest {
                    full: false,
                    delay: self.timings.track_end_refetch_delay,
                })
                .await;
            }
            cursor.reference_ms = total;
        } else {
            *post_end_ticks = 0;
            cursor.reference_ms = projected;
        }

        // Local display copy only; the canonical snapshot is the store's
        snapshot.time_current_ms = cursor.reference_ms;
        render_progress(
            self.surface.as_ref(),
            snapshot,
            cursor.reference_ms,
            &self.status_fallback,
        );
    }

    async fn request_resync(&self, request: ResyncRequest) {
        if self.resync_tx.send(request).await.is_err() {
            warn!("Resync channel closed, dropping request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProgressConfig;
    use crate::snapshot::{EventKind, UpdateEvent};
    use crate::testing::{RecordingSurface, SurfaceCall};

    struct Fixture {
        store: Arc<StateStore>,
        surface: Arc<RecordingSurface>,
        resync_rx: mpsc::Receiver<ResyncRequest>,
        cancel_token: CancellationToken,
    }

    async fn fixture() -> Fixture {
        let store = StateStore::new("img/idle.png".to_string());
        let surface = RecordingSurface::new();
        let (resync_tx, resync_rx) = mpsc::channel(16);
        let cancel_token = CancellationToken::new();
        let extrapolator = Arc::new(ProgressExtrapolator::new(
            Arc::clone(&store),
            surface.clone(),
            resync_tx,
            &ProgressConfig::default(),
            "Now Playing".to_string(),
            cancel_token.clone(),
        ));
        let _handle = extrapolator.start();
        tokio::task::yield_now().await;
        Fixture {
            store,
            surface,
            resync_rx,
            cancel_token,
        }
    }

    fn progress_event(current: u64, total: u64) -> UpdateEvent {
        UpdateEvent {
            kind: EventKind::Data,
            time_current: Some(current),
            time_total: Some(total),
            paused: Some(false),
            ..UpdateEvent::default()
        }
    }

    fn ratios(calls: &[SurfaceCall]) -> Vec<f64> {
        calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Ratio(ratio) => Some(*ratio),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_is_monotonic_and_rendered() {
        let mut fx = fixture().await;
        fx.store.apply(progress_event(1_000, 600_000)).await;
        tokio::time::sleep(Duration::from_millis(1_600)).await;

        let calls = fx.surface.calls();
        assert!(calls.contains(&SurfaceCall::Visible(true)));
        let ratios = ratios(&calls);
        assert_eq!(ratios.len(), 3);
        assert!(ratios.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(fx.resync_rx.try_recv().is_err());
        fx.cancel_token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_track_end_schedules_single_light_resync_and_clamps() {
        let mut fx = fixture().await;
        fx.store.apply(progress_event(59_900, 60_000)).await;
        tokio::time::sleep(Duration::from_millis(600)).await;

        let request = fx.resync_rx.try_recv().unwrap();
        assert_eq!(
            request,
            ResyncRequest {
                full: false,
                delay: Duration::from_millis(200),
            }
        );
        assert!(fx.resync_rx.try_recv().is_err());

        // Displayed time clamps to the total instead of overshooting
        let calls = fx.surface.calls();
        assert!(calls.contains(&SurfaceCall::Times("1:00".to_string(), "1:00".to_string())));
        let ratios = ratios(&calls);
        assert!((ratios.last().unwrap() - 1.0).abs() < 1e-9);
        fx.cancel_token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_end_backoff_forces_full_resync_on_fifth_tick() {
        let mut fx = fixture().await;
        fx.store.apply(progress_event(59_900, 60_000)).await;

        // First boundary tick: one light request
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!fx.resync_rx.try_recv().unwrap().full);

        // Ticks two through four: silence
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(fx.resync_rx.try_recv().is_err());

        // Fifth post-end tick crosses the threshold
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fx.resync_rx.try_recv().unwrap(), ResyncRequest::full_now());
        fx.cancel_token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_merge_resets_post_end_counter() {
        let mut fx = fixture().await;
        fx.store.apply(progress_event(59_900, 60_000)).await;
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        let _light = fx.resync_rx.try_recv().unwrap();

        // A fresh track arrives before the threshold is crossed
        fx.store.apply(progress_event(0, 180_000)).await;
        tokio::time::sleep(Duration::from_millis(2_600)).await;
        assert!(fx.resync_rx.try_recv().is_err());
        fx.cancel_token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_does_not_advance() {
        let mut fx = fixture().await;
        fx.store
            .apply(UpdateEvent {
                kind: EventKind::Data,
                time_current: Some(30_000),
                time_total: Some(60_000),
                paused: Some(true),
                ..UpdateEvent::default()
            })
            .await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(ratios(&fx.surface.calls()).is_empty());
        assert!(fx.resync_rx.try_recv().is_err());
        fx.cancel_token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_remerge_resets_anchor_backwards() {
        let fx = fixture().await;
        fx.store.apply(progress_event(10_000, 60_000)).await;
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        let before = *ratios(&fx.surface.calls()).last().unwrap();

        // Re-applying the same event must re-anchor even though no value
        // changed: key presence is the trigger
        fx.store.apply(progress_event(10_000, 60_000)).await;
        tokio::time::sleep(Duration::from_millis(600)).await;

        let after = *ratios(&fx.surface.calls()).last().unwrap();
        assert!(after < before);
        fx.cancel_token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_progress_merge_renews_wall_anchor_only() {
        let fx = fixture().await;
        fx.store.apply(progress_event(10_000, 60_000)).await;

        // A text-only update a quarter second in renews the wall anchor,
        // discarding the elapsed fraction but keeping the reference time
        tokio::time::sleep(Duration::from_millis(250)).await;
        fx.store
            .apply(UpdateEvent {
                kind: EventKind::Data,
                title: Some("Renamed".into()),
                ..UpdateEvent::default()
            })
            .await;
        tokio::time::sleep(Duration::from_millis(600)).await;

        let last = *ratios(&fx.surface.calls()).last().unwrap();
        // 10_000 + 500 elapsed since renewal, over 60_000
        assert!((last - 10_500.0 / 60_000.0).abs() < 1e-6);
        fx.cancel_token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_watchdog_clears_and_hides() {
        let fx = fixture().await;
        fx.store.apply(progress_event(1_000, 60_000)).await;
        tokio::time::sleep(Duration::from_secs(3601)).await;

        assert!(fx.store.is_idle().await);
        let calls = fx.surface.calls();
        assert!(calls.contains(&SurfaceCall::Visible(false)));

        // The tick loop is stopped: no further renders accumulate
        let rendered = ratios(&calls).len();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ratios(&fx.surface.calls()).len(), rendered);

        // A merge wakes the display back up
        fx.store.apply(progress_event(0, 30_000)).await;
        tokio::task::yield_now().await;
        assert!(!fx.store.is_idle().await);
        assert_eq!(*fx.surface.calls().last().unwrap(), SurfaceCall::Visible(true));
        fx.cancel_token.cancel();
    }
}
