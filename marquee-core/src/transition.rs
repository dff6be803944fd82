//! Crossfade sequencing for artwork changes.
//!
//! Every artwork change runs the same two-stage choreography on both image
//! channels: stage the previous asset in the off-screen buffer, reveal the
//! buffer to mask load latency, commit the new asset to the real element,
//! then apply the color-derived effect and fade the buffer away. The text
//! tint updates concurrently and the whole operation joins all three.

use crate::color::{ColorPair, Tint};
use crate::snapshot::PlaybackSnapshot;
use crate::store::{StateChange, StateStore};
use crate::surface::{AssetChannel, DisplaySurface};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct SequencerInner {
    /// Asset most recently accepted for display. Compared against incoming
    /// targets for the no-op check.
    displayed: Option<String>,
    /// Token for the in-flight transition, if any.
    in_flight: Option<CancellationToken>,
}

/// Drives deterministic, concurrency-safe crossfades between visual assets.
pub struct TransitionSequencer {
    store: Arc<StateStore>,
    surface: Arc<dyn DisplaySurface>,
    inner: Mutex<SequencerInner>,
    cancel_token: CancellationToken,
}

impl TransitionSequencer {
    #[must_use]
    pub fn new(
        store: Arc<StateStore>,
        surface: Arc<dyn DisplaySurface>,
        cancel_token: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            surface,
            inner: Mutex::new(SequencerInner {
                displayed: None,
                in_flight: None,
            }),
            cancel_token,
        })
    }

    /// Start listening for artwork changes in a background task.
    #[must_use]
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        let mut rx = self.store.subscribe();
        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => break,
                change = rx.recv() => match change {
                    Ok(StateChange { snapshot, changes }) => {
                        if changes.artwork {
                            self.request(&snapshot).await;
                        }
                    }
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Missed {missed} change notifications, refreshing artwork");
                        let snapshot = self.store.snapshot().await;
                        self.request(&snapshot).await;
                    }
                }
            }
        }
    }

    /// Accept an artwork target from the given snapshot, superseding any
    /// transition still in flight. Already-displayed targets are a no-op.
    pub async fn request(&self, snapshot: &PlaybackSnapshot) {
        let Some(target) = snapshot.image.clone() else {
            return;
        };
        let colors = snapshot.image_colors;

        let mut inner = self.inner.lock().await;
        if inner.displayed.as_deref() == Some(target.as_str()) {
            return;
        }
        if let Some(superseded) = inner.in_flight.take() {
            // The newest target wins; the old transition's late completions
            // must not touch the surface
            superseded.cancel();
        }
        let token = self.cancel_token.child_token();
        inner.in_flight = Some(token.clone());
        let previous = inner.displayed.replace(target.clone());
        drop(inner);

        debug!(%target, "Starting artwork transition");
        let surface = Arc::clone(&self.surface);
        tokio::spawn(run_transition(surface, previous, target, colors, token));
    }
}

async fn run_transition(
    surface: Arc<dyn DisplaySurface>,
    previous: Option<String>,
    target: String,
    colors: ColorPair,
    token: CancellationToken,
) {
    let artwork = fade_channel(
        surface.as_ref(),
        AssetChannel::Artwork,
        previous.as_deref(),
        &target,
        colors,
        &token,
    );
    let background = fade_channel(
        surface.as_ref(),
        AssetChannel::Background,
        previous.as_deref(),
        &target,
        colors,
        &token,
    );
    let tint = async {
        surface.set_text_color(colors.primary.normalized(1.0));
    };

    let (artwork, background, ()) = tokio::join!(artwork, background, tint);
    for (channel, outcome) in [
        (AssetChannel::Artwork, artwork),
        (AssetChannel::Background, background),
    ] {
        if let Err(error) = outcome {
            // Non-fatal: the channel keeps its buffer, the display degrades
            warn!(?channel, "Transition did not complete: {error}");
        }
    }
}

/// One channel's crossfade. Returns early, without touching the surface
/// further, as soon as the transition is superseded.
async fn fade_channel(
    surface: &dyn DisplaySurface,
    channel: AssetChannel,
    previous: Option<&str>,
    target: &str,
    colors: ColorPair,
    token: &CancellationToken,
) -> crate::error::Result<()> {
    tokio::select! {
        () = token.cancelled() => return Ok(()),
        staged = surface.stage_buffer(channel, previous) => staged?,
    }
    if token.is_cancelled() {
        return Ok(());
    }
    surface.reveal_buffer(channel);

    tokio::select! {
        () = token.cancelled() => return Ok(()),
        committed = surface.commit_asset(channel, target) => committed?,
    }
    if token.is_cancelled() {
        return Ok(());
    }

    match channel {
        AssetChannel::Artwork => surface.set_artwork_glow(Tint::glow(colors.secondary)),
        AssetChannel::Background => {
            surface.set_background_overlay(Tint::overlay(colors.secondary));
        }
    }
    surface.fade_buffer(channel);
    Ok(())
}
