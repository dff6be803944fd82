//! Textual region rendering: titles, artist credits, badges, progress text.

use crate::snapshot::{PlaybackSnapshot, RepeatMode};
use crate::store::{ChangeSet, StateChange, StateStore};
use crate::surface::{BadgeState, BadgeVisibility, DisplaySurface, TextRegion};
use crate::timefmt::{format_time_pair, progress_ratio};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Strip featured-artist credits from a title: any `(feat.…)` or `[feat.…]`
/// group is removed and the result trimmed. The credit is rendered with the
/// artist line instead.
#[must_use]
pub fn strip_featured_credit(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut rest = title;
    while let Some(open) = rest.find(['(', '[']) {
        let after = &rest[open + 1..];
        if after.starts_with("feat") {
            if let Some(close) = after.find([')', ']']) {
                out.push_str(&rest[..open]);
                rest = &after[close + 1..];
                continue;
            }
        }
        out.push_str(&rest[..=open]);
        rest = &rest[open + 1..];
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Primary artist, with any featured artists folded into a `(feat. …)`
/// suffix joined by `&`.
#[must_use]
pub fn artist_line(artists: &[String]) -> String {
    match artists.split_first() {
        None => String::new(),
        Some((primary, [])) => primary.clone(),
        Some((primary, featured)) => {
            format!("{primary} (feat. {})", featured.join(" & "))
        }
    }
}

/// Album plus parenthesized release label, or the album alone when the
/// release label is empty.
#[must_use]
pub fn album_line(album: &str, release: &str) -> String {
    if release.is_empty() {
        album.to_string()
    } else {
        format!("{album} ({release})")
    }
}

/// Badge visibility for the current snapshot. Hidden badges keep their
/// layout space while paused so the paused badge does not shift its
/// neighbors.
#[must_use]
pub fn badge_state(snapshot: &PlaybackSnapshot) -> BadgeState {
    let hidden = if snapshot.paused {
        BadgeVisibility::Invisible
    } else {
        BadgeVisibility::Hidden
    };
    let shown_if = |condition: bool| if condition { BadgeVisibility::Shown } else { hidden };
    BadgeState {
        paused: shown_if(snapshot.paused),
        shuffle: shown_if(snapshot.shuffle),
        repeat: shown_if(snapshot.repeat != RepeatMode::Off),
        repeat_once: snapshot.repeat == RepeatMode::Track,
    }
}

/// One-line `[elapsed / total] artist - title` summary, or the fallback
/// when no track is known.
#[must_use]
pub fn status_line(
    snapshot: &PlaybackSnapshot,
    current: &str,
    total: &str,
    fallback: &str,
) -> String {
    match snapshot.artists.first() {
        Some(artist) if !snapshot.title.is_empty() => {
            format!(
                "[{current} / {total}] {artist} - {}",
                strip_featured_credit(&snapshot.title)
            )
        }
        _ => fallback.to_string(),
    }
}

/// Write the time texts, fill ratio and status line for the given elapsed
/// time. Shared by the merge path here and the extrapolator's tick path.
pub(crate) fn render_progress(
    surface: &dyn DisplaySurface,
    snapshot: &PlaybackSnapshot,
    current_ms: u64,
    fallback: &str,
) {
    let (current, total) = format_time_pair(current_ms, snapshot.time_total_ms);
    surface.set_times(&current, &total);
    surface.set_progress_ratio(progress_ratio(current_ms, snapshot.time_total_ms));
    surface.set_status_line(&status_line(snapshot, &current, &total, fallback));
}

/// Renders the textual regions of the display on every merge whose field
/// groups call for it.
pub struct TextPresenter {
    store: Arc<StateStore>,
    surface: Arc<dyn DisplaySurface>,
    status_fallback: String,
    cancel_token: CancellationToken,
}

impl TextPresenter {
    pub fn new(
        store: Arc<StateStore>,
        surface: Arc<dyn DisplaySurface>,
        status_fallback: String,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            store,
            surface,
            status_fallback,
            cancel_token,
        }
    }

    /// Start rendering in a background task.
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
                    Ok(StateChange { snapshot, changes }) => self.render(&snapshot, changes),
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(missed)) => {
                        // Catch up by re-rendering everything from the store
                        warn!("Missed {missed} change notifications");
                        let snapshot = self.store.snapshot().await;
                        self.render(&snapshot, ChangeSet::all());
                    }
                }
            }
        }
    }

    fn render(&self, snapshot: &PlaybackSnapshot, changes: ChangeSet) {
        if changes.title {
            self.surface
                .set_text(TextRegion::Title, &strip_featured_credit(&snapshot.title));
        }
        if changes.artists {
            self.surface
                .set_text(TextRegion::Artists, &artist_line(&snapshot.artists));
        }
        if changes.album_line {
            self.surface.set_text(
                TextRegion::AlbumLine,
                &album_line(&snapshot.album, &snapshot.release),
            );
        }
        if changes.context {
            self.surface.set_text(TextRegion::Context, &snapshot.context);
        }
        if changes.device {
            self.surface.set_text(TextRegion::Device, &snapshot.device);
        }
        if changes.badges {
            self.surface.set_badges(badge_state(snapshot));
        }
        if changes.progress {
            render_progress(
                self.surface.as_ref(),
                snapshot,
                snapshot.time_current_ms,
                &self.status_fallback,
            );
        }
    }
}
