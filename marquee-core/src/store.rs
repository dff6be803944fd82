//! Canonical state store and the reconciler that merges updates into it.

use crate::color::ColorPair;
use crate::snapshot::{EventKind, PlaybackSnapshot, UpdateEvent, BLANK_IMAGE};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Semantic field groups touched by a merge, derived from which keys were
/// present in the update payload. Presence is the signal: a field set to the
/// value it already holds still marks its group.
#[allow(clippy::struct_excessive_bools)] // one presence flag per field group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub title: bool,
    pub artists: bool,
    /// Album or release label: both render into the same line.
    pub album_line: bool,
    pub context: bool,
    pub device: bool,
    /// Paused, shuffle or repeat: the state badges re-render together.
    pub badges: bool,
    /// Elapsed or total time: the time texts and fill ratio re-render.
    pub progress: bool,
    /// Elapsed, total or paused: the extrapolation cursor re-anchors from
    /// the snapshot.
    pub anchor: bool,
    /// Image or its derived colors: a crossfade may be due.
    pub artwork: bool,
}

impl ChangeSet {
    /// Every group marked changed. Used to re-render from scratch after a
    /// consumer falls behind the notification channel.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            title: true,
            artists: true,
            album_line: true,
            context: true,
            device: true,
            badges: true,
            progress: true,
            anchor: true,
            artwork: true,
        }
    }

    fn from_event(event: &UpdateEvent) -> Self {
        Self {
            title: event.title.is_some(),
            artists: event.artists.is_some(),
            album_line: event.album.is_some() || event.release.is_some(),
            context: event.context.is_some(),
            device: event.device.is_some(),
            badges: event.paused.is_some() || event.shuffle.is_some() || event.repeat.is_some(),
            progress: event.time_current.is_some() || event.time_total.is_some(),
            anchor: event.time_current.is_some()
                || event.time_total.is_some()
                || event.paused.is_some(),
            artwork: event.image.is_some() || event.image_colors.is_some(),
        }
    }
}

/// Broadcast to all consumers after every merged DATA event.
///
/// Carries the fully merged snapshot so no consumer can observe a partially
/// applied update.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub snapshot: PlaybackSnapshot,
    pub changes: ChangeSet,
}

struct StoreInner {
    snapshot: PlaybackSnapshot,
    idle: bool,
}

/// Holds the canonical [`PlaybackSnapshot`]; the sole writer is the merge
/// path here. Consumers subscribe for change notifications or read the
/// snapshot directly.
pub struct StateStore {
    inner: RwLock<StoreInner>,
    change_tx: broadcast::Sender<StateChange>,
    /// Asset shown in place of artwork when the source reports none.
    idle_image: String,
}

impl StateStore {
    /// Create a new store. `idle_image` is the placeholder asset substituted
    /// for the `BLANK` artwork sentinel.
    #[must_use]
    pub fn new(idle_image: String) -> Arc<Self> {
        let (change_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            inner: RwLock::new(StoreInner {
                snapshot: PlaybackSnapshot::default(),
                idle: false,
            }),
            change_tx,
            idle_image,
        })
    }

    /// Subscribe to merge notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.change_tx.subscribe()
    }

    /// Merge a partial update into the snapshot and notify consumers.
    ///
    /// Non-DATA events are ignored. Fields absent from the event are left
    /// untouched; fields present overwrite unconditionally. Any merge clears
    /// the idle state. Returns whether the event was merged.
    pub async fn apply(&self, mut event: UpdateEvent) -> bool {
        if event.kind != EventKind::Data {
            return false;
        }

        // A source with no artwork reports the BLANK sentinel; swap in the
        // idle placeholder with neutral colors before merging.
        if event.image.as_deref() == Some(BLANK_IMAGE) {
            event.image = Some(self.idle_image.clone());
            event.image_colors = Some(ColorPair::WHITE);
        }

        let changes = ChangeSet::from_event(&event);
        let mut inner = self.inner.write().await;
        merge(&mut inner.snapshot, event);
        inner.idle = false;
        let change = StateChange {
            snapshot: inner.snapshot.clone(),
            changes,
        };
        drop(inner);

        debug!(?changes, "Merged update event");
        let _ = self.change_tx.send(change);
        true
    }

    /// Wipe the snapshot and mark the store idle. Called by the idle
    /// watchdog after prolonged silence; the next merge clears the flag.
    pub async fn enter_idle(&self) {
        let mut inner = self.inner.write().await;
        inner.snapshot = PlaybackSnapshot::default();
        inner.idle = true;
    }

    /// Whether the store has been idle-wiped since the last merge. An idle
    /// store must be refreshed with a full snapshot, not a differential push.
    pub async fn is_idle(&self) -> bool {
        self.inner.read().await.idle
    }

    /// Current snapshot, cloned.
    pub async fn snapshot(&self) -> PlaybackSnapshot {
        self.inner.read().await.snapshot.clone()
    }
}

fn merge(snapshot: &mut PlaybackSnapshot, event: UpdateEvent) {
    if let Some(title) = event.title {
        snapshot.title = title;
    }
    if let Some(artists) = event.artists {
        snapshot.artists = artists;
    }
    if let Some(album) = event.album {
        snapshot.album = album;
    }
    if let Some(release) = event.release {
        snapshot.release = release;
    }
    if let Some(context) = event.context {
        snapshot.context = context;
    }
    if let Some(device) = event.device {
        snapshot.device = device;
    }
    if let Some(time_current) = event.time_current {
        snapshot.time_current_ms = time_current;
    }
    if let Some(time_total) = event.time_total {
        snapshot.time_total_ms = time_total;
    }
    if let Some(paused) = event.paused {
        snapshot.paused = paused;
    }
    if let Some(shuffle) = event.shuffle {
        snapshot.shuffle = shuffle;
    }
    if let Some(repeat) = event.repeat {
        snapshot.repeat = repeat;
    }
    if let Some(image) = event.image {
        snapshot.image = Some(image);
    }
    if let Some(colors) = event.image_colors {
        snapshot.image_colors = colors;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    fn data_event() -> UpdateEvent {
        UpdateEvent {
            kind: EventKind::Data,
            ..UpdateEvent::default()
        }
    }

    fn store() -> Arc<StateStore> {
        StateStore::new("img/idle.png".to_string())
    }

    #[tokio::test]
    async fn test_merge_is_sparse() {
        let store = store();
        store
            .apply(UpdateEvent {
                title: Some("First".into()),
                artists: Some(vec!["Artist".into()]),
                time_total: Some(120_000),
                ..data_event()
            })
            .await;

        store
            .apply(UpdateEvent {
                title: Some("Second".into()),
                ..data_event()
            })
            .await;

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.title, "Second");
        assert_eq!(snapshot.artists, vec!["Artist".to_string()]);
        assert_eq!(snapshot.time_total_ms, 120_000);
    }

    #[tokio::test]
    async fn test_non_data_event_is_ignored() {
        let store = store();
        let mut rx = store.subscribe();
        let merged = store
            .apply(UpdateEvent {
                kind: EventKind::Other,
                title: Some("Ignored".into()),
                ..UpdateEvent::default()
            })
            .await;

        assert!(!merged);
        assert!(store.snapshot().await.title.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remerge_notifies_both_times() {
        let store = store();
        let mut rx = store.subscribe();
        let event = UpdateEvent {
            title: Some("Same".into()),
            ..data_event()
        };

        store.apply(event.clone()).await;
        let first = rx.recv().await.unwrap();
        store.apply(event).await;
        let second = rx.recv().await.unwrap();

        // Identical payloads still notify: key presence, not value change,
        // is the signal downstream consumers re-anchor on.
        assert_eq!(first.snapshot, second.snapshot);
        assert!(first.changes.title && second.changes.title);
    }

    #[tokio::test]
    async fn test_change_set_groups() {
        let store = store();
        let mut rx = store.subscribe();
        store
            .apply(UpdateEvent {
                release: Some("2020".into()),
                paused: Some(true),
                time_current: Some(1000),
                ..data_event()
            })
            .await;

        let change = rx.recv().await.unwrap();
        assert!(change.changes.album_line);
        assert!(change.changes.badges);
        assert!(change.changes.progress);
        assert!(change.changes.anchor);
        assert!(!change.changes.title);
        assert!(!change.changes.artwork);
    }

    #[tokio::test]
    async fn test_paused_alone_anchors_without_progress() {
        let store = store();
        let mut rx = store.subscribe();
        store
            .apply(UpdateEvent {
                paused: Some(false),
                ..data_event()
            })
            .await;

        let change = rx.recv().await.unwrap();
        assert!(change.changes.anchor);
        assert!(!change.changes.progress);
    }

    #[tokio::test]
    async fn test_blank_image_normalized_to_placeholder() {
        let store = store();
        store
            .apply(UpdateEvent {
                image: Some(BLANK_IMAGE.into()),
                image_colors: Some(ColorPair {
                    primary: Rgb { r: 10, g: 20, b: 30 },
                    secondary: Rgb { r: 40, g: 50, b: 60 },
                }),
                ..data_event()
            })
            .await;

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.image.as_deref(), Some("img/idle.png"));
        assert_eq!(snapshot.image_colors, ColorPair::WHITE);
    }

    #[tokio::test]
    async fn test_idle_wipes_snapshot_and_merge_clears_idle() {
        let store = store();
        store
            .apply(UpdateEvent {
                title: Some("Song".into()),
                ..data_event()
            })
            .await;

        store.enter_idle().await;
        assert!(store.is_idle().await);
        assert_eq!(store.snapshot().await, PlaybackSnapshot::default());

        store
            .apply(UpdateEvent {
                title: Some("Back".into()),
                ..data_event()
            })
            .await;
        assert!(!store.is_idle().await);
        assert_eq!(store.snapshot().await.title, "Back");
    }
}
