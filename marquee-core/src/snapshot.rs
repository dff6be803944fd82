//! Canonical playback state and the partial update payloads that feed it.

use crate::color::ColorPair;
use serde::Deserialize;

/// Repeat mode reported by the media source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    Context,
    Track,
}

/// The last-known playback state, owned by the [`StateStore`](crate::StateStore).
///
/// Fields are replaced one at a time as sparse updates arrive; the struct is
/// only ever reset wholesale when the display goes idle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackSnapshot {
    pub title: String,
    /// Primary artist first, featured artists after.
    pub artists: Vec<String>,
    pub album: String,
    /// Release label, e.g. a year. May be empty.
    pub release: String,
    /// Playback context label (playlist, album, radio, ...).
    pub context: String,
    /// Name of the device playback is happening on.
    pub device: String,
    pub time_current_ms: u64,
    pub time_total_ms: u64,
    pub paused: bool,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    /// Opaque artwork asset reference (usually a URL).
    pub image: Option<String>,
    pub image_colors: ColorPair,
}

/// Discriminant of a push or fetch payload. Only `Data` frames are merged;
/// anything else is ignored by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Data,
    #[default]
    #[serde(other)]
    Other,
}

/// A partial, diff-style description of playback state changes.
///
/// Every field is optional: absent fields leave the corresponding snapshot
/// field untouched. Key presence, not value inequality, is what downstream
/// consumers key their updates off.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvent {
    #[serde(rename = "type", default)]
    pub kind: EventKind,
    pub title: Option<String>,
    pub artists: Option<Vec<String>>,
    pub album: Option<String>,
    pub release: Option<String>,
    pub context: Option<String>,
    pub device: Option<String>,
    pub time_current: Option<u64>,
    pub time_total: Option<u64>,
    pub paused: Option<bool>,
    pub shuffle: Option<bool>,
    pub repeat: Option<RepeatMode>,
    pub image: Option<String>,
    pub image_colors: Option<ColorPair>,
}

/// Sentinel image value meaning "the source has no artwork".
pub const BLANK_IMAGE: &str = "BLANK";
