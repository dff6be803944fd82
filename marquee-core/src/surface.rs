//! Presentation surface contract.
//!
//! The surface is owned by the embedder (a browser shell, a GUI layer, a
//! debug console). The engine writes named regions and drives the
//! double-buffered crossfade through this trait; it never owns element
//! lifetimes or rendering itself.

use crate::color::{Rgb, Tint};
use crate::error::Result;
use async_trait::async_trait;

/// The two independent double-buffered image channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetChannel {
    /// Foreground artwork element with its glow.
    Artwork,
    /// Full-bleed background element with its color overlay.
    Background,
}

/// Named text regions the engine writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRegion {
    Title,
    Artists,
    /// Combined album + release label line.
    AlbumLine,
    Context,
    Device,
}

/// Visibility of a single state badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeVisibility {
    Shown,
    /// Hidden but still occupying layout space.
    Invisible,
    /// Removed from layout entirely.
    Hidden,
}

/// Visibility of the paused/shuffle/repeat badges, plus the repeat badge's
/// "repeat one" variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeState {
    pub paused: BadgeVisibility,
    pub shuffle: BadgeVisibility,
    pub repeat: BadgeVisibility,
    /// Repeat badge renders its single-track variant.
    pub repeat_once: bool,
}

/// Rendering surface for the now-playing display.
///
/// Text and color setters are fire-and-forget. The asset operations are
/// async and resolve when the underlying load completes, mirroring an image
/// element's load event; implementations report a failed load as
/// [`CoreError::AssetLoad`](crate::CoreError::AssetLoad).
#[async_trait]
pub trait DisplaySurface: Send + Sync {
    fn set_text(&self, region: TextRegion, text: &str);

    fn set_badges(&self, badges: BadgeState);

    /// Elapsed and total time texts, pre-formatted.
    fn set_times(&self, current: &str, total: &str);

    /// Progress-fill fraction in `0.0..=1.0`.
    fn set_progress_ratio(&self, ratio: f64);

    /// One-line summary shown in window title bars or task switchers.
    fn set_status_line(&self, status: &str);

    /// Show or hide the whole presentation.
    fn set_visible(&self, visible: bool);

    fn set_text_color(&self, color: Rgb);

    fn set_artwork_glow(&self, glow: Tint);

    fn set_background_overlay(&self, overlay: Tint);

    /// Stage an asset into the channel's off-screen crossfade buffer;
    /// `None` stages a transparent placeholder. Resolves when the buffer
    /// content is ready to show.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AssetLoad`](crate::CoreError::AssetLoad) when
    /// the asset cannot be loaded.
    async fn stage_buffer(&self, channel: AssetChannel, asset: Option<&str>) -> Result<()>;

    /// Make the staged buffer visible immediately, without a transition.
    fn reveal_buffer(&self, channel: AssetChannel);

    /// Load an asset into the channel's final on-screen element. Resolves
    /// when the element has finished loading it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AssetLoad`](crate::CoreError::AssetLoad) when
    /// the asset cannot be loaded.
    async fn commit_asset(&self, channel: AssetChannel, asset: &str) -> Result<()>;

    /// Fade the crossfade buffer out, revealing the committed asset.
    fn fade_buffer(&self, channel: AssetChannel);
}
