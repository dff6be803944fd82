//! Test doubles shared by the unit tests in this crate.

use crate::color::{Rgb, Tint};
use crate::error::{CoreError, Result};
use crate::surface::{AssetChannel, BadgeState, DisplaySurface, TextRegion};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded call against the [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Text(TextRegion, String),
    Badges(BadgeState),
    Times(String, String),
    Ratio(f64),
    Status(String),
    Visible(bool),
    TextColor(Rgb),
    Glow(Tint),
    Overlay(Tint),
    StageBuffer(AssetChannel, Option<String>),
    RevealBuffer(AssetChannel),
    CommitAsset(AssetChannel, String),
    FadeBuffer(AssetChannel),
}

/// A surface that records every call. Asset loads optionally take virtual
/// time and can be scripted to fail.
#[derive(Default)]
pub struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
    failing: Mutex<HashSet<String>>,
    load_delay: Mutex<Duration>,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn take_calls(&self) -> Vec<SurfaceCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    /// Make subsequent loads of `asset` fail.
    pub fn fail_asset(&self, asset: &str) {
        self.failing.lock().unwrap().insert(asset.to_string());
    }

    /// Make every asset load take `delay` (virtual time under a paused
    /// runtime).
    pub fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.lock().unwrap() = delay;
    }

    fn record(&self, call: SurfaceCall) {
        self.calls.lock().unwrap().push(call);
    }

    async fn load(&self, asset: &str) -> Result<()> {
        let delay = *self.load_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(asset) {
            return Err(CoreError::AssetLoad {
                asset: asset.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DisplaySurface for RecordingSurface {
    fn set_text(&self, region: TextRegion, text: &str) {
        self.record(SurfaceCall::Text(region, text.to_string()));
    }

    fn set_badges(&self, badges: BadgeState) {
        self.record(SurfaceCall::Badges(badges));
    }

    fn set_times(&self, current: &str, total: &str) {
        self.record(SurfaceCall::Times(current.to_string(), total.to_string()));
    }

    fn set_progress_ratio(&self, ratio: f64) {
        self.record(SurfaceCall::Ratio(ratio));
    }

    fn set_status_line(&self, status: &str) {
        self.record(SurfaceCall::Status(status.to_string()));
    }

    fn set_visible(&self, visible: bool) {
        self.record(SurfaceCall::Visible(visible));
    }

    fn set_text_color(&self, color: Rgb) {
        self.record(SurfaceCall::TextColor(color));
    }

    fn set_artwork_glow(&self, glow: Tint) {
        self.record(SurfaceCall::Glow(glow));
    }

    fn set_background_overlay(&self, overlay: Tint) {
        self.record(SurfaceCall::Overlay(overlay));
    }

    // Async asset operations record on load completion, mirroring when a
    // real surface would observe the load event. A dropped or failed load
    // leaves no record.
    async fn stage_buffer(&self, channel: AssetChannel, asset: Option<&str>) -> Result<()> {
        if let Some(asset) = asset {
            self.load(asset).await?;
        }
        self.record(SurfaceCall::StageBuffer(
            channel,
            asset.map(ToString::to_string),
        ));
        Ok(())
    }

    fn reveal_buffer(&self, channel: AssetChannel) {
        self.record(SurfaceCall::RevealBuffer(channel));
    }

    async fn commit_asset(&self, channel: AssetChannel, asset: &str) -> Result<()> {
        self.load(asset).await?;
        self.record(SurfaceCall::CommitAsset(channel, asset.to_string()));
        Ok(())
    }

    fn fade_buffer(&self, channel: AssetChannel) {
        self.record(SurfaceCall::FadeBuffer(channel));
    }
}
