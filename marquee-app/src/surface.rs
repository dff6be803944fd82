//! Reference display surface.
//!
//! Renders every region write as a structured log line, which is what an
//! unattended kiosk operator actually tails. Asset staging and commits fetch
//! the image bytes over HTTP so load completion has real latency and can
//! fail the way an image element's load would.

use async_trait::async_trait;
use marquee_core::{
    AssetChannel, BadgeState, CoreError, DisplaySurface, Rgb, TextRegion, Tint,
};
use tracing::{debug, info};
use url::Url;

pub struct ConsoleSurface {
    client: reqwest::Client,
    base: Url,
}

impl ConsoleSurface {
    /// Build a surface resolving relative asset references against `base`.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when the HTTP client cannot be built.
    pub fn new(base: Url) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base,
        })
    }

    async fn load(&self, asset: &str) -> Result<(), CoreError> {
        let url = match Url::parse(asset) {
            Ok(url) => url,
            Err(_) => self.base.join(asset).map_err(|error| CoreError::AssetLoad {
                asset: asset.to_string(),
                reason: error.to_string(),
            })?,
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|error| CoreError::AssetLoad {
                asset: asset.to_string(),
                reason: error.to_string(),
            })?;
        let bytes = response.bytes().await.map_err(|error| CoreError::AssetLoad {
            asset: asset.to_string(),
            reason: error.to_string(),
        })?;
        debug!(asset, bytes = bytes.len(), "Asset loaded");
        Ok(())
    }
}

#[async_trait]
impl DisplaySurface for ConsoleSurface {
    fn set_text(&self, region: TextRegion, text: &str) {
        info!(?region, text, "Text region");
    }

    fn set_badges(&self, badges: BadgeState) {
        info!(?badges, "Badges");
    }

    fn set_times(&self, current: &str, total: &str) {
        debug!(current, total, "Times");
    }

    fn set_progress_ratio(&self, ratio: f64) {
        debug!(ratio, "Progress");
    }

    fn set_status_line(&self, status: &str) {
        debug!(status, "Status line");
    }

    fn set_visible(&self, visible: bool) {
        info!(visible, "Display visibility");
    }

    fn set_text_color(&self, color: Rgb) {
        info!(?color, "Text color");
    }

    fn set_artwork_glow(&self, glow: Tint) {
        info!(color = ?glow.color, alpha = glow.alpha, "Artwork glow");
    }

    fn set_background_overlay(&self, overlay: Tint) {
        info!(color = ?overlay.color, alpha = overlay.alpha, "Background overlay");
    }

    async fn stage_buffer(
        &self,
        channel: AssetChannel,
        asset: Option<&str>,
    ) -> Result<(), CoreError> {
        if let Some(asset) = asset {
            self.load(asset).await?;
        }
        debug!(?channel, ?asset, "Crossfade buffer staged");
        Ok(())
    }

    fn reveal_buffer(&self, channel: AssetChannel) {
        debug!(?channel, "Crossfade buffer revealed");
    }

    async fn commit_asset(&self, channel: AssetChannel, asset: &str) -> Result<(), CoreError> {
        self.load(asset).await?;
        info!(?channel, asset, "Artwork committed");
        Ok(())
    }

    fn fade_buffer(&self, channel: AssetChannel) {
        debug!(?channel, "Crossfade buffer fading out");
    }
}
