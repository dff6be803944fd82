//! Transport seams for the push channel and the one-shot snapshot endpoint,
//! with the production HTTP implementation.

use crate::error::{Result, StreamError};
use crate::sse::{PushFrame, SseDecoder};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use marquee_core::{StreamConfig, UpdateEvent};
use url::Url;

/// A live push subscription: frames until the channel drops or errors.
pub type PushStream = BoxStream<'static, Result<PushFrame>>;

/// Opens push subscriptions. The production implementation is SSE over a
/// streaming HTTP body; tests substitute scripted transports.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Open a fresh subscription.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the channel cannot be opened.
    async fn open(&self) -> Result<PushStream>;
}

/// One-shot snapshot fetches, independent of the push channel.
#[async_trait]
pub trait SnapshotApi: Send + Sync {
    /// Fetch the incremental (`full = false`) or complete (`full = true`)
    /// state as a single update event.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the endpoint cannot be reached or the
    /// response does not decode.
    async fn fetch(&self, full: bool) -> Result<UpdateEvent>;
}

/// Production transport over HTTP: SSE for the push channel, plain GET for
/// snapshots.
pub struct HttpTransport {
    client: reqwest::Client,
    push_url: Url,
    snapshot_url: Url,
}

impl HttpTransport {
    /// Build a transport for the configured endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Endpoint`] when the base URL or either path
    /// does not parse, and [`StreamError::Transport`] when the HTTP client
    /// cannot be constructed.
    pub fn new(config: &StreamConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)?;
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            push_url: base.join(&config.push_path)?,
            snapshot_url: base.join(&config.snapshot_path)?,
        })
    }
}

#[async_trait]
impl PushTransport for HttpTransport {
    async fn open(&self) -> Result<PushStream> {
        let response = self
            .client
            .get(self.push_url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;

        let mut decoder = SseDecoder::new();
        let frames = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder.feed(&bytes),
                Err(error) => Err(StreamError::from(error)),
            })
            .flat_map(|result| {
                let frames: Vec<Result<PushFrame>> = match result {
                    Ok(frames) => frames.into_iter().map(Ok).collect(),
                    Err(error) => vec![Err(error)],
                };
                stream::iter(frames)
            });
        Ok(frames.boxed())
    }
}

#[async_trait]
impl SnapshotApi for HttpTransport {
    async fn fetch(&self, full: bool) -> Result<UpdateEvent> {
        let mut url = self.snapshot_url.clone();
        if full {
            url.query_pairs_mut().append_pair("full", "true");
        }
        let event = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<UpdateEvent>()
            .await?;
        Ok(event)
    }
}
