use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Push channel transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("No heartbeat within {timeout_ms}ms, connection is stale")]
    Stale { timeout_ms: u64 },

    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("Push channel sent invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Invalid endpoint URL: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("Push channel closed by server")]
    ChannelClosed,
}

impl StreamError {
    /// Whether this error means the channel's byte stream can no longer be
    /// decoded, as opposed to a plain transport drop.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::MalformedPayload(_) | Self::InvalidUtf8(_))
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
