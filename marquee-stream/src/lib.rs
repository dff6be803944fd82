pub mod client;
pub mod error;
pub mod sse;
pub mod transport;

pub use client::{ConnectionState, StreamClient};
pub use error::{Result, StreamError};
pub use sse::{PushFrame, SseDecoder};
pub use transport::{HttpTransport, PushStream, PushTransport, SnapshotApi};
