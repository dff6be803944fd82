//! Incremental decoder for the server-sent-events wire format.
//!
//! The push channel interleaves JSON update events with keep-alive
//! heartbeats. Heartbeats arrive either as comment lines (leading `:`) or as
//! events with an empty data payload; both only matter to the staleness
//! watchdog.

use crate::error::Result;
use marquee_core::UpdateEvent;

/// One decoded frame from the push channel.
#[derive(Debug)]
pub enum PushFrame {
    /// Channel-level liveness signal, no payload.
    Heartbeat,
    /// A decoded update event.
    Event(UpdateEvent),
}

/// Streaming SSE decoder. Feed it raw body chunks as they arrive; it buffers
/// partial lines (and split UTF-8 sequences) across chunk boundaries.
#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: String,
    saw_data: bool,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every frame it completed.
    ///
    /// # Errors
    ///
    /// Returns a decode error for invalid UTF-8 or an event payload that is
    /// not valid update JSON. The decoder state is unspecified afterwards;
    /// callers are expected to drop the channel and reconnect.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<PushFrame>> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = std::str::from_utf8(&line)?;
            if let Some(frame) = self.take_line(line)? {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    fn take_line(&mut self, line: &str) -> Result<Option<PushFrame>> {
        if line.is_empty() {
            // Frame separator: dispatch whatever accumulated
            if !self.saw_data {
                return Ok(None);
            }
            let data = std::mem::take(&mut self.data);
            self.saw_data = false;
            if data.trim().is_empty() {
                return Ok(Some(PushFrame::Heartbeat));
            }
            let event: UpdateEvent = serde_json::from_str(&data)?;
            return Ok(Some(PushFrame::Event(event)));
        }
        if line.starts_with(':') {
            // Comment lines are keep-alives
            return Ok(Some(PushFrame::Heartbeat));
        }
        if let Some(value) = line.strip_prefix("data:") {
            if self.saw_data {
                self.data.push('\n');
            }
            self.data.push_str(value.strip_prefix(' ').unwrap_or(value));
            self.saw_data = true;
        }
        // Other fields (event, id, retry) carry nothing we act on
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::EventKind;

    fn feed_str(decoder: &mut SseDecoder, input: &str) -> Vec<PushFrame> {
        decoder.feed(input.as_bytes()).unwrap()
    }

    #[test]
    fn test_decodes_data_event() {
        let mut decoder = SseDecoder::new();
        let frames = feed_str(
            &mut decoder,
            "data: {\"type\":\"DATA\",\"title\":\"Song\"}\n\n",
        );
        assert_eq!(frames.len(), 1);
        assert!(matches!(
            &frames[0],
            PushFrame::Event(event)
                if event.kind == EventKind::Data && event.title.as_deref() == Some("Song")
        ));
    }

    #[test]
    fn test_buffers_across_chunk_boundaries() {
        let mut decoder = SseDecoder::new();
        assert!(feed_str(&mut decoder, "data: {\"type\":\"DA").is_empty());
        assert!(feed_str(&mut decoder, "TA\",\"paused\":true}").is_empty());
        let frames = feed_str(&mut decoder, "\n\n");
        assert_eq!(frames.len(), 1);
        assert!(matches!(
            &frames[0],
            PushFrame::Event(event) if event.paused == Some(true)
        ));
    }

    #[test]
    fn test_comment_line_is_heartbeat() {
        let mut decoder = SseDecoder::new();
        let frames = feed_str(&mut decoder, ": keep-alive\n");
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], PushFrame::Heartbeat));
    }

    #[test]
    fn test_empty_data_event_is_heartbeat() {
        let mut decoder = SseDecoder::new();
        let frames = feed_str(&mut decoder, "data:\n\n");
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], PushFrame::Heartbeat));
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut decoder = SseDecoder::new();
        let frames = feed_str(
            &mut decoder,
            "data: {\"type\":\"DATA\",\ndata: \"album\":\"LP\"}\n\n",
        );
        assert_eq!(frames.len(), 1);
        assert!(matches!(
            &frames[0],
            PushFrame::Event(event) if event.album.as_deref() == Some("LP")
        ));
    }

    #[test]
    fn test_crlf_lines() {
        let mut decoder = SseDecoder::new();
        let frames = feed_str(&mut decoder, "data: {\"type\":\"DATA\"}\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert!(matches!(&frames[0], PushFrame::Event(_)));
    }

    #[test]
    fn test_event_and_id_fields_ignored() {
        let mut decoder = SseDecoder::new();
        let frames = feed_str(
            &mut decoder,
            "event: message\nid: 7\ndata: {\"type\":\"DATA\"}\n\n",
        );
        assert_eq!(frames.len(), 1);
        assert!(matches!(&frames[0], PushFrame::Event(_)));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let mut decoder = SseDecoder::new();
        let result = decoder.feed(b"data: {not json}\n\n");
        assert!(matches!(
            result,
            Err(crate::error::StreamError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_separator_without_data_yields_nothing() {
        let mut decoder = SseDecoder::new();
        assert!(feed_str(&mut decoder, "\n\n\n").is_empty());
    }
}
