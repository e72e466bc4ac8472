//! Streaming reply decoder.
//!
//! DESIGN
//! ======
//! The service answers `response_mode = "streaming"` requests with a body of
//! newline-delimited `data: {json}` frames. Bytes are buffered until a full
//! line is available, so multi-byte characters split across chunks are never
//! decoded half-way. There is no end-of-stream sentinel: the sequence ends
//! when the transport does. Malformed frames are logged and skipped.

use std::collections::VecDeque;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::warn;

use super::types::{ChatError, StreamEvent};

/// Incremental line splitter + frame parser.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk; returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, ChatError>> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(event) = parse_frame_line(&line) {
                out.push(event);
            }
        }
        out
    }

    /// Flush a trailing line that arrived without a newline.
    pub fn finish(&mut self) -> Option<Result<StreamEvent, ChatError>> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        parse_frame_line(&line)
    }
}

/// Parse one raw line. `None` for blank, comment, non-data or malformed lines.
pub(crate) fn parse_frame_line(raw: &[u8]) -> Option<Result<StreamEvent, ChatError>> {
    let Ok(line) = std::str::from_utf8(raw) else {
        warn!(len = raw.len(), "chat: skipping non-utf8 stream line");
        return None;
    };
    let line = line.trim_end_matches(['\n', '\r']);
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() {
        return None;
    }

    let frame: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "chat: skipping malformed stream frame");
            return None;
        }
    };

    let event = frame.get("event").and_then(Value::as_str).unwrap_or_default();
    let conversation_id = frame
        .get("conversation_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_owned);

    match event {
        "message" | "agent_message" => {
            let text = frame
                .get("answer")
                .or_else(|| frame.get("message"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(Ok(StreamEvent::Fragment { text, conversation_id }))
        }
        "error" => {
            let message = frame
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown stream error")
                .to_string();
            Some(Err(ChatError::Stream(message)))
        }
        other => Some(Ok(StreamEvent::Other { event: other.to_string(), conversation_id })),
    }
}

struct DecodeState<S> {
    inner: S,
    decoder: FrameDecoder,
    pending: VecDeque<Result<StreamEvent, ChatError>>,
    done: bool,
}

/// Decode a byte stream into stream events.
///
/// The returned stream is finite: it ends after the transport ends, after a
/// transport error, or after an `error` event.
pub fn decode_events<S, B, E>(bytes: S) -> impl Stream<Item = Result<StreamEvent, ChatError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = DecodeState { inner: bytes, decoder: FrameDecoder::new(), pending: VecDeque::new(), done: false };
    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                if item.is_err() {
                    st.pending.clear();
                    st.done = true;
                }
                return Some((item, st));
            }
            if st.done {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(chunk)) => st.pending.extend(st.decoder.push(chunk.as_ref())),
                Some(Err(e)) => {
                    st.done = true;
                    st.pending
                        .push_back(Err(ChatError::ApiRequest(format!("stream read failed: {e}"))));
                }
                None => {
                    st.done = true;
                    st.pending.extend(st.decoder.finish());
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod tests;
