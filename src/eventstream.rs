use base64::Engine;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use crate::error::BedrockRequestError;

/// Prelude: total length (4), headers length (4), prelude CRC (4).
const PRELUDE_LEN: usize = 12;
/// Smallest possible frame: prelude plus the trailing message CRC.
const MIN_FRAME_LEN: usize = 16;

/// Frame payload envelope: the event JSON, base64-encoded.
#[derive(Debug, Deserialize)]
struct PayloadEnvelope {
    bytes: String,
}

/// Incremental decoder for the binary event-stream framing used by
/// `invoke-with-response-stream`.
///
/// Each frame is `total_len (u32 BE) | headers_len (u32 BE) | prelude CRC |
/// headers | payload | message CRC`. The payload is a JSON envelope whose
/// `bytes` field base64-encodes the actual event document. CRCs are not
/// re-validated here and the header block is skipped.
pub struct EventStreamParser {
    byte_stream: std::pin::Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: Vec<u8>,
}

impl EventStreamParser {
    pub fn new(response: reqwest::Response) -> Self {
        Self::from_byte_stream(response.bytes_stream())
    }

    pub(crate) fn from_byte_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    {
        Self {
            byte_stream: Box::pin(stream),
            buffer: Vec::new(),
        }
    }

    /// Pull the next decoded event, reading more transport chunks as needed.
    ///
    /// Returns `Ok(None)` once the underlying stream ends. A trailing
    /// partial frame at end of stream means the transport closed mid-frame;
    /// it is discarded rather than reported.
    pub async fn next_event(&mut self) -> Result<Option<Value>, BedrockRequestError> {
        loop {
            if let Some(payload) = self.next_frame_payload()? {
                return Ok(Some(decode_event_payload(&payload)?));
            }

            match self.byte_stream.next().await {
                Some(chunk) => self.buffer.extend_from_slice(&chunk?),
                None => {
                    if !self.buffer.is_empty() {
                        tracing::warn!(
                            leftover = self.buffer.len(),
                            "event stream ended inside a frame"
                        );
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Pop one complete frame off the buffer and return its payload bytes.
    fn next_frame_payload(&mut self) -> Result<Option<Vec<u8>>, BedrockRequestError> {
        if self.buffer.len() < PRELUDE_LEN {
            return Ok(None);
        }

        let total_len = u32::from_be_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ]) as usize;
        if total_len < MIN_FRAME_LEN {
            return Err(BedrockRequestError::InvalidEventData(format!(
                "frame length {total_len} is below the {MIN_FRAME_LEN}-byte minimum"
            )));
        }
        if self.buffer.len() < total_len {
            return Ok(None);
        }

        let headers_len = u32::from_be_bytes([
            self.buffer[4],
            self.buffer[5],
            self.buffer[6],
            self.buffer[7],
        ]) as usize;
        let payload_start = PRELUDE_LEN + headers_len;
        let payload_end = total_len - 4;
        if payload_start > payload_end {
            return Err(BedrockRequestError::InvalidEventData(format!(
                "header block of {headers_len} bytes overruns the {total_len}-byte frame"
            )));
        }

        let frame: Vec<u8> = self.buffer.drain(..total_len).collect();
        Ok(Some(frame[payload_start..payload_end].to_vec()))
    }
}

/// Frame payload -> JSON envelope -> base64 `bytes` -> event document.
fn decode_event_payload(payload: &[u8]) -> Result<Value, BedrockRequestError> {
    let envelope: PayloadEnvelope = serde_json::from_slice(payload).map_err(|e| {
        BedrockRequestError::InvalidEventData(format!("frame payload is not an event envelope: {e}"))
    })?;

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(envelope.bytes)
        .map_err(|e| {
            BedrockRequestError::InvalidEventData(format!("event bytes are not valid base64: {e}"))
        })?;

    serde_json::from_slice(&decoded).map_err(|e| {
        BedrockRequestError::InvalidEventData(format!("decoded event is not valid JSON: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use serde_json::json;

    fn frame(event: &Value) -> Vec<u8> {
        frame_with_headers(event, &[])
    }

    fn frame_with_headers(event: &Value, headers: &[u8]) -> Vec<u8> {
        let inner = serde_json::to_vec(event).unwrap();
        let payload = serde_json::to_vec(&json!({
            "bytes": base64::engine::general_purpose::STANDARD.encode(inner)
        }))
        .unwrap();

        let total = (MIN_FRAME_LEN + headers.len() + payload.len()) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&total.to_be_bytes());
        bytes.extend_from_slice(&(headers.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(headers);
        bytes.extend_from_slice(&payload);
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes
    }

    fn parser_over(chunks: Vec<Vec<u8>>) -> EventStreamParser {
        let items: Vec<Result<Bytes, reqwest::Error>> =
            chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect();
        EventStreamParser::from_byte_stream(stream::iter(items))
    }

    async fn collect(mut parser: EventStreamParser) -> Vec<Value> {
        let mut events = Vec::new();
        while let Some(event) = parser.next_event().await.unwrap() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn decodes_one_frame_per_event() {
        let first = json!({ "type": "content_block_delta", "delta": { "text": "Hi" } });
        let second = json!({ "type": "message_stop" });
        let parser = parser_over(vec![frame(&first), frame(&second)]);

        let events = collect(parser).await;

        assert_eq!(events, vec![first, second]);
    }

    #[tokio::test]
    async fn decodes_multiple_frames_from_one_chunk() {
        let first = json!({ "type": "message_start" });
        let second = json!({ "type": "message_stop" });
        let mut chunk = frame(&first);
        chunk.extend_from_slice(&frame(&second));
        let parser = parser_over(vec![chunk]);

        let events = collect(parser).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], "message_start");
        assert_eq!(events[1]["type"], "message_stop");
    }

    #[tokio::test]
    async fn reassembles_a_frame_split_across_chunks() {
        let event = json!({ "type": "content_block_delta", "delta": { "text": "split" } });
        let bytes = frame(&event);
        let (head, tail) = bytes.split_at(7);
        let parser = parser_over(vec![head.to_vec(), tail.to_vec()]);

        let events = collect(parser).await;

        assert_eq!(events, vec![event]);
    }

    #[tokio::test]
    async fn skips_the_header_block() {
        let event = json!({ "type": "message_stop" });
        // An ":event-type" string header, as the runtime actually sends.
        let mut headers = Vec::new();
        headers.push(11u8);
        headers.extend_from_slice(b":event-type");
        headers.push(7u8);
        headers.extend_from_slice(&(5u16).to_be_bytes());
        headers.extend_from_slice(b"chunk");
        let parser = parser_over(vec![frame_with_headers(&event, &headers)]);

        let events = collect(parser).await;

        assert_eq!(events, vec![event]);
    }

    #[tokio::test]
    async fn truncated_tail_is_discarded() {
        let event = json!({ "type": "message_start" });
        let mut chunk = frame(&event);
        chunk.extend_from_slice(&frame(&json!({ "type": "message_stop" }))[..9]);
        let parser = parser_over(vec![chunk]);

        let events = collect(parser).await;

        assert_eq!(events, vec![event]);
    }

    #[tokio::test]
    async fn garbage_payload_is_an_error() {
        let mut bytes = Vec::new();
        let payload = b"not json";
        bytes.extend_from_slice(&((MIN_FRAME_LEN + payload.len()) as u32).to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&0u32.to_be_bytes());
        let mut parser = parser_over(vec![bytes]);

        let err = parser.next_event().await.unwrap_err();

        assert!(matches!(err, BedrockRequestError::InvalidEventData(_)));
    }
}
