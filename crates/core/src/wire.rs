//! Chunk framing between the relay endpoint and the chat client.
//!
//! Frames are newline-delimited JSON. This is an internal contract between
//! the two components; it deliberately carries an explicit `error` frame so
//! the client can tell a failed stream apart from a complete one. A stream
//! that closes without a `done` frame is incomplete.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamFrame {
    /// One incremental text fragment, in arrival order.
    Delta { text: String },
    /// Normal end of response.
    Done {
        #[serde(rename = "finishReason")]
        finish_reason: Option<String>,
    },
    /// The provider failed mid-stream; no further frames follow.
    Error { message: String },
}

impl StreamFrame {
    /// Encodes the frame as one NDJSON line, trailing newline included.
    pub fn encode(&self) -> String {
        // StreamFrame serialization cannot fail: no maps, no non-string keys.
        let mut line = serde_json::to_string(self).expect("frame serializes");
        line.push('\n');
        line
    }
}

/// Incremental NDJSON decoder for the client side of the stream.
///
/// Network chunks align with neither frame boundaries nor UTF-8 character
/// boundaries, so the decoder buffers raw bytes across calls to `push` and
/// only parses complete lines.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns every complete frame they finish.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<StreamFrame, serde_json::Error>> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(frame) = Self::decode_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Drains whatever remains in the buffer as a final frame. Call when the
    /// byte stream ends; a sender that omits the trailing newline still gets
    /// its last frame delivered.
    pub fn finish(&mut self) -> Option<Result<StreamFrame, serde_json::Error>> {
        let line = std::mem::take(&mut self.buffer);
        Self::decode_line(&line)
    }

    fn decode_line(line: &[u8]) -> Option<Result<StreamFrame, serde_json::Error>> {
        let line = line.trim_ascii();
        if line.is_empty() {
            return None;
        }
        Some(serde_json::from_slice(line))
    }
}
