//! Server-Sent Events decoding for the council message stream

use super::types::WireEvent;
use crate::council::{PipelineError, PipelineEvent};

/// Incremental decoder: bytes in, complete `data:` payloads out.
///
/// Frames are separated by a blank line; chunk boundaries may fall
/// anywhere, including inside a UTF-8 sequence.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the data of every frame it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend(chunk.iter().filter(|b| **b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(data) = frame_data(&frame) {
                frames.push(data);
            }
        }
        frames
    }

    /// Data of a trailing frame the server did not terminate
    pub fn finish(&mut self) -> Option<String> {
        let frame = std::mem::take(&mut self.buffer);
        frame_data(&frame)
    }
}

fn frame_data(frame: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(frame);
    let lines: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Decode one frame's data into a pipeline event; unknown frame types yield `None`
///
/// # Errors
///
/// A decode error when the frame is not JSON or a known event carries a bad payload.
pub fn decode_frame(data: &str) -> Result<Option<PipelineEvent>, PipelineError> {
    let event: WireEvent = serde_json::from_str(data)
        .map_err(|e| PipelineError::decode(format!("Malformed council event: {e}")))?;
    let event = event.into_pipeline_event();
    if event.is_none() {
        tracing::debug!(frame = %data, "Ignoring unknown council event");
    }
    Ok(event)
}
