//! Transport-facing event types for the streaming transcript renderer.
//!
//! The wire format (SSE, WebSocket framing, ...) is owned by the transport
//! layer itself; this crate only defines the shape of what it delivers. The
//! same event stream can come from a live connection or from a recorded
//! session played back with the original timing (see [`recording`]).

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod recording;

pub use recording::{EventRecorder, PlaybackEventStream, RecordedEvent, TranscriptRecording};

/// Batch membership for a tool invocation that was issued concurrently with
/// siblings. Invocations sharing a `batch_id` always share the same
/// `batch_size`, and `batch_index < batch_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolBatchInfo {
    pub batch_id: u64,
    pub batch_size: usize,
    pub batch_index: usize,
}

/// A single event delivered by the transport during one conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Raw text fragment. May split multi-byte sequences or markers
    /// arbitrarily; the consumer must not assume chunk boundaries mean
    /// anything.
    Chunk { text: String },
    /// A tool invocation was started by the backend.
    ToolStart {
        name: String,
        #[serde(default)]
        input: serde_json::Value,
        #[serde(default)]
        invocation_id: Option<u64>,
        #[serde(default)]
        batch: Option<ToolBatchInfo>,
    },
    /// A tool invocation finished and its result metadata is available.
    ToolEnd {
        name: String,
        input_summary: String,
        output_summary: String,
        #[serde(default)]
        elapsed_seconds: Option<f64>,
        #[serde(default)]
        invocation_id: Option<u64>,
        #[serde(default)]
        batch: Option<ToolBatchInfo>,
    },
    /// End of stream. `final_text` is the complete accumulated message text
    /// as the backend sees it.
    Done {
        final_text: String,
        #[serde(default)]
        metadata: Option<serde_json::Value>,
    },
    /// Transport error or disconnect. Terminal for the turn.
    Error { message: String },
}

/// Trait for stream event sources (live connection or recorded playback).
///
/// Using the same trait for both means the renderer behaves identically in
/// live and replay mode.
#[async_trait]
pub trait EventStream: Send {
    /// Next event, or `None` once the source is exhausted.
    async fn next_event(&mut self) -> Result<Option<StreamEvent>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_event_round_trips_through_json() {
        let event = StreamEvent::ToolStart {
            name: "search".to_string(),
            input: serde_json::json!({"query": "pacing"}),
            invocation_id: Some(7),
            batch: Some(ToolBatchInfo {
                batch_id: 3,
                batch_size: 2,
                batch_index: 0,
            }),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"tool_start\""));

        let back: StreamEvent = serde_json::from_str(&json).unwrap();
        match back {
            StreamEvent::ToolStart {
                name,
                invocation_id,
                batch,
                ..
            } => {
                assert_eq!(name, "search");
                assert_eq!(invocation_id, Some(7));
                assert_eq!(batch.unwrap().batch_size, 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let json = r#"{"type":"tool_end","name":"search","input_summary":"q","output_summary":"3 hits"}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        match event {
            StreamEvent::ToolEnd {
                elapsed_seconds,
                invocation_id,
                batch,
                ..
            } => {
                assert!(elapsed_seconds.is_none());
                assert!(invocation_id.is_none());
                assert!(batch.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
