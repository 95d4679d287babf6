//! Streaming response renderer core.
//!
//! Turns an incremental text stream from a language-model backend into a
//! smoothly paced, structurally segmented transcript. Three mechanisms
//! cooperate:
//!
//! - [`pacing`] — decouples network arrival rate from visual reveal rate
//!   ("typewriter" pacing with backpressure-aware acceleration).
//! - [`segments`] — incrementally classifies the revealed text into
//!   reasoning blocks, tool markers and plain answer text.
//! - [`tools`] — tracks out-of-band tool invocation metadata (summaries,
//!   elapsed time, batch membership) consumed when decorating tool segments.
//!
//! [`controller::TranscriptController`] wires the three together for one
//! conversation turn and derives the ordered [`render::RenderItem`] list the
//! presentation layer consumes.

use thiserror::Error;

pub mod controller;
pub mod pacing;
pub mod render;
pub mod segments;
pub mod tools;

pub use controller::{StreamStatus, TranscriptController};
pub use pacing::{ChannelPacer, PacingBuffer};
pub use render::{RenderItem, ToolCell};
pub use segments::{parse_segments, ContentSegment, SegmentKind};
pub use tools::{ToolCallRegistry, ToolInvocationRecord};

#[derive(Error, Debug)]
pub enum TranscriptError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("presentation sink rejected update: {0}")]
    Sink(String),
}
