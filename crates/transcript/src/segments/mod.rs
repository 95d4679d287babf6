//! Incremental segmentation of the streamed message text.
//!
//! A single flat character stream interleaves three kinds of content:
//! reasoning ("think") blocks, inline tool markers, and plain answer text.
//! [`parse_segments`] classifies the cumulative text into ordered segments
//! on every render pass; it never sees individual chunks, so chunk
//! boundaries cannot affect the result.

use std::ops::Range;

mod parser;

#[cfg(test)]
mod test_utils;

pub use parser::parse_segments;

/// Start tag of a reasoning block.
pub const THINK_OPEN: &str = "<think>";
/// End tag of a reasoning block.
pub const THINK_CLOSE: &str = "</think>";
/// Start sequence of an inline tool marker.
pub const TOOL_MARKER_OPEN: &str = "<<TOOL:";
/// End sequence of an inline tool marker.
pub const TOOL_MARKER_CLOSE: &str = ">>";

/// Synthesize the inline marker text for a tool invocation.
///
/// This is the single synthesis point: history replay re-creates marker text
/// through this function, so a reloaded conversation parses into the exact
/// segment structure the live stream produced.
pub fn marker_text(name: &str, id: &str) -> String {
    format!("{TOOL_MARKER_OPEN}{name}:{id}{TOOL_MARKER_CLOSE}")
}

/// One classified span of the parsed text.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentKind {
    /// Reasoning block. `closed` is false while the end tag has not arrived
    /// or a tool marker forced the block shut.
    Think { text: String, closed: bool },
    /// Inline tool marker. `active` flags the currently executing call.
    Tool {
        name: String,
        invocation_id: Option<String>,
        active: bool,
    },
    /// Plain answer text.
    Text { text: String },
}

/// A segment plus its byte span in the source text. Spans are contiguous
/// and cover the parsed text exactly once; text held back as a partial
/// marker at the very end is outside every span.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSegment {
    pub kind: SegmentKind,
    pub span: Range<usize>,
}
