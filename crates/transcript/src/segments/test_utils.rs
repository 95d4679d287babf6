//! Shared helpers for segment parser tests.

use super::{ContentSegment, SegmentKind};

/// Split text into small chunks for testing tag handling across chunk
/// boundaries.
pub fn chunk_str(s: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut chunks = Vec::new();

    for chunk in chars.chunks(chunk_size) {
        chunks.push(chunk.iter().collect::<String>());
    }

    chunks
}

/// Semantic view of a segment list: kinds with their payloads, spans ignored.
pub fn kinds(segments: &[ContentSegment]) -> Vec<SegmentKind> {
    segments.iter().map(|s| s.kind.clone()).collect()
}

pub fn think(text: &str, closed: bool) -> SegmentKind {
    SegmentKind::Think {
        text: text.to_string(),
        closed,
    }
}

pub fn tool(name: &str, id: Option<&str>, active: bool) -> SegmentKind {
    SegmentKind::Tool {
        name: name.to_string(),
        invocation_id: id.map(str::to_string),
        active,
    }
}

pub fn text(content: &str) -> SegmentKind {
    SegmentKind::Text {
        text: content.to_string(),
    }
}

/// Assert that spans are contiguous and cover `[0, expected_end)` exactly.
pub fn assert_spans_partition(segments: &[ContentSegment], expected_end: usize) {
    if segments.is_empty() {
        return;
    }
    assert_eq!(segments[0].span.start, 0, "first span must start at 0");
    for pair in segments.windows(2) {
        assert_eq!(
            pair[0].span.end, pair[1].span.start,
            "spans must be contiguous: {:?} then {:?}",
            pair[0], pair[1]
        );
    }
    assert_eq!(
        segments.last().unwrap().span.end,
        expected_end,
        "spans must cover the parsed text"
    );
}
