use super::{
    ContentSegment, SegmentKind, THINK_CLOSE, THINK_OPEN, TOOL_MARKER_CLOSE, TOOL_MARKER_OPEN,
};
use crate::tools::ToolCallRegistry;
use tracing::debug;

enum TagMatch {
    ThinkOpen,
    ThinkClose,
    Tool {
        name: String,
        id: Option<String>,
        len: usize,
    },
    /// The input ends in what could still become a tag or marker.
    Partial,
    NotATag,
}

/// Classify the cumulative message text into ordered segments.
///
/// Pure function of its inputs; safe to call on every render tick while
/// `text` is still growing. Parsing is prefix-stable: a partial tag or
/// marker at the end of the input is held back rather than misclassified,
/// and re-attempted once more input has arrived. With `stream_done` set, a
/// dangling partial degrades to plain trailing text instead of staying
/// invisible forever.
///
/// The second pass marks the most recent Tool segment matching
/// `active_tool` that has no finished record as the currently executing
/// call.
pub fn parse_segments(
    text: &str,
    active_tool: Option<&str>,
    tools: &ToolCallRegistry,
    stream_done: bool,
) -> Vec<ContentSegment> {
    let mut segments: Vec<ContentSegment> = Vec::new();
    let mut in_think = false;
    // Start of the current segment's span (absorbs dropped whitespace).
    let mut span_start = 0usize;
    // Start of the current segment's raw content (past any opening tag).
    let mut content_start = 0usize;
    let mut i = 0usize;
    let mut parse_end = text.len();
    let mut partial_logged = false;

    while i < text.len() {
        if text.as_bytes()[i] != b'<' {
            // '<' is ASCII, so a byte search always lands on a char boundary.
            i = text[i + 1..]
                .find('<')
                .map(|rel| i + 1 + rel)
                .unwrap_or(text.len());
            continue;
        }

        match match_tag(&text[i..], in_think) {
            TagMatch::ThinkOpen => {
                span_start = flush_text(&mut segments, text, span_start, content_start, i);
                in_think = true;
                content_start = i + THINK_OPEN.len();
                i = content_start;
            }
            TagMatch::ThinkClose if in_think => {
                let end = i + THINK_CLOSE.len();
                let content = text[content_start..i].trim();
                segments.push(ContentSegment {
                    kind: SegmentKind::Think {
                        text: content.to_string(),
                        closed: true,
                    },
                    span: span_start..end,
                });
                in_think = false;
                span_start = end;
                content_start = end;
                i = end;
            }
            TagMatch::ThinkClose => {
                // Stray close tag outside a think block: literal text.
                i += 1;
            }
            TagMatch::Tool { name, id, len } => {
                // A tool marker is a hard boundary: whatever preceded it is
                // flushed first, an open think block with closed=false.
                if in_think {
                    span_start =
                        flush_unclosed_think(&mut segments, text, span_start, content_start, i);
                    in_think = false;
                } else {
                    span_start = flush_text(&mut segments, text, span_start, content_start, i);
                }
                let end = i + len;
                segments.push(ContentSegment {
                    kind: SegmentKind::Tool {
                        name,
                        invocation_id: id,
                        active: false,
                    },
                    span: span_start..end,
                });
                span_start = end;
                content_start = end;
                i = end;
            }
            TagMatch::Partial => {
                if stream_done {
                    // Logged once per pass; callers reparse on every render
                    // tick, so per-occurrence logging would flood the log.
                    if !partial_logged {
                        debug!("unterminated marker at offset {i} in finished stream, keeping as plain text");
                        partial_logged = true;
                    }
                    i += 1;
                } else {
                    // Hold the tail back and re-attempt with more input.
                    parse_end = i;
                    break;
                }
            }
            TagMatch::NotATag => {
                i += 1;
            }
        }
    }

    // Flush whatever is still open at the parse end.
    let flushed_to = if in_think {
        flush_unclosed_think(&mut segments, text, span_start, content_start, parse_end)
    } else {
        flush_text(&mut segments, text, span_start, content_start, parse_end)
    };
    if flushed_to < parse_end {
        // Trailing whitespace was dropped; keep the span partition intact.
        if let Some(last) = segments.last_mut() {
            last.span.end = parse_end;
        }
    }

    mark_active_call(&mut segments, active_tool, tools);
    segments
}

fn match_tag(rest: &str, in_think: bool) -> TagMatch {
    // A start tag inside an open think block is literal (no nesting).
    if !in_think && rest.starts_with(THINK_OPEN) {
        return TagMatch::ThinkOpen;
    }
    if rest.starts_with(THINK_CLOSE) {
        return TagMatch::ThinkClose;
    }
    if rest.starts_with(TOOL_MARKER_OPEN) {
        let inner_start = TOOL_MARKER_OPEN.len();
        return match rest[inner_start..].find(TOOL_MARKER_CLOSE) {
            Some(rel) => {
                let inner = &rest[inner_start..inner_start + rel];
                let len = inner_start + rel + TOOL_MARKER_CLOSE.len();
                let (name, id) = match inner.split_once(':') {
                    Some((name, id)) => (name, Some(id)),
                    None => (inner, None),
                };
                if name.is_empty() {
                    TagMatch::NotATag
                } else {
                    TagMatch::Tool {
                        name: name.to_string(),
                        id: id.filter(|id| !id.is_empty()).map(str::to_string),
                        len,
                    }
                }
            }
            None => TagMatch::Partial,
        };
    }
    if is_potential_tag_start(rest, in_think) {
        TagMatch::Partial
    } else {
        TagMatch::NotATag
    }
}

/// True when the remaining input is a proper prefix of a tag or marker
/// opener, i.e. more input could still turn it into one.
fn is_potential_tag_start(rest: &str, in_think: bool) -> bool {
    let could_become = |opener: &str| rest.len() < opener.len() && opener.starts_with(rest);
    if could_become(THINK_CLOSE) || could_become(TOOL_MARKER_OPEN) {
        return true;
    }
    !in_think && could_become(THINK_OPEN)
}

/// Flush a pending plain-text run. Whitespace-only runs are dropped and
/// their bytes absorbed into the neighboring segment's span.
fn flush_text(
    segments: &mut Vec<ContentSegment>,
    text: &str,
    span_start: usize,
    content_start: usize,
    end: usize,
) -> usize {
    let content = text[content_start..end].trim();
    if content.is_empty() {
        return span_start;
    }
    segments.push(ContentSegment {
        kind: SegmentKind::Text {
            text: content.to_string(),
        },
        span: span_start..end,
    });
    end
}

/// Flush an open think block whose close tag never arrived.
fn flush_unclosed_think(
    segments: &mut Vec<ContentSegment>,
    text: &str,
    span_start: usize,
    content_start: usize,
    end: usize,
) -> usize {
    let content = text[content_start..end].trim();
    if content.is_empty() {
        return span_start;
    }
    segments.push(ContentSegment {
        kind: SegmentKind::Think {
            text: content.to_string(),
            closed: false,
        },
        span: span_start..end,
    });
    end
}

fn mark_active_call(
    segments: &mut [ContentSegment],
    active_tool: Option<&str>,
    tools: &ToolCallRegistry,
) {
    let Some(active_name) = active_tool else {
        return;
    };
    let mut most_recent = None;
    for (index, segment) in segments.iter().enumerate() {
        if let SegmentKind::Tool {
            name,
            invocation_id,
            ..
        } = &segment.kind
        {
            if name == active_name {
                let completed = tools
                    .lookup(name, invocation_id.as_deref())
                    .is_some_and(|record| record.finished);
                if !completed {
                    most_recent = Some(index);
                }
            }
        }
    }
    if let Some(index) = most_recent {
        if let SegmentKind::Tool { active, .. } = &mut segments[index].kind {
            *active = true;
        }
    }
}
