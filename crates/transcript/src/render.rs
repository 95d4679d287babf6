//! Derivation of presentation-facing render items from parsed segments.
//!
//! Tool segments are decorated with the aggregator's metadata; contiguous
//! tool calls sharing a batch id collapse into one collapsible group. The
//! actual visual rendering of each item is owned by the presentation layer.

use crate::segments::{ContentSegment, SegmentKind};
use crate::tools::ToolCallRegistry;

/// One tool call as shown in the transcript (standalone or as a batch row).
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCell {
    pub name: String,
    pub invocation_id: Option<String>,
    /// Still executing (or no metadata yet: rendered as pending).
    pub active: bool,
    pub input_summary: Option<String>,
    pub output_summary: Option<String>,
    pub elapsed_ms: Option<u64>,
    pub batch_index: Option<usize>,
}

/// Ordered transcript entry handed to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderItem {
    Think {
        text: String,
        closed: bool,
    },
    Tool(ToolCell),
    /// Concurrent tool calls rendered as one collapsible group. Active while
    /// any member is; elapsed is the maximum across members, reflecting
    /// parallel execution by the backend.
    BatchTool {
        batch_id: u64,
        batch_size: usize,
        calls: Vec<ToolCell>,
        active: bool,
        elapsed_ms: Option<u64>,
    },
    Text {
        text: String,
    },
}

pub fn build_render_items(segments: &[ContentSegment], tools: &ToolCallRegistry) -> Vec<RenderItem> {
    let mut items = Vec::new();
    // Run of contiguous same-batch tool calls not yet emitted.
    let mut pending: Option<(u64, usize, Vec<ToolCell>)> = None;

    for segment in segments {
        match &segment.kind {
            SegmentKind::Think { text, closed } => {
                flush_batch(pending.take(), &mut items);
                items.push(RenderItem::Think {
                    text: text.clone(),
                    closed: *closed,
                });
            }
            SegmentKind::Text { text } => {
                flush_batch(pending.take(), &mut items);
                items.push(RenderItem::Text { text: text.clone() });
            }
            SegmentKind::Tool {
                name,
                invocation_id,
                active,
            } => {
                let record = tools.lookup(name, invocation_id.as_deref());
                let batch = record.as_ref().and_then(|r| r.batch);
                let cell = ToolCell {
                    name: name.clone(),
                    invocation_id: invocation_id.clone(),
                    // Without a record the call is rendered as pending.
                    active: *active || record.as_ref().map(|r| !r.finished).unwrap_or(true),
                    input_summary: record.as_ref().and_then(|r| r.input_summary.clone()),
                    output_summary: record.as_ref().and_then(|r| r.output_summary.clone()),
                    elapsed_ms: record.as_ref().and_then(|r| r.elapsed_ms),
                    batch_index: batch.map(|b| b.batch_index),
                };

                match batch {
                    Some(info) => match &mut pending {
                        Some((batch_id, _, cells)) if *batch_id == info.batch_id => {
                            cells.push(cell);
                        }
                        _ => {
                            // A differing batch id always breaks the run,
                            // even if a later segment would match again.
                            flush_batch(pending.take(), &mut items);
                            pending = Some((info.batch_id, info.batch_size, vec![cell]));
                        }
                    },
                    None => {
                        flush_batch(pending.take(), &mut items);
                        items.push(RenderItem::Tool(cell));
                    }
                }
            }
        }
    }
    flush_batch(pending.take(), &mut items);
    items
}

fn flush_batch(pending: Option<(u64, usize, Vec<ToolCell>)>, items: &mut Vec<RenderItem>) {
    if let Some((batch_id, batch_size, calls)) = pending {
        let active = calls.iter().any(|call| call.active);
        let elapsed_ms = calls.iter().filter_map(|call| call.elapsed_ms).max();
        items.push(RenderItem::BatchTool {
            batch_id,
            batch_size,
            calls,
            active,
            elapsed_ms,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::parse_segments;
    use transport::ToolBatchInfo;

    fn batch(id: u64, size: usize, index: usize) -> ToolBatchInfo {
        ToolBatchInfo {
            batch_id: id,
            batch_size: size,
            batch_index: index,
        }
    }

    fn markers(ids: &[&str]) -> String {
        ids.iter()
            .map(|id| crate::segments::marker_text("search", id))
            .collect()
    }

    #[test]
    fn contiguous_batch_members_collapse_into_one_group() {
        let mut registry = ToolCallRegistry::new();
        for (index, id) in ["1", "2", "3"].iter().enumerate() {
            registry.on_start("search", id, Some(batch(7, 3, index)));
            registry.on_end(
                "search",
                id,
                "query",
                "hits",
                Some(100 * (index as u64 + 1)),
                Some(batch(7, 3, index)),
            );
        }

        let input = markers(&["1", "2", "3"]);
        let segments = parse_segments(&input, None, &registry, true);
        let items = build_render_items(&segments, &registry);

        assert_eq!(items.len(), 1);
        match &items[0] {
            RenderItem::BatchTool {
                batch_id,
                batch_size,
                calls,
                active,
                elapsed_ms,
            } => {
                assert_eq!(*batch_id, 7);
                assert_eq!(*batch_size, 3);
                assert_eq!(calls.len(), 3);
                assert!(!active);
                assert_eq!(*elapsed_ms, Some(300));
                assert_eq!(calls[0].batch_index, Some(0));
                assert_eq!(calls[2].batch_index, Some(2));
            }
            other => panic!("expected a batch group, got {other:?}"),
        }
    }

    #[test]
    fn differing_batch_id_breaks_the_run() {
        let mut registry = ToolCallRegistry::new();
        registry.on_start("search", "1", Some(batch(7, 2, 0)));
        registry.on_start("search", "2", Some(batch(8, 1, 0)));
        registry.on_start("search", "3", Some(batch(7, 2, 1)));

        let input = markers(&["1", "2", "3"]);
        let segments = parse_segments(&input, None, &registry, true);
        let items = build_render_items(&segments, &registry);

        // Batches are never merged non-contiguously: 7, 8, 7 stay separate.
        assert_eq!(items.len(), 3);
        let ids: Vec<u64> = items
            .iter()
            .map(|item| match item {
                RenderItem::BatchTool { batch_id, .. } => *batch_id,
                other => panic!("expected batch groups, got {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec![7, 8, 7]);
    }

    #[test]
    fn batch_is_active_while_any_member_is() {
        let mut registry = ToolCallRegistry::new();
        registry.on_start("search", "1", Some(batch(7, 2, 0)));
        registry.on_end("search", "1", "q", "done", Some(50), Some(batch(7, 2, 0)));
        registry.on_start("search", "2", Some(batch(7, 2, 1)));

        let input = markers(&["1", "2"]);
        let segments = parse_segments(&input, None, &registry, false);
        let items = build_render_items(&segments, &registry);

        match &items[0] {
            RenderItem::BatchTool { active, calls, .. } => {
                assert!(*active);
                assert!(!calls[0].active);
                assert!(calls[1].active);
            }
            other => panic!("expected a batch group, got {other:?}"),
        }
    }

    #[test]
    fn tool_without_metadata_renders_as_pending() {
        let registry = ToolCallRegistry::new();
        let segments = parse_segments("<<TOOL:search:9>>", None, &registry, false);
        let items = build_render_items(&segments, &registry);

        match &items[0] {
            RenderItem::Tool(cell) => {
                assert!(cell.active);
                assert!(cell.input_summary.is_none());
                assert!(cell.output_summary.is_none());
            }
            other => panic!("expected a tool item, got {other:?}"),
        }
    }

    #[test]
    fn mixed_transcript_preserves_order() {
        let mut registry = ToolCallRegistry::new();
        registry.on_start("grep", "1", None);
        registry.on_end("grep", "1", "pattern", "2 matches", Some(80), None);

        let input = format!(
            "<think>plan</think>Searching {} found it.",
            crate::segments::marker_text("grep", "1")
        );
        let segments = parse_segments(&input, None, &registry, true);
        let items = build_render_items(&segments, &registry);

        assert_eq!(items.len(), 4);
        assert!(matches!(&items[0], RenderItem::Think { closed: true, .. }));
        assert!(matches!(&items[1], RenderItem::Text { .. }));
        match &items[2] {
            RenderItem::Tool(cell) => {
                assert_eq!(cell.output_summary.as_deref(), Some("2 matches"));
                assert!(!cell.active);
            }
            other => panic!("expected a tool item, got {other:?}"),
        }
        assert!(matches!(&items[3], RenderItem::Text { .. }));
    }
}
