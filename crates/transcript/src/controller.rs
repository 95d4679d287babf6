//! Wires transport events into the pacing buffer, segment parser and tool
//! registry for one conversation turn.

use crate::pacing::{PacingBuffer, TickHook};
use crate::render::{build_render_items, RenderItem};
use crate::segments::{marker_text, parse_segments};
use crate::tools::ToolCallRegistry;
use tracing::debug;
use transport::StreamEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamStatus {
    /// No active streaming, ready for a new turn.
    Idle,
    Streaming,
    Done,
    /// Transport error or disconnect; already-streamed content is preserved.
    Error(String),
}

/// Per-turn controller for the streaming transcript.
///
/// Text chunks flow through the pacing buffer; tool lifecycle events update
/// the registry directly and synthesize an inline marker so the invocation
/// appears in the transcript at the position it occurred. `render_items`
/// reparses the revealed text, so it is safe to call on every refresh tick.
pub struct TranscriptController {
    pacer: PacingBuffer,
    tools: ToolCallRegistry,
    active_tool: Option<String>,
    tool_counter: u64,
    status: StreamStatus,
}

impl TranscriptController {
    pub fn new() -> Self {
        Self {
            pacer: PacingBuffer::new(),
            tools: ToolCallRegistry::new(),
            active_tool: None,
            tool_counter: 0,
            status: StreamStatus::Idle,
        }
    }

    /// Attach a per-tick hook to the pacing buffer (viewport scrolling).
    pub fn with_tick_hook(hook: TickHook) -> Self {
        let mut controller = Self::new();
        controller.pacer = PacingBuffer::new().with_tick_hook(hook);
        controller
    }

    /// Start a fresh conversational turn, wiping all per-turn state.
    pub fn begin_turn(&mut self) {
        self.pacer.reset();
        self.tools.clear();
        self.active_tool = None;
        self.tool_counter = 0;
        self.status = StreamStatus::Streaming;
    }

    pub fn handle_event(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Chunk { text } => self.pacer.append(text),
            StreamEvent::ToolStart {
                name,
                invocation_id,
                batch,
                ..
            } => {
                let id = match invocation_id {
                    Some(id) => id.to_string(),
                    None => {
                        self.tool_counter += 1;
                        format!("tool-{}", self.tool_counter)
                    }
                };
                self.tools.on_start(name, &id, *batch);
                self.pacer.append(&marker_text(name, &id));
                self.active_tool = Some(name.clone());
            }
            StreamEvent::ToolEnd {
                name,
                input_summary,
                output_summary,
                elapsed_seconds,
                invocation_id,
                batch,
            } => {
                let id = match invocation_id {
                    Some(id) => id.to_string(),
                    None => format!("tool-{}", self.tool_counter),
                };
                let elapsed_ms = elapsed_seconds.map(|s| (s * 1000.0).round() as u64);
                self.tools
                    .on_end(name, &id, input_summary, output_summary, elapsed_ms, *batch);
                if self.active_tool.as_deref() == Some(name.as_str())
                    && !self.tools.has_active(name)
                {
                    self.active_tool = None;
                }
            }
            StreamEvent::Done { final_text, .. } => {
                debug!("stream done ({} bytes of final text)", final_text.len());
                self.pacer.finish();
                self.status = StreamStatus::Done;
            }
            StreamEvent::Error { message } => {
                // Preserve whatever already streamed and surface the error
                // inline, then drain the backlog instead of freezing.
                self.pacer.append(&format!("\n\n[stream error: {message}]"));
                self.pacer.finish();
                self.status = StreamStatus::Error(message.clone());
            }
        }
    }

    /// Ordered transcript entries for the presentation layer.
    pub fn render_items(&self) -> Vec<RenderItem> {
        let text = self.pacer.revealed();
        let done = matches!(self.status, StreamStatus::Done | StreamStatus::Error(_));
        let segments = parse_segments(&text, self.active_tool.as_deref(), &self.tools, done);
        build_render_items(&segments, &self.tools)
    }

    /// True while text is still being revealed (UI affordance: e.g.
    /// disabling input while draining).
    pub fn is_typing(&self) -> bool {
        self.pacer.is_active()
    }

    pub fn backlog_len(&self) -> usize {
        self.pacer.backlog_len()
    }

    pub fn status(&self) -> &StreamStatus {
        &self.status
    }

    pub fn revealed(&self) -> String {
        self.pacer.revealed()
    }

    /// Install a stored turn (text with re-synthesized markers) so offline
    /// parses produce the same segment structure the live stream did. Wipes
    /// all per-turn state first; replay the stored tool-call records through
    /// [`Self::tools_mut`] afterwards.
    pub fn load_history(&mut self, text: &str) {
        self.pacer.preload(text);
        self.tools.clear();
        self.active_tool = None;
        self.tool_counter = 0;
        self.status = StreamStatus::Done;
    }

    /// Registry access for replaying stored tool-call records.
    pub fn tools_mut(&mut self) -> &mut ToolCallRegistry {
        &mut self.tools
    }
}

impl Default for TranscriptController {
    fn default() -> Self {
        Self::new()
    }
}
