use super::{byte_offset_after, chars_to_take, grapheme_len, is_cjk_char, tick_delay};
use crate::TranscriptError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

/// Side-effect hook run once per drain tick with the revealed text so far.
/// Used by the presentation layer to keep the viewport scrolled; failures
/// are logged and never stop pacing.
pub type TickHook = Arc<dyn Fn(&str) -> Result<(), TranscriptError> + Send + Sync>;

pub(crate) struct PacingState {
    /// Text received but not yet revealed. Consumed from the front.
    backlog: String,
    /// Cumulative text already shown. Never rewritten.
    revealed: String,
    finished: bool,
    /// True iff a drain task is scheduled (single-flight invariant).
    draining: bool,
    /// Accelerating slice size for the end-of-stream flush.
    burst: usize,
}

pub(crate) struct TickOutcome {
    pub took: usize,
    /// Delay until the next tick, or `None` when the backlog drained empty.
    pub delay: Option<Duration>,
}

impl PacingState {
    pub(crate) fn new() -> Self {
        Self {
            backlog: String::new(),
            revealed: String::new(),
            finished: false,
            draining: false,
            burst: 0,
        }
    }

    /// One drain tick: move a slice from the front of the backlog to the
    /// revealed text and decide the delay until the next tick.
    pub(crate) fn tick(&mut self) -> TickOutcome {
        let backlog_len = grapheme_len(&self.backlog);
        if backlog_len == 0 {
            self.burst = 0;
            return TickOutcome {
                took: 0,
                delay: None,
            };
        }

        let cjk = self
            .backlog
            .chars()
            .next()
            .map(is_cjk_char)
            .unwrap_or(false);
        let base = chars_to_take(backlog_len, cjk, self.finished);

        let take = if self.finished {
            // Flush acceleration: the slice doubles tick-over-tick so even a
            // huge backlog drains in logarithmically many ticks.
            self.burst = if self.burst == 0 {
                base
            } else {
                self.burst.saturating_mul(2)
            };
            self.burst.max(base)
        } else {
            self.burst = 0;
            base
        };
        let take = take.min(backlog_len);

        let byte_end = byte_offset_after(&self.backlog, take);
        let taken: String = self.backlog.drain(..byte_end).collect();
        self.revealed.push_str(&taken);

        let remaining = grapheme_len(&self.backlog);
        let delay = if remaining == 0 {
            None
        } else {
            Some(tick_delay(remaining, self.finished))
        };
        TickOutcome { took: take, delay }
    }
}

/// Pacing buffer for a single stream.
///
/// `append` and `finish` never block; draining happens on a spawned task
/// that sleeps between ticks. At most one drain task exists at a time.
pub struct PacingBuffer {
    state: Arc<Mutex<PacingState>>,
    drain_task: Mutex<Option<JoinHandle<()>>>,
    tick_hook: Option<TickHook>,
}

impl PacingBuffer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PacingState::new())),
            drain_task: Mutex::new(None),
            tick_hook: None,
        }
    }

    pub fn with_tick_hook(mut self, hook: TickHook) -> Self {
        self.tick_hook = Some(hook);
        self
    }

    /// Add text to the backlog and make sure a drain is scheduled.
    /// An empty chunk is a silent no-op.
    pub fn append(&self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        let spawn = {
            let mut state = self.state.lock().unwrap();
            state.backlog.push_str(chunk);
            if state.draining {
                false
            } else {
                state.draining = true;
                true
            }
        };
        if spawn {
            self.spawn_drain();
        }
    }

    /// Signal end-of-stream: remaining backlog drains with accelerating
    /// slices. Idempotent.
    pub fn finish(&self) {
        let spawn = {
            let mut state = self.state.lock().unwrap();
            state.finished = true;
            if !state.draining && !state.backlog.is_empty() {
                state.draining = true;
                true
            } else {
                false
            }
        };
        if spawn {
            self.spawn_drain();
        }
    }

    /// Cancel any scheduled drain and return to the initial state. A
    /// subsequent `append` starts cleanly.
    pub fn reset(&self) {
        if let Some(handle) = self.drain_task.lock().unwrap().take() {
            handle.abort();
        }
        let mut state = self.state.lock().unwrap();
        *state = PacingState::new();
    }

    /// Install already-complete text as revealed, without pacing. Used when
    /// replaying a stored conversation turn.
    pub fn preload(&self, text: &str) {
        self.reset();
        let mut state = self.state.lock().unwrap();
        state.revealed.push_str(text);
        state.finished = true;
    }

    pub fn revealed(&self) -> String {
        self.state.lock().unwrap().revealed.clone()
    }

    /// True while text is still waiting to be revealed.
    pub fn is_active(&self) -> bool {
        !self.state.lock().unwrap().backlog.is_empty()
    }

    pub fn backlog_len(&self) -> usize {
        grapheme_len(&self.state.lock().unwrap().backlog)
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().unwrap().finished
    }

    fn spawn_drain(&self) {
        let state = Arc::clone(&self.state);
        let hook = self.tick_hook.clone();
        let handle = tokio::spawn(async move {
            loop {
                let (snapshot, delay) = {
                    let mut state = state.lock().unwrap();
                    let outcome = state.tick();
                    if outcome.delay.is_none() {
                        state.draining = false;
                    }
                    let snapshot = hook.as_ref().map(|_| state.revealed.clone());
                    (snapshot, outcome.delay)
                };
                if let (Some(hook), Some(text)) = (hook.as_ref(), snapshot.as_deref()) {
                    if let Err(err) = hook(text) {
                        warn!("pacing tick hook failed: {err}");
                    }
                }
                match delay {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => break,
                }
            }
        });
        *self.drain_task.lock().unwrap() = Some(handle);
    }
}

impl Default for PacingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn drain_synchronously(state: &mut PacingState) -> Vec<usize> {
        let mut takes = Vec::new();
        loop {
            let outcome = state.tick();
            if outcome.took == 0 {
                break;
            }
            takes.push(outcome.took);
            if outcome.delay.is_none() {
                break;
            }
        }
        takes
    }

    #[test]
    fn finish_flush_accelerates_monotonically() {
        let mut state = PacingState::new();
        state.backlog = "x".repeat(1000);
        state.finished = true;

        let takes = drain_synchronously(&mut state);
        assert_eq!(state.revealed.len(), 1000);
        assert!(state.backlog.is_empty());

        // Slice sizes grow tick-over-tick; only the final tick may be the
        // smaller remainder.
        for pair in takes[..takes.len() - 1].windows(2) {
            assert!(pair[1] >= pair[0], "takes not monotone: {takes:?}");
        }

        let mut unfinished = PacingState::new();
        unfinished.backlog = "x".repeat(1000);
        let unfinished_takes = drain_synchronously(&mut unfinished);
        assert!(takes.len() < unfinished_takes.len());
    }

    #[test]
    fn revealed_is_prefix_of_everything_appended() {
        let mut state = PacingState::new();
        state.backlog = "hello world, this is a paced stream".to_string();
        let original = state.backlog.clone();

        let mut seen = String::new();
        loop {
            let outcome = state.tick();
            assert!(state.revealed.starts_with(&seen));
            seen = state.revealed.clone();
            if outcome.delay.is_none() {
                break;
            }
        }
        assert_eq!(state.revealed, original);
    }

    #[test]
    fn cjk_backlog_drains_in_smaller_slices() {
        let mut latin = PacingState::new();
        latin.backlog = "x".repeat(50);
        let mut cjk = PacingState::new();
        cjk.backlog = "\u{6f22}".repeat(50);
        assert_eq!(latin.tick().took, 6);
        assert_eq!(cjk.tick().took, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn drains_completely_after_finish() {
        let buffer = PacingBuffer::new();
        buffer.append("hello ");
        buffer.append("world");
        buffer.finish();

        let mut last_len = 0;
        while buffer.is_active() {
            let len = buffer.revealed().len();
            assert!(len >= last_len);
            last_len = len;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // One more yield so the final tick's state settles.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(buffer.revealed(), "hello world");
        assert!(!buffer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn appends_while_draining_preserve_order() {
        let buffer = PacingBuffer::new();
        for chunk in ["alpha ", "beta ", "gamma ", "delta"] {
            buffer.append(chunk);
            tokio::time::sleep(Duration::from_millis(40)).await;
        }
        buffer.finish();
        while buffer.is_active() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(buffer.revealed(), "alpha beta gamma delta");
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_state_and_allows_reuse() {
        let buffer = PacingBuffer::new();
        buffer.append("first stream text");
        tokio::time::sleep(Duration::from_millis(50)).await;
        buffer.reset();

        assert_eq!(buffer.revealed(), "");
        assert!(!buffer.is_active());
        assert!(!buffer.is_finished());

        buffer.append("second");
        buffer.finish();
        while buffer.is_active() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(buffer.revealed(), "second");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_append_is_a_no_op() {
        let buffer = PacingBuffer::new();
        buffer.append("");
        assert!(!buffer.is_active());
        assert_eq!(buffer.backlog_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hook_errors_do_not_stop_pacing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let hook_calls = Arc::clone(&calls);
        let buffer = PacingBuffer::new().with_tick_hook(Arc::new(move |_| {
            hook_calls.fetch_add(1, Ordering::SeqCst);
            Err(TranscriptError::Sink("viewport gone".to_string()))
        }));

        buffer.append("some text to drain across multiple ticks");
        buffer.finish();
        while buffer.is_active() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(buffer.revealed(), "some text to drain across multiple ticks");
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn preload_installs_text_without_pacing() {
        let buffer = PacingBuffer::new();
        buffer.preload("stored turn text");
        assert_eq!(buffer.revealed(), "stored turn text");
        assert!(!buffer.is_active());
        assert!(buffer.is_finished());
    }
}
