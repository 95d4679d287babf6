use super::{byte_offset_after, chars_to_take, grapheme_len, is_cjk_char, tick_delay};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

struct ChannelState {
    backlog: String,
    revealed: String,
}

struct MultiState {
    channels: Vec<ChannelState>,
    finished: bool,
    draining: bool,
}

impl MultiState {
    fn total_backlog(&self) -> usize {
        self.channels
            .iter()
            .map(|channel| grapheme_len(&channel.backlog))
            .sum()
    }

    /// One joint tick: band decisions come from the summed backlog, then
    /// each channel drains its own share. Empty channels are skipped.
    fn tick(&mut self) -> Option<Duration> {
        let total = self.total_backlog();
        if total == 0 {
            return None;
        }

        for channel in &mut self.channels {
            if channel.backlog.is_empty() {
                continue;
            }
            let cjk = channel
                .backlog
                .chars()
                .next()
                .map(is_cjk_char)
                .unwrap_or(false);
            let take = chars_to_take(total, cjk, self.finished).min(grapheme_len(&channel.backlog));
            let byte_end = byte_offset_after(&channel.backlog, take);
            let taken: String = channel.backlog.drain(..byte_end).collect();
            channel.revealed.push_str(&taken);
        }

        let remaining = self.total_backlog();
        if remaining == 0 {
            None
        } else {
            Some(tick_delay(remaining, self.finished))
        }
    }
}

/// Multi-channel variant of the pacing buffer: several streams paced
/// jointly, with slice and delay decisions computed from the total backlog
/// across all channels.
pub struct ChannelPacer {
    state: Arc<Mutex<MultiState>>,
    drain_task: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelPacer {
    pub fn new(channel_count: usize) -> Self {
        let channels = (0..channel_count)
            .map(|_| ChannelState {
                backlog: String::new(),
                revealed: String::new(),
            })
            .collect();
        Self {
            state: Arc::new(Mutex::new(MultiState {
                channels,
                finished: false,
                draining: false,
            })),
            drain_task: Mutex::new(None),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.state.lock().unwrap().channels.len()
    }

    /// Add text to one channel's backlog. Out-of-range channels and empty
    /// chunks are silent no-ops.
    pub fn append(&self, channel: usize, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        let spawn = {
            let mut state = self.state.lock().unwrap();
            let Some(target) = state.channels.get_mut(channel) else {
                return;
            };
            target.backlog.push_str(chunk);
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

    pub fn finish(&self) {
        let spawn = {
            let mut state = self.state.lock().unwrap();
            state.finished = true;
            if !state.draining && state.total_backlog() > 0 {
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

    pub fn reset(&self) {
        if let Some(handle) = self.drain_task.lock().unwrap().take() {
            handle.abort();
        }
        let mut state = self.state.lock().unwrap();
        for channel in &mut state.channels {
            channel.backlog.clear();
            channel.revealed.clear();
        }
        state.finished = false;
        state.draining = false;
    }

    pub fn revealed(&self, channel: usize) -> String {
        self.state
            .lock()
            .unwrap()
            .channels
            .get(channel)
            .map(|c| c.revealed.clone())
            .unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().total_backlog() > 0
    }

    pub fn total_backlog(&self) -> usize {
        self.state.lock().unwrap().total_backlog()
    }

    fn spawn_drain(&self) {
        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            loop {
                let delay = {
                    let mut state = state.lock().unwrap();
                    let delay = state.tick();
                    if delay.is_none() {
                        state.draining = false;
                    }
                    delay
                };
                match delay {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => break,
                }
            }
        });
        *self.drain_task.lock().unwrap() = Some(handle);
    }
}
