//! Recording and playback of stream event sessions.
//!
//! A recording stores every event of one conversation turn together with its
//! arrival time, so a session can be replayed later with the original pacing
//! (or quickly, for tests and demos) and produce the exact same transcript.

use crate::{EventStream, StreamEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Single recorded event with timing info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub event: StreamEvent,
    /// Milliseconds since recording start.
    pub timestamp_ms: u64,
}

/// One recorded conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRecording {
    /// Timestamp of when the recording was started
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub events: Vec<RecordedEvent>,
}

impl TranscriptRecording {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read recording file {:?}", path.as_ref()))?;
        let recording: Self =
            serde_json::from_str(&contents).context("Failed to parse recording file")?;
        debug!(
            "loaded recording with {} events from {:?}",
            recording.events.len(),
            path.as_ref()
        );
        Ok(recording)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write recording file {:?}", path.as_ref()))?;
        debug!(
            "saved recording with {} events to {:?}",
            self.events.len(),
            path.as_ref()
        );
        Ok(())
    }
}

/// Recorder for incoming stream events.
pub struct EventRecorder {
    session: Arc<Mutex<TranscriptRecording>>,
    start_time: Instant,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            session: Arc::new(Mutex::new(TranscriptRecording {
                started_at: chrono::Utc::now(),
                events: Vec::new(),
            })),
            start_time: Instant::now(),
        }
    }

    /// Record an incoming event with its arrival offset.
    pub fn record(&self, event: &StreamEvent) {
        let elapsed = self.start_time.elapsed();
        let timestamp_ms = elapsed.as_secs() * 1000 + elapsed.subsec_millis() as u64;

        let mut session = self.session.lock().unwrap();
        session.events.push(RecordedEvent {
            event: event.clone(),
            timestamp_ms,
        });
    }

    /// Finish the session and return the recording.
    pub fn finish(&self) -> TranscriptRecording {
        self.session.lock().unwrap().clone()
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Recorded event stream for playback.
pub struct PlaybackEventStream {
    events: Vec<RecordedEvent>,
    current_index: usize,
    start_time: Instant,
    fast_mode: bool,
}

impl PlaybackEventStream {
    pub fn new(recording: TranscriptRecording, fast_mode: bool) -> Self {
        Self {
            events: recording.events,
            current_index: 0,
            start_time: Instant::now(),
            fast_mode,
        }
    }
}

#[async_trait]
impl EventStream for PlaybackEventStream {
    async fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        if self.current_index >= self.events.len() {
            return Ok(None);
        }

        let recorded = &self.events[self.current_index];

        // Either respect the original timing or replay quickly.
        if !self.fast_mode {
            let elapsed = self.start_time.elapsed();
            let expected_time = Duration::from_millis(recorded.timestamp_ms);

            if elapsed < expected_time {
                tokio::time::sleep(expected_time - elapsed).await;
            }
        } else {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let event = recorded.event.clone();
        self.current_index += 1;

        Ok(Some(event))
    }
}
