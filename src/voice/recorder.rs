//! Chunked recording
//!
//! [`ChunkRecorder`] is the buffer the capture callback writes into.
//! [`RecordingController`] decides when a chunk starts and stops: VAD speech
//! start, a debounced stop after speech end, and a hard ceiling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::events::Inbox;
use crate::timer::{TimerFired, TimerKind, TimerSlot};

/// Sample buffer shared with the capture thread
#[derive(Debug, Clone, Default)]
pub struct ChunkRecorder {
    buffer: Arc<Mutex<Vec<f32>>>,
    recording: Arc<AtomicBool>,
}

impl ChunkRecorder {
    /// Create an idle recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append mono samples while recording
    pub fn push(&self, frame: &[f32]) {
        if !self.recording.load(Ordering::Acquire) {
            return;
        }
        if let Ok(mut buf) = self.buffer.lock() {
            buf.extend_from_slice(frame);
        }
    }

    /// Begin a new chunk, discarding anything buffered
    pub fn start(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
        self.recording.store(true, Ordering::Release);
    }

    /// End the chunk and return its samples
    #[must_use]
    pub fn stop(&self) -> Vec<f32> {
        self.recording.store(false, Ordering::Release);
        self.take()
    }

    /// Take buffered samples, leaving the recorder running
    #[must_use]
    pub fn take(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Copy of the buffered samples
    #[must_use]
    pub fn peek(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Whether samples are being kept
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }
}

/// Why a chunk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Hangover elapsed after VAD speech end
    SpeechEnd,
    /// Chunk reached its length limit
    Ceiling,
    /// Stopped by the owner
    Requested,
}

/// Raw audio of a stopped chunk
#[derive(Debug, Clone)]
pub struct FinishedChunk {
    /// Mono samples at the capture rate
    pub samples: Vec<f32>,
    /// Capture sample rate
    pub sample_rate: u32,
    /// What ended it
    pub reason: StopReason,
}

/// Starts and stops chunks from VAD events and timers
#[derive(Debug)]
pub struct RecordingController {
    recorder: ChunkRecorder,
    sample_rate: u32,
    max_chunk: Duration,
    manual_chunk: Duration,
    vad_stop: TimerSlot,
    ceiling: TimerSlot,
    inbox: Inbox,
}

impl RecordingController {
    /// Create a controller over `recorder`
    #[must_use]
    pub const fn new(
        recorder: ChunkRecorder,
        sample_rate: u32,
        max_chunk: Duration,
        manual_chunk: Duration,
        inbox: Inbox,
    ) -> Self {
        Self {
            recorder,
            sample_rate,
            max_chunk,
            manual_chunk,
            vad_stop: TimerSlot::new(TimerKind::HangoverStop),
            ceiling: TimerSlot::new(TimerKind::RecordingCeiling),
            inbox,
        }
    }

    /// Whether a chunk is being recorded
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Begin a chunk on VAD speech start
    ///
    /// Any pending VAD stop is cancelled. Returns true when a new chunk
    /// started, false when one was already running.
    pub fn start_from_vad(&mut self) -> bool {
        self.vad_stop.cancel();

        if self.recorder.is_recording() {
            return false;
        }

        self.begin(self.max_chunk);
        tracing::debug!(ceiling_secs = self.max_chunk.as_secs(), "recording started by vad");
        true
    }

    /// Stop the chunk `hangover` from now unless speech resumes first
    pub fn schedule_stop_from_vad(&mut self, hangover: Duration) {
        if !self.recorder.is_recording() {
            return;
        }
        self.vad_stop.schedule(hangover, &self.inbox);
        tracing::debug!(hangover_ms = hangover.as_millis(), "recording stop scheduled");
    }

    /// Begin a fixed-length chunk without VAD
    ///
    /// Returns false when a chunk is already running.
    pub fn start_manual(&mut self) -> bool {
        if self.recorder.is_recording() {
            return false;
        }

        self.begin(self.manual_chunk);
        tracing::debug!(chunk_secs = self.manual_chunk.as_secs(), "manual recording started");
        true
    }

    fn begin(&mut self, limit: Duration) {
        self.recorder.start();
        self.ceiling.schedule(limit, &self.inbox);
    }

    /// Handle a timer firing; returns the chunk if it ended the recording
    pub fn on_timer(&mut self, fired: TimerFired) -> Option<FinishedChunk> {
        let reason = if self.vad_stop.accept(fired) {
            StopReason::SpeechEnd
        } else if self.ceiling.accept(fired) {
            StopReason::Ceiling
        } else {
            return None;
        };

        if !self.recorder.is_recording() {
            return None;
        }
        Some(self.finish(reason))
    }

    /// Stop the current chunk and return it
    pub fn stop(&mut self) -> Option<FinishedChunk> {
        if !self.recorder.is_recording() {
            self.cancel_timers();
            return None;
        }
        Some(self.finish(StopReason::Requested))
    }

    /// Stop without keeping the audio
    pub fn cancel(&mut self) {
        self.cancel_timers();
        if self.recorder.is_recording() {
            let discarded = self.recorder.stop();
            tracing::debug!(samples = discarded.len(), "recording cancelled");
        }
    }

    fn cancel_timers(&mut self) {
        self.vad_stop.cancel();
        self.ceiling.cancel();
    }

    fn finish(&mut self, reason: StopReason) -> FinishedChunk {
        self.cancel_timers();
        let samples = self.recorder.stop();

        tracing::debug!(?reason, samples = samples.len(), "recording stopped");
        FinishedChunk {
            samples,
            sample_rate: self.sample_rate,
            reason,
        }
    }
}
