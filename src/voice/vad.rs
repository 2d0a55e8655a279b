//! Voice activity detection
//!
//! RMS threshold with instant attack and debounced release. All timing is
//! stream time, derived from the number of samples processed, so results do
//! not depend on how frames are batched or how fast the worker runs.

use std::sync::mpsc;
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};

use super::encoder::rms;
use crate::events::{Event, Inbox};
use crate::{Error, Result};

/// VAD tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// RMS at or above which a frame counts as speech
    pub threshold: f32,
    /// Silence required after the last voiced frame before speech ends
    pub hangover_ms: u64,
    /// Spacing of level reports
    pub level_interval_ms: u64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 0.008,
            hangover_ms: 1500,
            level_interval_ms: 100,
        }
    }
}

impl VadConfig {
    /// Check the values are usable
    ///
    /// # Errors
    ///
    /// Returns error if the threshold is outside (0, 1] or the level interval is zero
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(Error::Vad(format!(
                "threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        if self.level_interval_ms == 0 {
            return Err(Error::Vad("level_interval_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Output of the detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VadEvent {
    /// RMS crossed the threshold while silent
    SpeechStart,
    /// Hangover elapsed since the last voiced frame
    SpeechEnd,
    /// Periodic level report
    Level(f32),
}

/// Frame-by-frame detector state
#[derive(Debug)]
pub struct VadProcessor {
    config: VadConfig,
    sample_rate: u32,
    speaking: bool,
    processed: u64,
    last_voice: u64,
    last_level: u64,
}

impl VadProcessor {
    /// Create a detector for a mono stream
    #[must_use]
    pub const fn new(config: VadConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
            speaking: false,
            processed: 0,
            last_voice: 0,
            last_level: 0,
        }
    }

    /// Replace the tuning; speech state is kept
    pub const fn set_config(&mut self, config: VadConfig) {
        self.config = config;
    }

    /// Whether speech is in progress
    #[must_use]
    pub const fn is_speaking(&self) -> bool {
        self.speaking
    }

    fn samples_for(&self, ms: u64) -> u64 {
        ms * u64::from(self.sample_rate) / 1000
    }

    /// Process one frame and return the events it produced
    pub fn process(&mut self, frame: &[f32]) -> Vec<VadEvent> {
        let level = rms(frame);
        self.processed += frame.len() as u64;
        let now = self.processed;

        let mut events = Vec::new();

        if level >= self.config.threshold {
            if !self.speaking {
                self.speaking = true;
                events.push(VadEvent::SpeechStart);
            }
            self.last_voice = now;
        } else if self.speaking && now - self.last_voice >= self.samples_for(self.config.hangover_ms)
        {
            self.speaking = false;
            events.push(VadEvent::SpeechEnd);
        }

        if now - self.last_level >= self.samples_for(self.config.level_interval_ms) {
            self.last_level = now;
            events.push(VadEvent::Level(level));
        }

        events
    }
}

/// Receives detector output on the worker thread
pub trait VadListener: Send {
    /// Speech began
    fn on_speech_start(&self);

    /// Speech ended after the hangover
    fn on_speech_end(&self);

    /// Periodic level report
    fn on_level(&self, rms: f32);
}

/// Forwards detector output into the assistant inbox
#[derive(Debug, Clone)]
pub struct InboxVadListener {
    inbox: Inbox,
}

impl InboxVadListener {
    /// Post events to `inbox`
    #[must_use]
    pub const fn new(inbox: Inbox) -> Self {
        Self { inbox }
    }
}

impl VadListener for InboxVadListener {
    fn on_speech_start(&self) {
        let _ = self.inbox.send(Event::Vad(VadEvent::SpeechStart));
    }

    fn on_speech_end(&self) {
        let _ = self.inbox.send(Event::Vad(VadEvent::SpeechEnd));
    }

    fn on_level(&self, rms: f32) {
        let _ = self.inbox.send(Event::Vad(VadEvent::Level(rms)));
    }
}

/// Messages to the worker thread
#[derive(Debug)]
pub enum VadInput {
    /// Mono samples
    Frame(Vec<f32>),
    /// New tuning
    Config(VadConfig),
    /// Stop the worker
    Shutdown,
}

/// Detector running on its own thread
#[derive(Debug)]
pub struct VadWorker {
    tx: mpsc::Sender<VadInput>,
    handle: Option<JoinHandle<()>>,
}

impl VadWorker {
    /// Start the worker thread
    ///
    /// # Errors
    ///
    /// Returns error if the config is invalid or the thread cannot be spawned
    pub fn spawn(
        config: VadConfig,
        sample_rate: u32,
        listener: Box<dyn VadListener>,
    ) -> Result<Self> {
        config.validate()?;

        let (tx, rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("vad".to_string())
            .spawn(move || run_worker(&rx, VadProcessor::new(config, sample_rate), &*listener))
            .map_err(|e| Error::Vad(format!("failed to start worker: {e}")))?;

        tracing::debug!(
            sample_rate,
            threshold = config.threshold,
            hangover_ms = config.hangover_ms,
            "vad worker started"
        );

        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Sender for frames from the capture callback
    #[must_use]
    pub fn frames(&self) -> mpsc::Sender<VadInput> {
        self.tx.clone()
    }

    /// Update the tuning at runtime
    ///
    /// # Errors
    ///
    /// Returns error if the config is invalid or the worker has exited
    pub fn configure(&self, config: VadConfig) -> Result<()> {
        config.validate()?;
        self.tx
            .send(VadInput::Config(config))
            .map_err(|_| Error::Vad("worker has exited".to_string()))
    }

    /// Stop the worker and wait for it; repeated calls are no-ops
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        let _ = self.tx.send(VadInput::Shutdown);
        if handle.join().is_err() {
            tracing::warn!("vad worker panicked");
        }
        tracing::debug!("vad worker stopped");
    }
}

impl Drop for VadWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(rx: &mpsc::Receiver<VadInput>, mut processor: VadProcessor, listener: &dyn VadListener) {
    while let Ok(input) = rx.recv() {
        match input {
            VadInput::Frame(frame) => {
                for event in processor.process(&frame) {
                    match event {
                        VadEvent::SpeechStart => listener.on_speech_start(),
                        VadEvent::SpeechEnd => listener.on_speech_end(),
                        VadEvent::Level(level) => listener.on_level(level),
                    }
                }
            }
            VadInput::Config(config) => {
                tracing::debug!(?config, "vad reconfigured");
                processor.set_config(config);
            }
            VadInput::Shutdown => break,
        }
    }
}
