//! Speech-to-text providers
//!
//! One trait, two implementations: [`BrowserProvider`] drives a continuous
//! on-device recognizer, [`ServerProvider`] records chunks from the microphone
//! and has the backend transcribe them. Either way transcripts reach the
//! assistant as [`TranscriptEvent`]s.

mod browser;
mod http;
mod server;

use std::sync::Arc;

use serde::Serialize;

use crate::Result;
use crate::channel::ChannelHandle;
use crate::config::RecordingConfig;
use crate::events::Inbox;
use crate::settings::SttProviderKind;
use crate::timer::TimerFired;
use crate::voice::{AudioSourceFactory, RecognitionEvent, RecognizerFactory, VadConfig, VadEvent};

pub use browser::BrowserProvider;
pub use http::HttpTranscriber;
pub use server::ServerProvider;

/// Where a transcript came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    /// On-device recognizer
    Browser,
    /// Backend transcription
    Server,
}

/// Text heard by an STT provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEvent {
    /// Transcript
    pub text: String,
    /// Final (true) or interim
    pub is_final: bool,
    /// Producing path
    pub source: TranscriptSource,
}

/// A speech-to-text backend
///
/// The assistant keeps a provider running exactly while the session is
/// actively listening. Hooks receive the inbox events a provider may care
/// about; the defaults ignore them.
pub trait SttProvider: Send {
    /// Which provider this is
    fn kind(&self) -> SttProviderKind;

    /// Acquire resources and begin transcribing
    ///
    /// # Errors
    ///
    /// Returns error if the microphone or recognizer is unavailable
    fn start(&mut self) -> Result<()>;

    /// Release every resource; in-flight audio is discarded
    fn stop(&mut self);

    /// Running, or waiting to restart after a failure
    fn is_active(&self) -> bool;

    /// Whether a chunk is being recorded right now
    fn is_recording(&self) -> bool {
        false
    }

    /// Voice activity from the VAD worker
    fn on_vad(&mut self, _event: &VadEvent) {}

    /// A timer fired; returns true if it belonged to this provider
    fn on_timer(&mut self, _fired: TimerFired) -> bool {
        false
    }

    /// Output of the dictation recognizer
    fn on_recognition(&mut self, _event: &RecognitionEvent) -> Option<TranscriptEvent> {
        None
    }

    /// Change the recognition locale
    fn set_language(&mut self, _language: &str) {}

    /// Retune voice activity detection
    ///
    /// # Errors
    ///
    /// Returns error if the config is invalid
    fn configure_vad(&mut self, config: VadConfig) -> Result<()> {
        config.validate()
    }
}

/// Everything needed to build either provider
#[derive(Clone)]
pub struct ProviderSet {
    /// On-device recognizers
    pub recognizers: Arc<dyn RecognizerFactory>,
    /// Microphone streams
    pub audio: Arc<dyn AudioSourceFactory>,
    /// Transcript channel, when connected to a backend
    pub channel: Option<ChannelHandle>,
    /// HTTP fallback when the channel is down
    pub transcriber: Option<HttpTranscriber>,
    /// Chunking limits
    pub recording: RecordingConfig,
    /// VAD tuning
    pub vad: VadConfig,
    /// Whether the VAD worker runs
    pub vad_enabled: bool,
    /// Input device (default when `None`)
    pub device: Option<String>,
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("channel", &self.channel.is_some())
            .field("transcriber", &self.transcriber.is_some())
            .field("vad_enabled", &self.vad_enabled)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl ProviderSet {
    /// Build the provider for `kind`; it starts stopped
    #[must_use]
    pub fn create(&self, kind: SttProviderKind, language: &str, inbox: Inbox) -> Box<dyn SttProvider> {
        tracing::debug!(provider = %kind, language, "creating stt provider");

        match kind {
            SttProviderKind::Browser => Box::new(BrowserProvider::new(
                Arc::clone(&self.recognizers),
                language,
                inbox,
                self.recording.restart_delay,
            )),
            SttProviderKind::Server => Box::new(ServerProvider::new(self, language, inbox)),
        }
    }
}
