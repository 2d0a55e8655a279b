//! Server-side chunked transcription
//!
//! The provider owns the capture graph while active. VAD speech start opens a
//! chunk, speech end closes it after a hangover, and a ceiling bounds it.
//! Finished chunks are encoded as 16 kHz WAV and sent over the transcript
//! channel, or posted over HTTP when the channel is down.

use std::sync::Arc;
use std::time::Duration;

use super::{HttpTranscriber, ProviderSet, SttProvider};
use crate::Result;
use crate::channel::{ChannelHandle, ClientMessage};
use crate::config::RecordingConfig;
use crate::events::Inbox;
use crate::settings::SttProviderKind;
use crate::timer::{TimerFired, TimerKind, TimerSlot};
use crate::voice::{
    AudioBridge, AudioChunk, AudioSourceFactory, ChunkRecorder, FinishedChunk, InboxVadListener,
    RecordingController, SourceHandle, VadConfig, VadEvent, VadListener,
};

/// Microphone resources that exist only while recording is possible
struct Capture {
    bridge: AudioBridge,
    controller: RecordingController,
}

/// STT through recorded chunks transcribed by the backend
pub struct ServerProvider {
    audio: Arc<dyn AudioSourceFactory>,
    device: Option<String>,
    channel: Option<ChannelHandle>,
    transcriber: Option<HttpTranscriber>,
    recording: RecordingConfig,
    vad: VadConfig,
    vad_enabled: bool,
    language: String,
    inbox: Inbox,
    capture: Option<Capture>,
    active: bool,
    speaking: bool,
    restart: TimerSlot,
}

impl std::fmt::Debug for ServerProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerProvider")
            .field("active", &self.active)
            .field("capturing", &self.capture.is_some())
            .field("recording", &self.is_recording())
            .finish_non_exhaustive()
    }
}

impl ServerProvider {
    /// Create a stopped provider
    #[must_use]
    pub fn new(set: &ProviderSet, language: &str, inbox: Inbox) -> Self {
        Self {
            audio: Arc::clone(&set.audio),
            device: set.device.clone(),
            channel: set.channel.clone(),
            transcriber: set.transcriber.clone(),
            recording: set.recording.clone(),
            vad: set.vad,
            vad_enabled: set.vad_enabled,
            language: language.to_string(),
            inbox,
            capture: None,
            active: false,
            speaking: false,
            restart: TimerSlot::new(TimerKind::ProviderRestart),
        }
    }

    fn acquire(&mut self) -> Result<()> {
        let source = self.audio.open(self.device.as_deref())?;
        let recorder = ChunkRecorder::new();

        let vad = self.vad_enabled.then(|| {
            let listener: Box<dyn VadListener> = Box::new(InboxVadListener::new(self.inbox.clone()));
            (self.vad, listener)
        });

        let bridge = AudioBridge::start(SourceHandle::Local(source), vad, recorder.clone());
        let controller = RecordingController::new(
            recorder,
            bridge.format().sample_rate,
            self.recording.max_chunk,
            self.recording.manual_chunk,
            self.inbox.clone(),
        );

        tracing::info!(
            sample_rate = bridge.format().sample_rate,
            vad = bridge.has_vad(),
            "server stt capture started"
        );

        self.capture = Some(Capture { bridge, controller });
        self.speaking = false;

        if let Some(channel) = &self.channel {
            channel.set_recording_intent(true);
        }
        self.next_chunk();
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.controller.cancel();
            capture.bridge.teardown();
            tracing::debug!("server stt capture released");
        }
        self.speaking = false;

        if let Some(channel) = &self.channel {
            channel.set_recording_intent(false);
        }
    }

    /// Open the next chunk if the mode calls for one right now
    fn next_chunk(&mut self) {
        let Some(capture) = self.capture.as_mut() else {
            return;
        };

        let started = if capture.bridge.has_vad() {
            self.speaking && capture.controller.start_from_vad()
        } else {
            capture.controller.start_manual()
        };
        if started {
            self.announce(ClientMessage::StartRecording);
        }
    }

    fn announce(&self, message: ClientMessage) {
        if let Some(channel) = self.channel.as_ref().filter(|c| c.is_connected()) {
            if let Err(e) = channel.send(message) {
                tracing::warn!(error = %e, "channel announce failed");
            }
        }
    }

    fn schedule_restart(&mut self, delay: Duration) {
        tracing::warn!(delay_ms = delay.as_millis(), "server stt restart scheduled");
        self.release();
        self.restart.schedule(delay, &self.inbox);
    }

    fn handle_chunk(&mut self, finished: FinishedChunk) {
        tracing::debug!(
            reason = ?finished.reason,
            samples = finished.samples.len(),
            "chunk finished"
        );

        match AudioChunk::encode(&finished.samples, finished.sample_rate) {
            Ok(chunk) if self.is_transmittable(&chunk) => self.transmit(chunk),
            Ok(chunk) => tracing::debug!(
                id = %chunk.id,
                bytes = chunk.wav.len(),
                rms = chunk.rms,
                "discarding silent or tiny chunk"
            ),
            Err(e) => tracing::warn!(error = %e, "chunk encoding failed"),
        }

        self.after_chunk();
    }

    fn is_transmittable(&self, chunk: &AudioChunk) -> bool {
        chunk.wav.len() >= self.recording.min_chunk_bytes && chunk.rms >= self.recording.silence_rms
    }

    fn transmit(&self, chunk: AudioChunk) {
        let duration_ms = chunk.duration().as_millis();

        if let Some(channel) = self.channel.as_ref().filter(|c| c.is_connected()) {
            tracing::info!(id = %chunk.id, bytes = chunk.wav.len(), duration_ms, "sending chunk");
            let sent = channel
                .send(ClientMessage::StopRecording)
                .and_then(|()| channel.send(ClientMessage::wav_chunk(chunk.wav)));
            if let Err(e) = sent {
                tracing::warn!(error = %e, "chunk dropped");
            }
            return;
        }

        match &self.transcriber {
            Some(transcriber) => {
                tracing::warn!(id = %chunk.id, duration_ms, "channel down, transcribing over http");
                transcriber.spawn(chunk.wav, &self.language, self.inbox.clone());
            }
            None => tracing::warn!(id = %chunk.id, "no transcription path, chunk dropped"),
        }
    }

    fn after_chunk(&mut self) {
        if !self.active {
            return;
        }

        let stream_alive = self.capture.as_ref().is_some_and(|c| c.bridge.is_active());
        if stream_alive {
            self.next_chunk();
        } else {
            self.schedule_restart(self.recording.restart_delay);
        }
    }
}

impl SttProvider for ServerProvider {
    fn kind(&self) -> SttProviderKind {
        SttProviderKind::Server
    }

    fn start(&mut self) -> Result<()> {
        self.restart.cancel();
        if self.capture.is_some() {
            self.active = true;
            return Ok(());
        }

        self.acquire()?;
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
        self.restart.cancel();
        self.release();
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn is_recording(&self) -> bool {
        self.capture
            .as_ref()
            .is_some_and(|c| c.controller.is_recording())
    }

    fn on_vad(&mut self, event: &VadEvent) {
        match event {
            VadEvent::SpeechStart => {
                self.speaking = true;
                if self.active {
                    self.next_chunk();
                }
            }
            VadEvent::SpeechEnd => {
                self.speaking = false;
                let hangover = self.recording.stop_hangover;
                if let Some(capture) = self.capture.as_mut() {
                    capture.controller.schedule_stop_from_vad(hangover);
                }
            }
            VadEvent::Level(_) => {}
        }
    }

    fn on_timer(&mut self, fired: TimerFired) -> bool {
        if self.restart.accept(fired) {
            if self.active && self.capture.is_none() {
                if let Err(e) = self.acquire() {
                    tracing::warn!(error = %e, "server stt restart failed");
                    self.schedule_restart(self.recording.restart_delay);
                }
            }
            return true;
        }

        let finished = match self.capture.as_mut() {
            Some(capture) => capture.controller.on_timer(fired),
            None => return false,
        };

        match finished {
            Some(chunk) => {
                self.handle_chunk(chunk);
                true
            }
            None => false,
        }
    }

    fn set_language(&mut self, language: &str) {
        self.language = language.to_string();
    }

    fn configure_vad(&mut self, config: VadConfig) -> Result<()> {
        config.validate()?;
        if let Some(capture) = &self.capture {
            capture.bridge.configure_vad(config)?;
        }
        self.vad = config;
        Ok(())
    }
}

impl Drop for ServerProvider {
    fn drop(&mut self) {
        self.release();
    }
}
