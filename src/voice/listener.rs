//! Microphone recognizers
//!
//! Utterances are cut from the live stream by energy detection, encoded and
//! transcribed by the backend. Text comes back as a final result, so these
//! recognizers never report interim text.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;

use super::capture::{AudioSource, AudioSourceFactory};
use super::encoder::AudioChunk;
use super::recognizer::{
    RecognitionEvent, RecognitionSink, Recognizer, RecognizerFactory, RecognizerRole,
};
use super::vad::{VadConfig, VadEvent, VadProcessor};
use crate::config::RecordingConfig;
use crate::stt::HttpTranscriber;
use crate::{Error, Result};

/// Shorter utterances are clicks and breaths, not speech
const MIN_UTTERANCE: Duration = Duration::from_millis(300);

/// How often a running recognizer checks its stream
const STREAM_CHECK: Duration = Duration::from_millis(250);

type SharedSource = Arc<Mutex<Box<dyn AudioSource>>>;

fn samples_for(duration: Duration, sample_rate: u32) -> usize {
    usize::try_from(duration.as_millis() * u128::from(sample_rate) / 1000).unwrap_or(usize::MAX)
}

/// Cuts utterances out of a mono stream
#[derive(Debug)]
pub struct UtteranceSegmenter {
    vad: VadProcessor,
    buffer: Vec<f32>,
    min_samples: usize,
    max_samples: usize,
}

impl UtteranceSegmenter {
    /// Segment a stream at `sample_rate`; utterances longer than `max` are split
    #[must_use]
    pub fn new(config: VadConfig, sample_rate: u32, max: Duration) -> Self {
        Self {
            vad: VadProcessor::new(config, sample_rate),
            buffer: Vec::new(),
            min_samples: samples_for(
                MIN_UTTERANCE + Duration::from_millis(config.hangover_ms),
                sample_rate,
            ),
            max_samples: samples_for(max, sample_rate),
        }
    }

    /// Feed one frame
    ///
    /// Returns the utterance once speech ends or the buffer reaches its
    /// ceiling. The trailing hangover silence is part of the utterance; less
    /// than [`MIN_UTTERANCE`] of speech before it is dropped.
    pub fn push(&mut self, frame: &[f32]) -> Option<Vec<f32>> {
        let was_speaking = self.vad.is_speaking();
        let ended = self.vad.process(frame).contains(&VadEvent::SpeechEnd);

        if was_speaking || self.vad.is_speaking() {
            self.buffer.extend_from_slice(frame);
        }

        if !ended && self.buffer.len() < self.max_samples {
            return None;
        }

        let utterance = std::mem::take(&mut self.buffer);
        if utterance.len() < self.min_samples {
            tracing::trace!(samples = utterance.len(), "utterance too short, dropped");
            return None;
        }

        tracing::debug!(samples = utterance.len(), ended, "utterance complete");
        Some(utterance)
    }
}

struct Shared {
    sources: Arc<dyn AudioSourceFactory>,
    device: Option<String>,
    vad: VadConfig,
    max_utterance: Duration,
    silence_rms: f32,
    transcriber: HttpTranscriber,
}

/// Recognizers listening on the microphone
///
/// Every utterance is posted to the transcription endpoint; wake and
/// dictation recognizers differ only in the role their sink carries.
pub struct MicrophoneRecognizers {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MicrophoneRecognizers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrophoneRecognizers")
            .field("device", &self.shared.device)
            .field("vad", &self.shared.vad)
            .finish_non_exhaustive()
    }
}

impl MicrophoneRecognizers {
    /// Listen on `device` (default input when `None`) through `sources`
    #[must_use]
    pub fn new(
        sources: Arc<dyn AudioSourceFactory>,
        device: Option<String>,
        vad: VadConfig,
        recording: &RecordingConfig,
        transcriber: HttpTranscriber,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                sources,
                device,
                vad,
                max_utterance: recording.max_chunk,
                silence_rms: recording.silence_rms,
                transcriber,
            }),
        }
    }
}

impl RecognizerFactory for MicrophoneRecognizers {
    fn create(
        &self,
        role: RecognizerRole,
        language: &str,
        sink: RecognitionSink,
    ) -> Result<Box<dyn Recognizer>> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Stt(format!("microphone recognizer needs a runtime: {e}")))?;
        tracing::debug!(?role, language, "microphone recognizer created");

        Ok(Box::new(MicrophoneRecognizer {
            shared: Arc::clone(&self.shared),
            language: language.to_string(),
            sink,
            runtime,
            source: None,
            epoch: Arc::new(AtomicU64::new(0)),
            running: 0,
        }))
    }
}

/// Hands finished utterances to the transcriber
#[derive(Clone)]
struct Transcription {
    shared: Arc<Shared>,
    language: String,
    sink: RecognitionSink,
    runtime: Handle,
    epoch: Arc<AtomicU64>,
    run: u64,
}

impl Transcription {
    fn is_current(&self) -> bool {
        self.epoch.load(Ordering::Acquire) == self.run
    }

    fn submit(&self, samples: &[f32], sample_rate: u32) {
        let chunk = match AudioChunk::encode(samples, sample_rate) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, "utterance encoding failed");
                return;
            }
        };
        if chunk.rms < self.shared.silence_rms {
            tracing::debug!(id = %chunk.id, rms = chunk.rms, "discarding quiet utterance");
            return;
        }

        let this = self.clone();
        self.runtime.spawn(async move {
            match this.shared.transcriber.transcribe(chunk.wav, &this.language).await {
                Ok(text) if text.trim().is_empty() => tracing::debug!("utterance was empty"),
                Ok(text) if this.is_current() => {
                    this.sink.emit(RecognitionEvent::Result {
                        text,
                        is_final: true,
                    });
                }
                Ok(text) => tracing::debug!(text = %text, "recognizer stopped, transcript dropped"),
                Err(e) => tracing::warn!(error = %e, id = %chunk.id, "utterance dropped"),
            }
        });
    }
}

struct MicrophoneRecognizer {
    shared: Arc<Shared>,
    language: String,
    sink: RecognitionSink,
    runtime: Handle,
    source: Option<SharedSource>,
    /// Bumped on every start and stop; the stream watcher bumps it when the
    /// stream dies
    epoch: Arc<AtomicU64>,
    running: u64,
}

impl MicrophoneRecognizer {
    fn release(&mut self) {
        if let Some(source) = self.source.take() {
            if let Ok(mut source) = source.lock() {
                source.detach();
                source.close();
            }
            tracing::debug!(role = ?self.sink.role(), "microphone recognizer released");
        }
    }

    fn watch(&self, source: SharedSource) {
        let epoch = Arc::clone(&self.epoch);
        let run = self.running;
        let sink = self.sink.clone();

        self.runtime.spawn(async move {
            let mut ticks = tokio::time::interval(STREAM_CHECK);
            while epoch.load(Ordering::Acquire) == run {
                ticks.tick().await;
                if source.lock().is_ok_and(|s| s.is_active()) {
                    continue;
                }
                if epoch
                    .compare_exchange(run, run + 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    tracing::warn!(role = ?sink.role(), "microphone stream ended");
                    sink.emit(RecognitionEvent::End);
                }
            }
        });
    }
}

impl Recognizer for MicrophoneRecognizer {
    fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        self.release();

        let mut source = self.shared.sources.open(self.shared.device.as_deref())?;
        let sample_rate = source.format().sample_rate;

        self.running = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let transcription = Transcription {
            shared: Arc::clone(&self.shared),
            language: self.language.clone(),
            sink: self.sink.clone(),
            runtime: self.runtime.clone(),
            epoch: Arc::clone(&self.epoch),
            run: self.running,
        };
        let mut segmenter =
            UtteranceSegmenter::new(self.shared.vad, sample_rate, self.shared.max_utterance);
        source.attach(Box::new(move |frame: &[f32]| {
            if let Some(samples) = segmenter.push(frame) {
                transcription.submit(&samples, sample_rate);
            }
        }));

        let source: SharedSource = Arc::new(Mutex::new(source));
        self.watch(Arc::clone(&source));
        self.source = Some(source);

        tracing::info!(role = ?self.sink.role(), sample_rate, "microphone recognizer started");
        self.sink.emit(RecognitionEvent::Started);
        Ok(())
    }

    fn stop(&mut self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.release();
    }

    fn is_running(&self) -> bool {
        self.source.is_some() && self.epoch.load(Ordering::Acquire) == self.running
    }
}

impl Drop for MicrophoneRecognizer {
    fn drop(&mut self) {
        self.stop();
    }
}
