//! Voice processing module
//!
//! Microphone capture, voice activity detection, chunked recording and
//! encoding, plus the recognizer abstraction the wake word detector and the
//! on-device STT provider share, with microphone and typed implementations.

mod bridge;
mod capture;
mod encoder;
mod listener;
mod recognizer;
mod recorder;
mod vad;
mod wake_word;

pub use bridge::{AudioBridge, SourceHandle};
pub use capture::{
    AudioSource, AudioSourceFactory, CpalSource, CpalSourceFactory, FrameSink, StreamFormat,
    list_input_devices,
};
pub use encoder::{AudioChunk, SAMPLE_RATE, downmix, resample, rms, samples_to_wav};
pub use listener::{MicrophoneRecognizers, UtteranceSegmenter};
pub use recognizer::{
    RecognitionEvent, RecognitionSink, Recognizer, RecognizerFactory, RecognizerRole, TypedSpeech,
};
pub use recorder::{ChunkRecorder, FinishedChunk, RecordingController, StopReason};
pub use vad::{InboxVadListener, VadConfig, VadEvent, VadInput, VadListener, VadProcessor, VadWorker};
pub use wake_word::{WakeWordDetector, extract_command};
