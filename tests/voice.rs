//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::io::Cursor;
use std::time::Duration;

use voice_assist::events::{Event, inbox};
use voice_assist::timer::TimerKind;
use voice_assist::voice::{
    AudioChunk, ChunkRecorder, RecognitionEvent, RecognizerRole, RecordingController, SAMPLE_RATE,
    StopReason, TypedSpeech, VadConfig, VadEvent, VadProcessor, WakeWordDetector,
    extract_command, rms, samples_to_wav,
};

mod common;

use common::{silence, sine};

fn detector(speech: &TypedSpeech) -> (WakeWordDetector, voice_assist::events::InboxReceiver) {
    let (tx, rx) = inbox();
    let detector = WakeWordDetector::new(
        "  Hey JAVA ",
        "en-US",
        std::sync::Arc::new(speech.clone()),
        tx,
        Duration::from_millis(500),
    );
    (detector, rx)
}

#[test]
fn test_wake_word_normalization() {
    let speech = TypedSpeech::new();
    let (detector, _rx) = detector(&speech);

    assert_eq!(detector.wake_word(), "hey java");
    assert!(detector.check_wake_word("HEY JAVA, open the form"));
    assert!(!detector.check_wake_word("hey jav"));
}

#[test]
fn test_extract_command_after_wake_word() {
    assert_eq!(extract_command("Java, fill name with Ada", "java"), "fill name with Ada");
    assert_eq!(extract_command("ok JAVA. submit", "Java"), "submit");
    assert_eq!(extract_command("java", "java"), "");
    assert_eq!(extract_command("scroll down", "java"), "scroll down");
}

#[tokio::test]
async fn test_wake_word_detected_from_typed_speech() {
    let speech = TypedSpeech::new();
    let (mut detector, mut rx) = detector(&speech);

    detector.start().unwrap();
    assert!(detector.is_running());
    assert_eq!(speech.running_roles(), vec![RecognizerRole::Wake]);

    speech.say("good morning");
    speech.say("hey java scroll down");

    let mut heard = None;
    while let Ok(event) = rx.try_recv() {
        if let Event::Recognition { role, event } = event {
            assert_eq!(role, RecognizerRole::Wake);
            if let Some(rest) = detector.on_recognition(&event, true) {
                heard = Some(rest);
            }
        }
    }

    assert_eq!(heard.as_deref(), Some("scroll down"));
    assert!(!detector.is_running());
}

#[tokio::test]
async fn test_wake_word_ignored_when_not_required() {
    let speech = TypedSpeech::new();
    let (mut detector, _rx) = detector(&speech);
    detector.start().unwrap();

    let event = RecognitionEvent::Result {
        text: "hey java".to_string(),
        is_final: true,
    };
    assert_eq!(detector.on_recognition(&event, false), None);
    assert!(detector.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_wake_recognizer_restarts_after_end() {
    let speech = TypedSpeech::new();
    let (mut detector, mut rx) = detector(&speech);
    detector.start().unwrap();

    assert_eq!(speech.end_all(), 1);
    assert!(!detector.is_running());
    assert!(detector.on_recognition(&RecognitionEvent::End, true).is_none());
    assert!(detector.is_engaged());

    let fired = loop {
        match rx.recv().await {
            Some(Event::Timer(fired)) => break fired,
            Some(_) => {}
            None => panic!("inbox closed"),
        }
    };
    assert_eq!(fired.kind, TimerKind::WakeRestart);
    assert!(detector.on_timer(fired, true));
    assert!(detector.is_running());
}

#[test]
fn test_vad_speech_start_and_end() {
    let config = VadConfig {
        threshold: 0.05,
        hangover_ms: 500,
        level_interval_ms: 100,
    };
    let mut vad = VadProcessor::new(config, SAMPLE_RATE);
    let frame_len = SAMPLE_RATE as usize / 50;

    let mut events = Vec::new();
    for frame in silence(0.2).chunks(frame_len) {
        events.extend(vad.process(frame));
    }
    assert!(!events.contains(&VadEvent::SpeechStart));
    assert!(!vad.is_speaking());

    events.clear();
    for frame in sine(440.0, 0.5, 0.3).chunks(frame_len) {
        events.extend(vad.process(frame));
    }
    assert_eq!(
        events.iter().filter(|e| **e == VadEvent::SpeechStart).count(),
        1
    );
    assert!(vad.is_speaking());

    // Shorter than the hangover: still speaking
    events.clear();
    for frame in silence(0.3).chunks(frame_len) {
        events.extend(vad.process(frame));
    }
    assert!(!events.contains(&VadEvent::SpeechEnd));

    for frame in silence(0.3).chunks(frame_len) {
        events.extend(vad.process(frame));
    }
    assert!(events.contains(&VadEvent::SpeechEnd));
    assert!(!vad.is_speaking());
}

#[test]
fn test_vad_reports_levels() {
    let mut vad = VadProcessor::new(VadConfig::default(), SAMPLE_RATE);
    let frame_len = SAMPLE_RATE as usize / 100;

    let levels: Vec<f32> = sine(440.0, 1.0, 0.3)
        .chunks(frame_len)
        .flat_map(|frame| vad.process(frame))
        .filter_map(|e| match e {
            VadEvent::Level(rms) => Some(rms),
            _ => None,
        })
        .collect();

    assert_eq!(levels.len(), 10);
    assert!(levels.iter().all(|l| (l - 0.212).abs() < 0.01));
}

#[test]
fn test_vad_config_validation() {
    assert!(VadConfig::default().validate().is_ok());
    assert!(
        VadConfig {
            threshold: 0.0,
            ..VadConfig::default()
        }
        .validate()
        .is_err()
    );
    assert!(
        VadConfig {
            level_interval_ms: 0,
            ..VadConfig::default()
        }
        .validate()
        .is_err()
    );
}

#[test]
fn test_recorder_only_keeps_samples_while_recording() {
    let recorder = ChunkRecorder::new();
    recorder.push(&[0.5; 100]);
    assert!(recorder.peek().is_empty());

    recorder.start();
    recorder.push(&[0.5; 100]);
    recorder.push(&[0.25; 50]);
    assert_eq!(recorder.peek().len(), 150);

    let samples = recorder.stop();
    assert_eq!(samples.len(), 150);
    recorder.push(&[0.5; 100]);
    assert!(recorder.peek().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_vad_stop_waits_for_hangover() {
    let (tx, mut rx) = inbox();
    let recorder = ChunkRecorder::new();
    let mut controller = RecordingController::new(
        recorder.clone(),
        SAMPLE_RATE,
        Duration::from_secs(15),
        Duration::from_secs(7),
        tx,
    );

    assert!(controller.start_from_vad());
    recorder.push(&sine(440.0, 0.5, 0.3));
    controller.schedule_stop_from_vad(Duration::from_millis(1500));

    let Some(Event::Timer(fired)) = rx.recv().await else {
        panic!("expected timer");
    };
    assert_eq!(fired.kind, TimerKind::HangoverStop);

    let chunk = controller.on_timer(fired).unwrap();
    assert_eq!(chunk.reason, StopReason::SpeechEnd);
    assert_eq!(chunk.samples.len(), SAMPLE_RATE as usize / 2);
    assert!(!controller.is_recording());
}

#[test]
fn test_chunk_encoding() {
    let samples = sine(440.0, 1.0, 0.3);
    let chunk = AudioChunk::encode(&samples, SAMPLE_RATE).unwrap();

    assert_eq!(&chunk.wav[0..4], b"RIFF");
    assert_eq!(&chunk.wav[8..12], b"WAVE");
    assert!(chunk.wav.len() > samples.len() * 2);
    assert_eq!(chunk.duration(), Duration::from_secs(1));
    assert!((chunk.rms - rms(&samples)).abs() < f32::EPSILON);
    assert_eq!(chunk.id.len(), 12);
}

#[test]
fn test_chunk_resampled_to_16k() {
    let samples = vec![0.1; 48_000];
    let chunk = AudioChunk::encode(&samples, 48_000).unwrap();

    assert_eq!(chunk.sample_rate, SAMPLE_RATE);
    let len = chunk.samples.len();
    assert!((15_500..=16_500).contains(&len), "got {len} samples");
}

#[test]
fn test_wav_header() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    let cursor = Cursor::new(wav_data);
    let mut reader = hound::WavReader::new(cursor).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());
    assert_eq!(read_samples[0], 0);
    assert!(read_samples[3] > 32_000);
    assert!(read_samples[4] < -32_000);
}
