//! Shared test utilities

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use voice_assist::config::RecordingConfig;
use voice_assist::page::{Element, ElementKind, PageSpec, SelectOption, SiteSpec};
use voice_assist::voice::{
    AudioSource, AudioSourceFactory, FrameSink, SAMPLE_RATE, StreamFormat, TypedSpeech, VadConfig,
};
use voice_assist::{
    Assistant, AssistantHandle, ChannelHandle, CommandParser, Document, Error, ParseOutcome,
    ProviderSet, Result, Settings, SttProviderKind, inbox,
};

/// Generate sine wave audio samples
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn sine(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn silence(duration_secs: f32) -> Vec<f32> {
    vec![0.0; (SAMPLE_RATE as f32 * duration_secs) as usize]
}

type SharedSink = Arc<Mutex<Option<FrameSink>>>;

/// Microphone the test pushes frames into
#[derive(Clone, Default)]
pub struct FakeMics {
    sink: SharedSink,
    active: Arc<AtomicBool>,
    fail: Arc<AtomicBool>,
}

impl FakeMics {
    /// Deliver mono frames at [`SAMPLE_RATE`] to whoever is attached
    pub fn feed(&self, frame: &[f32]) {
        if let Some(sink) = self.sink.lock().unwrap().as_mut() {
            sink(frame);
        }
    }

    /// Whether a stream is open
    pub fn is_open(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Make the next `open` fail
    pub fn unplug(&self) {
        self.fail.store(true, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
    }
}

struct FakeMic {
    sink: SharedSink,
    active: Arc<AtomicBool>,
}

impl AudioSource for FakeMic {
    fn format(&self) -> StreamFormat {
        StreamFormat {
            sample_rate: SAMPLE_RATE,
            channels: 1,
        }
    }

    fn attach(&mut self, sink: FrameSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    fn detach(&mut self) {
        *self.sink.lock().unwrap() = None;
    }

    fn close(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl AudioSourceFactory for FakeMics {
    fn open(&self, _device: Option<&str>) -> Result<Box<dyn AudioSource>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Audio("no input device available".to_string()));
        }
        self.active.store(true, Ordering::SeqCst);
        Ok(Box::new(FakeMic {
            sink: Arc::clone(&self.sink),
            active: Arc::clone(&self.active),
        }))
    }
}

/// Parse service stand-in answering from a table
pub struct ScriptedParser {
    responses: HashMap<String, Value>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl ScriptedParser {
    /// Answer `text` with `response`; anything else is not understood
    pub fn new(responses: &[(&str, Value)]) -> Self {
        Self {
            responses: responses
                .iter()
                .map(|(text, value)| ((*text).to_string(), value.clone()))
                .collect(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Take `delay` to answer each request
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Utterances received so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandParser for ScriptedParser {
    async fn parse(&self, text: &str) -> Result<ParseOutcome> {
        self.calls.lock().unwrap().push(text.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let body = self
            .responses
            .get(text)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({"status": "error"}));
        ParseOutcome::from_value(body)
    }
}

fn input(name: &str, input_type: &str, y: f64) -> Element {
    let mut element = Element::new(ElementKind::Input, name);
    element.input_type = Some(input_type.to_string());
    element.rect.y = y;
    element
}

/// A small clinic site: home, appointments and contact pages
pub fn clinic(start: &str) -> Document {
    let mut doctor = Element::new(ElementKind::Select, "doctor");
    doctor.rect.y = 320.0;
    doctor.options = ["", "smith", "patel"]
        .iter()
        .zip(["Choose a doctor", "Dr. Smith", "Dr. Patel"])
        .map(|(value, text)| SelectOption {
            value: (*value).to_string(),
            text: text.to_string(),
        })
        .collect();

    let mut notes = Element::new(ElementKind::Textarea, "notes");
    notes.rect.y = 370.0;

    let mut disabled = input("member_id", "text", 420.0);
    disabled.disabled = true;

    let appointments = PageSpec {
        elements: vec![
            input("name", "text", 120.0),
            input("email", "email", 170.0),
            input("phone", "tel", 220.0),
            input("date", "date", 270.0),
            doctor,
            notes,
            input("csrf_token", "hidden", 0.0),
            disabled,
            Element::new(ElementKind::Button, "submit"),
        ],
        forms: 1,
    };

    let contact = PageSpec {
        elements: vec![input("first_name", "text", 120.0), input("email", "email", 170.0)],
        forms: 1,
    };

    let mut pages = HashMap::new();
    pages.insert("/".to_string(), PageSpec::default());
    pages.insert("/Appointments".to_string(), appointments);
    pages.insert("/Contact".to_string(), contact);

    Document::from_site(SiteSpec {
        start: start.to_string(),
        pages,
    })
}

/// Everything a test needs to drive an assistant
pub struct Harness {
    pub assistant: Assistant<Document>,
    pub handle: AssistantHandle,
    pub speech: TypedSpeech,
    pub mics: FakeMics,
    pub parser: Arc<ScriptedParser>,
}

/// Build an assistant over the clinic site
pub fn harness(
    kind: SttProviderKind,
    start: &str,
    parser: ScriptedParser,
    channel: Option<ChannelHandle>,
) -> Harness {
    let (tx, rx) = inbox();
    let speech = TypedSpeech::new();
    let mics = FakeMics::default();
    let parser = Arc::new(parser);

    let providers = ProviderSet {
        recognizers: Arc::new(speech.clone()),
        audio: Arc::new(mics.clone()),
        channel,
        transcriber: None,
        recording: RecordingConfig::default(),
        vad: VadConfig::default(),
        vad_enabled: false,
        device: None,
    };
    let settings = Settings::new("Java", "F9", kind, "en-US").unwrap();

    let (assistant, handle) = Assistant::new(
        settings,
        clinic(start),
        providers,
        Arc::clone(&parser) as Arc<dyn CommandParser>,
        tx,
        rx,
    );

    Harness {
        assistant,
        handle,
        speech,
        mics,
        parser,
    }
}

impl Harness {
    /// Process events until `done` holds
    pub async fn until(&mut self, done: impl Fn(&Assistant<Document>) -> bool) {
        while !done(&self.assistant) {
            let running = tokio::time::timeout(Duration::from_secs(30), self.assistant.step())
                .await
                .expect("condition not reached");
            assert!(running, "assistant shut down");
        }
    }

    /// Turn listening on and say the wake word
    pub async fn wake(&mut self) {
        self.assistant.handle(voice_assist::Event::SetListening(true));
        assert_eq!(self.speech.say("java"), 1);
        self.until(|a| a.session().is_active()).await;
    }
}
