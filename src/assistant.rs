//! The assistant task
//!
//! [`Assistant`] owns every piece of mutable state: settings, the session FSM,
//! the page, the active STT provider, the wake-word detector and the command
//! pipeline. It consumes one inbox of [`Event`]s and, after each event,
//! reconciles which recognizer should be running with the session mode.
//! Hosts talk to it through a cloneable [`AssistantHandle`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, oneshot, watch};

use crate::channel::ChannelStatus;
use crate::commands::{ActionQueue, Command, CommandExecutor, CommandParser, Effect};
use crate::events::{Event, Inbox, InboxReceiver, Snapshot, UiEvent};
use crate::hotkey::HotkeyTracker;
use crate::page::{ElementId, FieldEnumerator, Page, apply_dictation};
use crate::router::{RouteDecision, TranscriptRouter};
use crate::session::{Session, SessionState};
use crate::settings::{Settings, SettingsUpdate};
use crate::stt::{ProviderSet, SttProvider, TranscriptEvent, TranscriptSource};
use crate::timer::{TimerFired, TimerKind, TimerSlot};
use crate::voice::{RecognitionEvent, RecognizerRole, VadConfig, VadEvent, WakeWordDetector};
use crate::{Error, Result};

/// Capacity of the UI broadcast channel
const UI_CHANNEL_CAPACITY: usize = 64;

/// Voice assistant orchestrator
pub struct Assistant<P: Page> {
    settings: Settings,
    session: Session,
    page: P,
    providers: ProviderSet,
    provider: Box<dyn SttProvider>,
    wake: WakeWordDetector,
    router: TranscriptRouter,
    queue: ActionQueue,
    executor: CommandExecutor,
    enumerator: FieldEnumerator,
    hotkey: HotkeyTracker,
    highlights: HashMap<ElementId, TimerSlot>,
    inbox: Inbox,
    rx: InboxReceiver,
    ui: broadcast::Sender<UiEvent>,
    state: watch::Sender<SessionState>,
}

impl<P: Page> std::fmt::Debug for Assistant<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("settings", &self.settings)
            .field("session", &self.session)
            .field("route", &self.page.route())
            .field("provider", &self.provider.kind())
            .finish_non_exhaustive()
    }
}

impl<P: Page> Assistant<P> {
    /// Create an assistant over `page`
    ///
    /// `inbox` and `rx` must be the two ends of the same inbox; any channel
    /// in `providers` should already post into it. Must be called inside a
    /// tokio runtime.
    #[must_use]
    pub fn new(
        settings: Settings,
        page: P,
        providers: ProviderSet,
        parser: Arc<dyn CommandParser>,
        inbox: Inbox,
        rx: InboxReceiver,
    ) -> (Self, AssistantHandle) {
        let provider = providers.create(settings.stt_provider(), settings.language(), inbox.clone());
        let wake = WakeWordDetector::new(
            settings.wake_word(),
            settings.language(),
            Arc::clone(&providers.recognizers),
            inbox.clone(),
            providers.recording.restart_delay,
        );
        let queue = ActionQueue::spawn(parser, inbox.clone());
        let (ui, _) = broadcast::channel(UI_CHANNEL_CAPACITY);
        let (state, state_rx) = watch::channel(SessionState::Idle);

        let handle = AssistantHandle {
            inbox: inbox.clone(),
            ui: ui.clone(),
            state: state_rx,
        };

        tracing::info!(
            wake_word = settings.wake_word(),
            provider = %settings.stt_provider(),
            route = page.route(),
            "assistant initialized"
        );

        let assistant = Self {
            settings,
            session: Session::new(),
            page,
            providers,
            provider,
            wake,
            router: TranscriptRouter::new(),
            queue,
            executor: CommandExecutor::new(),
            enumerator: FieldEnumerator::new(),
            hotkey: HotkeyTracker::new(),
            highlights: HashMap::new(),
            inbox,
            rx,
            ui,
            state,
        };
        (assistant, handle)
    }

    /// Process events until shutdown and return the page
    pub async fn run(mut self) -> P {
        tracing::info!("assistant running");
        while self.step().await {}

        self.provider.stop();
        self.wake.stop();
        tracing::info!("assistant stopped");
        self.page
    }

    /// Process the next inbox event; returns false on shutdown
    pub async fn step(&mut self) -> bool {
        match self.rx.recv().await {
            Some(event) => self.handle(event),
            None => false,
        }
    }

    /// Process every event already queued without waiting
    ///
    /// Returns false if a shutdown was among them.
    pub fn drain(&mut self) -> bool {
        while let Ok(event) = self.rx.try_recv() {
            if !self.handle(event) {
                return false;
            }
        }
        true
    }

    /// Apply one event; returns false on shutdown
    pub fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::Vad(vad) => self.on_vad(&vad),
            Event::Timer(fired) => self.on_timer(fired),
            Event::Recognition { role, event } => self.on_recognition(role, &event),
            Event::Transcript(transcript) => self.on_transcript(&transcript),
            Event::Channel(status) => self.on_channel(status),
            Event::Execute {
                text,
                command,
                done,
            } => self.execute(&text, &command, done),
            Event::Key { key, pressed } => self.on_key(&key, pressed),
            Event::BadgeClicked(number) => self.select_number(number),
            Event::LayoutChanged => self.enumerator.reposition(&mut self.page),
            Event::Navigate(route) => {
                self.page.navigate(&route);
                self.on_page_changed();
            }
            Event::SetListening(on) => self.set_listening(on),
            Event::UpdateSettings { update, reply } => {
                let _ = reply.send(self.update_settings(update));
            }
            Event::ConfigureVad(config) => self.configure_vad(config),
            Event::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Event::Shutdown => {
                tracing::info!("shutdown requested");
                return false;
            }
        }

        self.reconcile();
        true
    }

    /// Current session
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Current settings
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The page commands act on
    #[must_use]
    pub const fn page(&self) -> &P {
        &self.page
    }

    /// Mutable access for host-side page changes
    pub const fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    /// Field numbering
    #[must_use]
    pub const fn enumerator(&self) -> &FieldEnumerator {
        &self.enumerator
    }

    /// Active STT provider
    #[must_use]
    pub fn provider(&self) -> &dyn SttProvider {
        self.provider.as_ref()
    }

    /// Wake-word detector
    #[must_use]
    pub const fn wake_detector(&self) -> &WakeWordDetector {
        &self.wake
    }

    /// Point-in-time view
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.current_state(),
            transcript: self.router.transcript().to_string(),
            route: self.page.route().to_string(),
            badges: self.enumerator.numbers().len(),
        }
    }

    fn current_state(&self) -> SessionState {
        self.session.state(self.provider.is_recording())
    }

    fn publish(&self, event: UiEvent) {
        // No subscribers is fine
        let _ = self.ui.send(event);
    }

    fn on_vad(&mut self, event: &VadEvent) {
        if let VadEvent::Level(rms) = event {
            self.publish(UiEvent::Level { rms: *rms });
        }
        self.provider.on_vad(event);
    }

    fn on_timer(&mut self, fired: TimerFired) {
        if let TimerKind::Highlight(element) = fired.kind {
            let accepted = self
                .highlights
                .get_mut(&element)
                .is_some_and(|slot| slot.accept(fired));
            if accepted {
                self.highlights.remove(&element);
                self.page.set_highlight(element, false);
                self.publish(UiEvent::Highlight { element, on: false });
            }
            return;
        }

        let required = self.session.waiting_for_wake_word();
        if !self.wake.on_timer(fired, required) && !self.provider.on_timer(fired) {
            tracing::trace!(kind = ?fired.kind, "stale timer ignored");
        }
    }

    fn on_recognition(&mut self, role: RecognizerRole, event: &RecognitionEvent) {
        match role {
            RecognizerRole::Wake => {
                let required = self.session.waiting_for_wake_word();
                if let Some(rest) = self.wake.on_recognition(event, required) {
                    self.on_wake(rest);
                }
            }
            RecognizerRole::Dictation => {
                if let Some(transcript) = self.provider.on_recognition(event) {
                    self.on_transcript(&transcript);
                }
            }
        }
    }

    fn on_wake(&mut self, rest: String) {
        self.session.wake();
        tracing::info!(rest, "woke up");

        if !rest.is_empty() {
            self.reconcile();
            self.on_transcript(&TranscriptEvent {
                text: rest,
                is_final: true,
                source: TranscriptSource::Browser,
            });
        }
    }

    fn on_transcript(&mut self, transcript: &TranscriptEvent) {
        match self.router.route(&self.session, transcript) {
            RouteDecision::Discard(reason) => {
                tracing::debug!(?reason, text = %transcript.text, "transcript discarded");
            }
            RouteDecision::SelectNumber(number) => self.select_number(number),
            RouteDecision::Dictate(text) => self.dictate(&text),
            RouteDecision::Interim(text) => {
                self.publish(UiEvent::Transcript {
                    text,
                    is_final: false,
                });
            }
            RouteDecision::Command { text, continue_in } => {
                self.publish(UiEvent::Transcript {
                    text: text.clone(),
                    is_final: true,
                });
                if continue_in {
                    self.publish(UiEvent::Control {
                        op: None,
                        area: None,
                        text: text.clone(),
                    });
                }
                if let Err(e) = self.queue.push(&text) {
                    tracing::error!(error = %e, "action queue unavailable");
                }
            }
        }
    }

    fn select_number(&mut self, number: u32) {
        let Some(target) = self.enumerator.select_by_number(&mut self.page, number) else {
            return;
        };

        if !self.session.listening() {
            self.session.start();
        }
        self.session.await_dictation(target);
    }

    fn dictate(&mut self, text: &str) {
        let Some(target) = self.session.dictation_target() else {
            return;
        };

        if let Err(e) = apply_dictation(&mut self.page, target, text) {
            tracing::warn!(error = %e, "dictation failed");
        }

        self.enumerator.clear(&mut self.page);
        self.session.enter_wake_mode();
    }

    fn on_channel(&self, status: ChannelStatus) {
        match &status {
            ChannelStatus::GaveUp => self.publish(UiEvent::Error {
                message: "Transcript channel unavailable; using HTTP transcription".to_string(),
            }),
            ChannelStatus::ServerError(message) => self.publish(UiEvent::Error {
                message: message.clone(),
            }),
            ChannelStatus::Connected | ChannelStatus::Disconnected => {}
        }
        self.publish(UiEvent::Channel { status });
    }

    fn execute(&mut self, text: &str, command: &Command, done: oneshot::Sender<()>) {
        if !self.session.listening() {
            tracing::debug!(action = command.action(), "assistant stopped, command skipped");
            let _ = done.send(());
            return;
        }

        let effects = self
            .executor
            .execute(text, command, &mut self.page, &mut self.enumerator);
        for effect in effects {
            self.apply(effect);
        }

        self.publish(UiEvent::Executed {
            action: command.action().to_string(),
        });
        let _ = done.send(());
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::EnterWakeMode => self.enter_wake_mode(),
            Effect::StopListening => {
                self.enter_wake_mode();
                self.router.clear();
            }
            Effect::AwaitNumber => self.session.await_number(),
            Effect::PageChanged => self.on_page_changed(),
            Effect::Highlight { element, duration } => {
                self.page.set_highlight(element, true);
                self.publish(UiEvent::Highlight { element, on: true });
                self.highlights
                    .entry(element)
                    .or_insert_with(|| TimerSlot::new(TimerKind::Highlight(element)))
                    .schedule(duration, &self.inbox);
            }
            Effect::Broadcast(event) => self.publish(event),
        }
    }

    fn enter_wake_mode(&mut self) {
        if self.session.listening() {
            self.session.enter_wake_mode();
        }
    }

    fn on_page_changed(&mut self) {
        self.enumerator.clear(&mut self.page);
        self.executor.reset();
        self.session.clear_pending();
        // Handles from the previous page are stale
        self.highlights.clear();
    }

    fn on_key(&mut self, key: &str, pressed: bool) {
        if !pressed {
            self.hotkey.key_up(self.settings.hotkey(), key);
            return;
        }

        if self.hotkey.key_down(self.settings.hotkey(), key) && self.session.listening() {
            tracing::info!(key, "hotkey pressed, waiting for wake word");
            self.session.enter_wake_mode();
        }
    }

    fn set_listening(&mut self, on: bool) {
        if on {
            self.session.start();
            tracing::info!(wake_word = self.settings.wake_word(), "listening started");
        } else {
            self.session.stop();
            self.enumerator.clear(&mut self.page);
            self.router.clear();
            tracing::info!("listening stopped");
        }
    }

    fn update_settings(&mut self, update: SettingsUpdate) -> Result<()> {
        let change = self.settings.apply(update)?;

        if change.wake_word {
            self.wake.set_wake_word(self.settings.wake_word());
        }
        if change.language {
            self.wake.set_language(self.settings.language());
            self.provider.set_language(self.settings.language());
        }
        if change.hotkey {
            self.hotkey.reset();
        }
        if change.stt_provider {
            // Old resources go before the new provider may start
            self.provider.stop();
            self.provider = self.providers.create(
                self.settings.stt_provider(),
                self.settings.language(),
                self.inbox.clone(),
            );
        }
        Ok(())
    }

    fn configure_vad(&mut self, config: VadConfig) {
        match self.provider.configure_vad(config) {
            Ok(()) => {
                self.providers.vad = config;
                tracing::info!(
                    threshold = config.threshold,
                    hangover_ms = config.hangover_ms,
                    "vad reconfigured"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "vad config rejected");
                self.publish(UiEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    /// Make the running recognizers match the session
    ///
    /// The wake detector and the provider never run together: whichever must
    /// stop is stopped before the other starts.
    fn reconcile(&mut self) {
        let want_provider = self.session.is_active();
        let want_wake = self.session.listening() && !want_provider;

        if !want_provider && self.provider.is_active() {
            self.provider.stop();
        }
        if !want_wake && self.wake.is_engaged() {
            self.wake.stop();
        }

        if want_wake && !self.wake.is_engaged() {
            if let Err(e) = self.wake.start() {
                tracing::error!(error = %e, "wake word detector unavailable, stopping");
                self.publish(UiEvent::Error {
                    message: format!("Wake word detection unavailable: {e}"),
                });
                self.session.stop();
            }
        }

        if want_provider && !self.provider.is_active() {
            if let Err(e) = self.provider.start() {
                tracing::error!(error = %e, provider = %self.provider.kind(), "stt provider unavailable");
                self.publish(UiEvent::Error {
                    message: format!("Speech recognition unavailable: {e}"),
                });
                self.session.enter_wake_mode();
                if let Err(e) = self.wake.start() {
                    tracing::error!(error = %e, "wake word detector unavailable, stopping");
                    self.session.stop();
                }
            }
        }

        self.publish_state();
    }

    fn publish_state(&self) {
        let state = self.current_state();
        if *self.state.borrow() != state {
            tracing::debug!(?state, "state changed");
            self.state.send_replace(state);
            self.publish(UiEvent::State { state });
        }
    }
}

/// Cloneable control surface of a running [`Assistant`]
#[derive(Debug, Clone)]
pub struct AssistantHandle {
    inbox: Inbox,
    ui: broadcast::Sender<UiEvent>,
    state: watch::Receiver<SessionState>,
}

impl AssistantHandle {
    fn send(&self, event: Event) -> Result<()> {
        self.inbox.send(event).map_err(|_| Error::Stopped)
    }

    /// Turn listening on or off
    ///
    /// # Errors
    ///
    /// Returns error if the assistant has stopped
    pub fn set_listening(&self, on: bool) -> Result<()> {
        self.send(Event::SetListening(on))
    }

    /// Forward a key press or release
    ///
    /// # Errors
    ///
    /// Returns error if the assistant has stopped
    pub fn key(&self, key: &str, pressed: bool) -> Result<()> {
        self.send(Event::Key {
            key: key.to_string(),
            pressed,
        })
    }

    /// A numbered badge was clicked
    ///
    /// # Errors
    ///
    /// Returns error if the assistant has stopped
    pub fn click_badge(&self, number: u32) -> Result<()> {
        self.send(Event::BadgeClicked(number))
    }

    /// The page scrolled or resized
    ///
    /// # Errors
    ///
    /// Returns error if the assistant has stopped
    pub fn layout_changed(&self) -> Result<()> {
        self.send(Event::LayoutChanged)
    }

    /// The host navigated
    ///
    /// # Errors
    ///
    /// Returns error if the assistant has stopped
    pub fn navigate(&self, route: &str) -> Result<()> {
        self.send(Event::Navigate(route.to_string()))
    }

    /// Deliver a transcript from a host-side recognizer
    ///
    /// # Errors
    ///
    /// Returns error if the assistant has stopped
    pub fn transcript(&self, event: TranscriptEvent) -> Result<()> {
        self.send(Event::Transcript(event))
    }

    /// Retune voice activity detection
    ///
    /// # Errors
    ///
    /// Returns error if the assistant has stopped
    pub fn configure_vad(&self, config: VadConfig) -> Result<()> {
        self.send(Event::ConfigureVad(config))
    }

    /// Change settings
    ///
    /// # Errors
    ///
    /// Returns error if the update is invalid or the assistant has stopped
    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Event::UpdateSettings { update, reply })?;
        rx.await.map_err(|_| Error::Stopped)?
    }

    /// Current state, transcript and route
    ///
    /// # Errors
    ///
    /// Returns error if the assistant has stopped
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Event::Snapshot(reply))?;
        rx.await.map_err(|_| Error::Stopped)
    }

    /// Stop the assistant task
    ///
    /// # Errors
    ///
    /// Returns error if the assistant has already stopped
    pub fn shutdown(&self) -> Result<()> {
        self.send(Event::Shutdown)
    }

    /// Subscribe to UI events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.ui.subscribe()
    }

    /// Latest published state
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state changes
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Raw inbox, for hosts that post their own events
    #[must_use]
    pub fn inbox(&self) -> Inbox {
        self.inbox.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::commands::ParseOutcome;
    use crate::config::RecordingConfig;
    use crate::events::inbox;
    use crate::page::{Document, Element, ElementKind, PageSpec};
    use crate::settings::SttProviderKind;
    use crate::voice::{AudioSource, AudioSourceFactory, TypedSpeech};

    struct NoMic;

    impl AudioSourceFactory for NoMic {
        fn open(&self, _device: Option<&str>) -> Result<Box<dyn AudioSource>> {
            Err(Error::Audio("no input device available".to_string()))
        }
    }

    struct Echo;

    #[async_trait]
    impl CommandParser for Echo {
        async fn parse(&self, text: &str) -> Result<ParseOutcome> {
            Ok(match text {
                "stop listening" => ParseOutcome::Command(Command::StopListening),
                _ => ParseOutcome::NotUnderstood,
            })
        }
    }

    fn assistant(speech: &TypedSpeech, kind: SttProviderKind) -> (Assistant<Document>, AssistantHandle) {
        let (tx, rx) = inbox();
        let providers = ProviderSet {
            recognizers: Arc::new(speech.clone()),
            audio: Arc::new(NoMic),
            channel: None,
            transcriber: None,
            recording: RecordingConfig::default(),
            vad: VadConfig::default(),
            vad_enabled: false,
            device: None,
        };
        let settings = Settings::new("Java", "F9", kind, "en-US").unwrap();
        let page = Document::new(
            "/",
            PageSpec {
                elements: vec![Element::new(ElementKind::Input, "name")],
                forms: 1,
            },
        );
        Assistant::new(settings, page, providers, Arc::new(Echo), tx, rx)
    }

    #[tokio::test]
    async fn test_wake_word_switches_recognizers() {
        let speech = TypedSpeech::new();
        let (mut assistant, handle) = assistant(&speech, SttProviderKind::Browser);

        assistant.handle(Event::SetListening(true));
        assert_eq!(handle.state(), SessionState::WakeListening);
        assert_eq!(speech.running_roles(), vec![RecognizerRole::Wake]);

        speech.say("hey java");
        assistant.drain();
        assert_eq!(handle.state(), SessionState::ActiveListening);
        assert_eq!(speech.running_roles(), vec![RecognizerRole::Dictation]);
    }

    #[tokio::test]
    async fn test_hotkey_returns_to_wake_mode() {
        let speech = TypedSpeech::new();
        let (mut assistant, _handle) = assistant(&speech, SttProviderKind::Browser);

        assistant.handle(Event::SetListening(true));
        speech.say("java");
        assistant.drain();
        assert!(assistant.session().is_active());

        assistant.handle(Event::Key {
            key: "f9".to_string(),
            pressed: true,
        });
        assert!(assistant.session().waiting_for_wake_word());
        assert!(assistant.session().paused());
        assert_eq!(speech.running_roles(), vec![RecognizerRole::Wake]);
    }

    #[tokio::test]
    async fn test_missing_microphone_falls_back_to_wake_mode() {
        let speech = TypedSpeech::new();
        let (mut assistant, handle) = assistant(&speech, SttProviderKind::Server);
        let mut ui = handle.subscribe();

        assistant.handle(Event::SetListening(true));
        speech.say("java");
        assistant.drain();

        assert!(assistant.session().waiting_for_wake_word());
        assert!(!assistant.provider().is_active());
        assert!(assistant.wake_detector().is_running());

        let mut saw_error = false;
        while let Ok(event) = ui.try_recv() {
            saw_error |= matches!(event, UiEvent::Error { .. });
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_transcripts_ignored_while_waiting_for_wake_word() {
        let speech = TypedSpeech::new();
        let (mut assistant, _handle) = assistant(&speech, SttProviderKind::Browser);

        assistant.handle(Event::SetListening(true));
        assistant.handle(Event::Transcript(TranscriptEvent {
            text: "submit form".to_string(),
            is_final: true,
            source: TranscriptSource::Server,
        }));
        assert_eq!(assistant.snapshot().transcript, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_listening_command() {
        let speech = TypedSpeech::new();
        let (mut assistant, _handle) = assistant(&speech, SttProviderKind::Browser);

        assistant.handle(Event::SetListening(true));
        speech.say("java");
        assistant.drain();

        speech.say("stop listening");
        while assistant.session().is_active() {
            tokio::time::timeout(Duration::from_secs(1), assistant.step())
                .await
                .unwrap();
        }

        assert!(assistant.session().waiting_for_wake_word());
        assert_eq!(assistant.snapshot().transcript, "");
        assert_eq!(speech.running_roles(), vec![RecognizerRole::Wake]);
    }

    #[tokio::test]
    async fn test_settings_update_switches_provider() {
        let speech = TypedSpeech::new();
        let (mut assistant, _handle) = assistant(&speech, SttProviderKind::Browser);

        let (reply, rx) = oneshot::channel();
        assistant.handle(Event::UpdateSettings {
            update: SettingsUpdate {
                stt_provider: Some(SttProviderKind::Server),
                wake_word: Some("computer".to_string()),
                ..SettingsUpdate::default()
            },
            reply,
        });
        rx.await.unwrap().unwrap();

        assert_eq!(assistant.provider().kind(), SttProviderKind::Server);
        assert_eq!(assistant.wake_detector().wake_word(), "computer");

        let (reply, rx) = oneshot::channel();
        assistant.handle(Event::UpdateSettings {
            update: SettingsUpdate {
                hotkey: Some("ctrl shift".to_string()),
                ..SettingsUpdate::default()
            },
            reply,
        });
        assert!(rx.await.unwrap().is_err());
        assert_eq!(assistant.settings().hotkey().as_str(), "F9");
    }
}
