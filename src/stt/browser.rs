//! Continuous on-device recognition

use std::sync::Arc;
use std::time::Duration;

use super::{SttProvider, TranscriptEvent, TranscriptSource};
use crate::Result;
use crate::events::Inbox;
use crate::settings::SttProviderKind;
use crate::timer::{TimerFired, TimerKind, TimerSlot};
use crate::voice::{RecognitionEvent, RecognitionSink, Recognizer, RecognizerFactory, RecognizerRole};

/// STT through a continuous recognizer
///
/// Recognizers time out on their own; while the provider is active every
/// spontaneous end is followed by a delayed restart.
pub struct BrowserProvider {
    factory: Arc<dyn RecognizerFactory>,
    language: String,
    inbox: Inbox,
    recognizer: Option<Box<dyn Recognizer>>,
    active: bool,
    restart: TimerSlot,
    restart_delay: Duration,
}

impl std::fmt::Debug for BrowserProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserProvider")
            .field("language", &self.language)
            .field("active", &self.active)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl BrowserProvider {
    /// Create a stopped provider
    #[must_use]
    pub fn new(
        factory: Arc<dyn RecognizerFactory>,
        language: &str,
        inbox: Inbox,
        restart_delay: Duration,
    ) -> Self {
        Self {
            factory,
            language: language.to_string(),
            inbox,
            recognizer: None,
            active: false,
            restart: TimerSlot::new(TimerKind::ProviderRestart),
            restart_delay,
        }
    }

    fn is_running(&self) -> bool {
        self.recognizer.as_ref().is_some_and(|r| r.is_running())
    }

    fn launch(&mut self) -> Result<()> {
        if self.recognizer.is_none() {
            let sink = RecognitionSink::new(RecognizerRole::Dictation, self.inbox.clone());
            self.recognizer =
                Some(self.factory.create(RecognizerRole::Dictation, &self.language, sink)?);
        }

        if let Some(recognizer) = self.recognizer.as_mut() {
            if !recognizer.is_running() {
                recognizer.start()?;
                tracing::info!(language = %self.language, "browser recognition started");
            }
        }
        Ok(())
    }

    fn schedule_restart(&mut self) {
        if self.active && !self.is_running() {
            tracing::debug!(delay_ms = self.restart_delay.as_millis(), "browser recognition restart scheduled");
            self.restart.schedule(self.restart_delay, &self.inbox);
        }
    }
}

impl SttProvider for BrowserProvider {
    fn kind(&self) -> SttProviderKind {
        SttProviderKind::Browser
    }

    fn start(&mut self) -> Result<()> {
        self.restart.cancel();
        self.active = true;

        if let Err(e) = self.launch() {
            self.active = false;
            return Err(e);
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
        self.restart.cancel();

        if let Some(recognizer) = self.recognizer.as_mut() {
            if recognizer.is_running() {
                recognizer.stop();
                tracing::info!("browser recognition stopped");
            }
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn on_timer(&mut self, fired: TimerFired) -> bool {
        if !self.restart.accept(fired) {
            return false;
        }

        if self.active {
            if let Err(e) = self.launch() {
                tracing::warn!(error = %e, "browser recognition restart failed");
                self.schedule_restart();
            }
        }
        true
    }

    fn on_recognition(&mut self, event: &RecognitionEvent) -> Option<TranscriptEvent> {
        match event {
            RecognitionEvent::Result { text, is_final } if self.active => Some(TranscriptEvent {
                text: text.clone(),
                is_final: *is_final,
                source: TranscriptSource::Browser,
            }),
            RecognitionEvent::Error(e) => {
                tracing::warn!(error = %e, "browser recognition error");
                self.schedule_restart();
                None
            }
            RecognitionEvent::End => {
                tracing::debug!("browser recognition ended");
                self.schedule_restart();
                None
            }
            RecognitionEvent::Started | RecognitionEvent::Result { .. } => None,
        }
    }

    fn set_language(&mut self, language: &str) {
        if self.language == language {
            return;
        }

        let was_active = self.active;
        self.stop();
        self.recognizer = None;
        self.language = language.to_string();

        if was_active {
            if let Err(e) = self.start() {
                tracing::warn!(error = %e, language, "browser recognition restart failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, InboxReceiver, inbox};
    use crate::voice::TypedSpeech;

    fn provider(speech: &TypedSpeech) -> (BrowserProvider, InboxReceiver) {
        let (tx, rx) = inbox();
        let provider = BrowserProvider::new(
            Arc::new(speech.clone()),
            "en-US",
            tx,
            Duration::from_millis(500),
        );
        (provider, rx)
    }

    #[tokio::test]
    async fn test_results_become_transcripts() {
        let speech = TypedSpeech::new();
        let (mut provider, _rx) = provider(&speech);
        provider.start().unwrap();

        let event = RecognitionEvent::Result {
            text: "fill email".to_string(),
            is_final: true,
        };
        let transcript = provider.on_recognition(&event).unwrap();
        assert_eq!(transcript.text, "fill email");
        assert_eq!(transcript.source, TranscriptSource::Browser);

        provider.stop();
        assert!(provider.on_recognition(&event).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_spontaneous_end() {
        let speech = TypedSpeech::new();
        let (mut provider, mut rx) = provider(&speech);
        provider.start().unwrap();

        speech.end_all();
        provider.on_recognition(&RecognitionEvent::End);
        assert!(provider.is_active());
        assert!(speech.running_roles().is_empty());

        let fired = loop {
            match rx.recv().await {
                Some(Event::Timer(fired)) => break fired,
                Some(_) => {}
                None => panic!("inbox closed"),
            }
        };
        assert!(provider.on_timer(fired));
        assert_eq!(speech.running_roles(), vec![RecognizerRole::Dictation]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_restart() {
        let speech = TypedSpeech::new();
        let (mut provider, _rx) = provider(&speech);
        provider.start().unwrap();

        speech.end_all();
        provider.on_recognition(&RecognitionEvent::End);
        provider.stop();

        assert!(!provider.is_active());
        assert!(!provider.restart.is_armed());
    }

    #[tokio::test]
    async fn test_language_change_recreates_recognizer() {
        let speech = TypedSpeech::new();
        let (mut provider, _rx) = provider(&speech);
        provider.start().unwrap();

        provider.set_language("de-DE");
        assert!(provider.is_active());
        assert_eq!(speech.running_roles(), vec![RecognizerRole::Dictation]);
        assert_eq!(provider.language, "de-DE");
    }
}
