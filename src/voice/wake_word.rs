//! Wake word detection
//!
//! A dedicated recognizer, independent of the STT provider, that runs only
//! while the assistant waits for the wake word. Heard text is checked by
//! substring containment so recognizer noise around the phrase is tolerated.

use std::sync::Arc;
use std::time::Duration;

use super::recognizer::{
    RecognitionEvent, RecognitionSink, Recognizer, RecognizerFactory, RecognizerRole,
};
use crate::Result;
use crate::events::Inbox;
use crate::timer::{TimerFired, TimerKind, TimerSlot};

/// Watches recognizer output for the wake phrase
pub struct WakeWordDetector {
    wake_word: String,
    language: String,
    factory: Arc<dyn RecognizerFactory>,
    inbox: Inbox,
    recognizer: Option<Box<dyn Recognizer>>,
    restart: TimerSlot,
    restart_delay: Duration,
}

impl std::fmt::Debug for WakeWordDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeWordDetector")
            .field("wake_word", &self.wake_word)
            .field("language", &self.language)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl WakeWordDetector {
    /// Create a detector
    ///
    /// The recognizer is created lazily on first start.
    #[must_use]
    pub fn new(
        wake_word: &str,
        language: &str,
        factory: Arc<dyn RecognizerFactory>,
        inbox: Inbox,
        restart_delay: Duration,
    ) -> Self {
        let wake_word = normalize(wake_word);
        tracing::debug!(wake_word, language, "wake word detector initialized");

        Self {
            wake_word,
            language: language.to_string(),
            factory,
            inbox,
            recognizer: None,
            restart: TimerSlot::new(TimerKind::WakeRestart),
            restart_delay,
        }
    }

    /// Check if transcribed text contains the wake word
    #[must_use]
    pub fn check_wake_word(&self, transcript: &str) -> bool {
        !self.wake_word.is_empty() && normalize(transcript).contains(&self.wake_word)
    }

    /// Start the recognizer if it is not running
    ///
    /// # Errors
    ///
    /// Returns error if the recognizer cannot be created or started
    pub fn start(&mut self) -> Result<()> {
        self.restart.cancel();

        if self.recognizer.is_none() {
            let sink = RecognitionSink::new(RecognizerRole::Wake, self.inbox.clone());
            self.recognizer = Some(self.factory.create(RecognizerRole::Wake, &self.language, sink)?);
        }

        if let Some(recognizer) = self.recognizer.as_mut() {
            if !recognizer.is_running() {
                recognizer.start()?;
                tracing::info!(wake_word = %self.wake_word, "listening for wake word");
            }
        }
        Ok(())
    }

    /// Stop the recognizer and any pending restart
    pub fn stop(&mut self) {
        self.restart.cancel();
        if let Some(recognizer) = self.recognizer.as_mut() {
            if recognizer.is_running() {
                recognizer.stop();
                tracing::debug!("wake word detector stopped");
            }
        }
    }

    /// Whether the recognizer runs
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.recognizer.as_ref().is_some_and(|r| r.is_running())
    }

    /// Running or waiting to restart
    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.is_running() || self.restart.is_armed()
    }

    /// Handle recognizer output
    ///
    /// `required` is whether the assistant still waits for the wake word.
    /// Returns `Some` when the phrase was heard; the detector has stopped
    /// itself by then. The text spoken after the phrase is carried only for a
    /// final result. An interim result is a partial utterance and yields an
    /// empty string.
    pub fn on_recognition(&mut self, event: &RecognitionEvent, required: bool) -> Option<String> {
        match event {
            RecognitionEvent::Result { text, is_final } if required => {
                if !self.check_wake_word(text) {
                    tracing::trace!(text, "no wake word");
                    return None;
                }
                tracing::info!(wake_word = %self.wake_word, transcript = %text, is_final, "wake word detected");
                self.stop();
                Some(if *is_final {
                    extract_command(text, &self.wake_word)
                } else {
                    String::new()
                })
            }
            RecognitionEvent::Error(e) => {
                tracing::warn!(error = %e, "wake word recognizer error");
                self.schedule_restart(required);
                None
            }
            RecognitionEvent::End => {
                self.schedule_restart(required);
                None
            }
            RecognitionEvent::Started | RecognitionEvent::Result { .. } => None,
        }
    }

    fn schedule_restart(&mut self, required: bool) {
        if required && !self.is_running() {
            tracing::debug!(delay_ms = self.restart_delay.as_millis(), "wake word restart scheduled");
            self.restart.schedule(self.restart_delay, &self.inbox);
        }
    }

    /// Handle a timer firing; returns false if it was not ours
    pub fn on_timer(&mut self, fired: TimerFired, required: bool) -> bool {
        if !self.restart.accept(fired) {
            return false;
        }
        if required && !self.is_running() {
            if let Err(e) = self.start() {
                tracing::warn!(error = %e, "wake word restart failed");
                self.schedule_restart(required);
            }
        }
        true
    }

    /// Change the wake phrase
    pub fn set_wake_word(&mut self, wake_word: &str) {
        self.wake_word = normalize(wake_word);
        tracing::info!(wake_word = %self.wake_word, "wake word changed");
    }

    /// Change the locale; the recognizer is recreated on next start
    pub fn set_language(&mut self, language: &str) {
        self.stop();
        self.recognizer = None;
        self.language = language.to_string();
    }

    /// Normalized wake phrase
    #[must_use]
    pub fn wake_word(&self) -> &str {
        &self.wake_word
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Text spoken after the wake phrase
///
/// Returns the whole transcript when the phrase is absent.
#[must_use]
pub fn extract_command(transcript: &str, wake_word: &str) -> String {
    find_ignore_case(transcript, wake_word.trim()).map_or_else(
        || transcript.to_string(),
        |(_, end)| {
            transcript
                .get(end..)
                .unwrap_or_default()
                .trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == '.')
                .trim_end()
                .to_string()
        },
    )
}

/// Byte range of the first case-insensitive occurrence of `needle`
///
/// Matching is char by char on `haystack`, so the range always lies on its
/// char boundaries.
fn find_ignore_case(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return None;
    }

    haystack.char_indices().find_map(|(start, _)| {
        let mut matched = 0;
        for (offset, c) in haystack.get(start..)?.char_indices() {
            for lower in c.to_lowercase() {
                if needle.get(matched) != Some(&lower) {
                    return None;
                }
                matched += 1;
            }
            if matched == needle.len() {
                return Some((start, start + offset + c.len_utf8()));
            }
        }
        None
    })
}
