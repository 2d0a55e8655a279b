//! Streaming speech recognizers
//!
//! A [`Recognizer`] is a continuous on-device recognizer: once started it
//! reports interim and final results until it ends on its own or is stopped.
//! Results are delivered through a [`RecognitionSink`] into the assistant
//! inbox, tagged with the role the recognizer was created for.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::Result;
use crate::events::{Event, Inbox};

/// What a recognizer is listening for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecognizerRole {
    /// Wake-word detector
    Wake,
    /// Browser STT provider
    Dictation,
}

/// Output of a recognizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Recognition began
    Started,
    /// Text heard
    Result {
        /// Transcript
        text: String,
        /// Final (true) or interim
        is_final: bool,
    },
    /// Recognition ended on its own
    End,
    /// Recognition failed; an `End` may follow
    Error(String),
}

/// Delivers recognizer output to the assistant
#[derive(Debug, Clone)]
pub struct RecognitionSink {
    role: RecognizerRole,
    inbox: Inbox,
}

impl RecognitionSink {
    /// Tag events with `role` and post them to `inbox`
    #[must_use]
    pub const fn new(role: RecognizerRole, inbox: Inbox) -> Self {
        Self { role, inbox }
    }

    /// Role of the owning recognizer
    #[must_use]
    pub const fn role(&self) -> RecognizerRole {
        self.role
    }

    /// Post an event; returns false once the assistant is gone
    pub fn emit(&self, event: RecognitionEvent) -> bool {
        self.inbox
            .send(Event::Recognition {
                role: self.role,
                event,
            })
            .is_ok()
    }
}

/// A continuous speech recognizer
///
/// `stop` does not emit [`RecognitionEvent::End`]; only spontaneous ends do.
pub trait Recognizer: Send {
    /// Begin recognizing
    ///
    /// # Errors
    ///
    /// Returns error if recognition cannot start (no microphone, no permission)
    fn start(&mut self) -> Result<()>;

    /// Stop recognizing
    fn stop(&mut self);

    /// Whether recognition is running
    fn is_running(&self) -> bool;
}

/// Creates recognizers for a locale
pub trait RecognizerFactory: Send + Sync {
    /// Create a recognizer reporting into `sink`
    ///
    /// # Errors
    ///
    /// Returns error if no recognizer is available for `language`
    fn create(
        &self,
        role: RecognizerRole,
        language: &str,
        sink: RecognitionSink,
    ) -> Result<Box<dyn Recognizer>>;
}

struct Registration {
    running: Weak<AtomicBool>,
    language: String,
    sink: RecognitionSink,
}

/// Recognizer hub fed with typed text
///
/// Every recognizer it creates hears the same input. The CLI feeds it from
/// stdin; tests feed it directly.
#[derive(Clone, Default)]
pub struct TypedSpeech {
    registrations: Arc<Mutex<Vec<Registration>>>,
}

impl std::fmt::Debug for TypedSpeech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedSpeech")
            .field("listeners", &self.running_roles().len())
            .finish()
    }
}

impl TypedSpeech {
    /// Create a hub with no recognizers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn each_running(&self, mut f: impl FnMut(&Registration)) -> usize {
        let Ok(mut regs) = self.registrations.lock() else {
            return 0;
        };
        regs.retain(|r| r.running.strong_count() > 0);

        let mut count = 0;
        for reg in regs.iter() {
            if reg.running.upgrade().is_some_and(|r| r.load(Ordering::Acquire)) {
                f(reg);
                count += 1;
            }
        }
        count
    }

    /// Deliver `text` as a final result to every running recognizer
    ///
    /// Returns how many recognizers heard it.
    pub fn say(&self, text: &str) -> usize {
        self.result(text, true)
    }

    /// Deliver `text` as an interim result
    pub fn say_interim(&self, text: &str) -> usize {
        self.result(text, false)
    }

    fn result(&self, text: &str, is_final: bool) -> usize {
        self.each_running(|reg| {
            tracing::trace!(role = ?reg.sink.role(), language = %reg.language, text, "typed speech");
            reg.sink.emit(RecognitionEvent::Result {
                text: text.to_string(),
                is_final,
            });
        })
    }

    /// End every running recognizer as if recognition timed out
    pub fn end_all(&self) -> usize {
        self.each_running(|reg| {
            if let Some(running) = reg.running.upgrade() {
                running.store(false, Ordering::Release);
            }
            reg.sink.emit(RecognitionEvent::End);
        })
    }

    /// Roles of the recognizers currently running
    #[must_use]
    pub fn running_roles(&self) -> Vec<RecognizerRole> {
        let mut roles = Vec::new();
        self.each_running(|reg| roles.push(reg.sink.role()));
        roles
    }
}

impl RecognizerFactory for TypedSpeech {
    fn create(
        &self,
        role: RecognizerRole,
        language: &str,
        sink: RecognitionSink,
    ) -> Result<Box<dyn Recognizer>> {
        let running = Arc::new(AtomicBool::new(false));

        if let Ok(mut regs) = self.registrations.lock() {
            regs.push(Registration {
                running: Arc::downgrade(&running),
                language: language.to_string(),
                sink: sink.clone(),
            });
        }

        Ok(Box::new(TypedRecognizer { running, sink }))
    }
}

struct TypedRecognizer {
    running: Arc<AtomicBool>,
    sink: RecognitionSink,
}

impl Recognizer for TypedRecognizer {
    fn start(&mut self) -> Result<()> {
        if !self.running.swap(true, Ordering::AcqRel) {
            self.sink.emit(RecognitionEvent::Started);
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
