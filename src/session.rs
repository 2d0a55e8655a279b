//! Listening session state machine
//!
//! The session is the single source of truth for what the assistant is doing.
//! `listening` and `waiting_for_wake_word` are derived from [`Mode`] rather
//! than stored separately, so they can never disagree.
//!
//! ```text
//!            start            wake word / show_numbers
//!   Idle ───────────► WakeListening ─────────────► ActiveListening
//!    ▲                   ▲    ▲                       │ show_numbers
//!    │ stop              │    │ hotkey / navigate     ▼
//!    └──── any ──────────┘    └───────────────── AwaitingNumber
//!                             │ dictation applied     │ "two"
//!                             └──────────────── AwaitingDictation
//! ```

use serde::Serialize;

use crate::page::ElementId;

/// Orchestrator mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Not listening at all
    #[default]
    Idle,
    /// Only the wake-word detector runs
    WakeListening,
    /// The STT provider runs; transcripts become commands
    ActiveListening,
    /// Numbered badges are shown; the next number selects a field
    AwaitingNumber,
    /// The next final transcript is dictated into `target`
    AwaitingDictation {
        /// Field receiving the dictation
        target: ElementId,
    },
}

/// Externally visible state, including recorder activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Not listening
    #[default]
    Idle,
    /// Waiting for the wake word
    WakeListening,
    /// Listening for commands
    ActiveListening,
    /// Listening for commands with the recorder capturing a chunk
    Recording,
    /// Waiting for a spoken field number
    AwaitingNumber,
    /// Waiting for dictated text
    AwaitingDictation,
}

/// Session flags owned by the assistant task
#[derive(Debug, Clone, Default)]
pub struct Session {
    mode: Mode,
    paused: bool,
}

impl Session {
    /// Create an idle session
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: Mode::Idle,
            paused: false,
        }
    }

    /// Current mode
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the user has turned listening on
    #[must_use]
    pub const fn listening(&self) -> bool {
        !matches!(self.mode, Mode::Idle)
    }

    /// Whether only the wake-word detector should run
    #[must_use]
    pub const fn waiting_for_wake_word(&self) -> bool {
        matches!(self.mode, Mode::WakeListening)
    }

    /// Pause flag, cleared by the wake word
    #[must_use]
    pub const fn paused(&self) -> bool {
        self.paused
    }

    /// Listening, not waiting for the wake word, and not paused
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.listening() && !self.waiting_for_wake_word() && !self.paused
    }

    /// Whether a spoken number is expected
    #[must_use]
    pub const fn awaiting_number(&self) -> bool {
        matches!(self.mode, Mode::AwaitingNumber)
    }

    /// Field awaiting dictation, if any
    #[must_use]
    pub const fn dictation_target(&self) -> Option<ElementId> {
        match self.mode {
            Mode::AwaitingDictation { target } => Some(target),
            _ => None,
        }
    }

    /// External view of the session
    #[must_use]
    pub const fn state(&self, recording: bool) -> SessionState {
        match self.mode {
            Mode::Idle => SessionState::Idle,
            Mode::WakeListening => SessionState::WakeListening,
            Mode::ActiveListening if self.paused => SessionState::WakeListening,
            Mode::ActiveListening if recording => SessionState::Recording,
            Mode::ActiveListening => SessionState::ActiveListening,
            Mode::AwaitingNumber => SessionState::AwaitingNumber,
            Mode::AwaitingDictation { .. } => SessionState::AwaitingDictation,
        }
    }

    /// Turn listening on, starting in wake-word mode
    pub fn start(&mut self) {
        if !self.listening() {
            self.enter_wake_mode();
        }
    }

    /// Turn listening off
    pub fn stop(&mut self) {
        self.set(Mode::Idle, false);
    }

    /// Wait for the wake word and pause command handling
    pub fn enter_wake_mode(&mut self) {
        self.set(Mode::WakeListening, true);
    }

    /// Wake word heard: listen for commands
    pub fn wake(&mut self) {
        if self.listening() {
            self.set(Mode::ActiveListening, false);
        }
    }

    /// Expect a spoken field number, leaving wake mode if needed
    pub fn await_number(&mut self) {
        if self.listening() {
            self.set(Mode::AwaitingNumber, false);
        }
    }

    /// Expect dictation for `target`, leaving wake mode if needed
    pub fn await_dictation(&mut self, target: ElementId) {
        if self.listening() {
            self.set(Mode::AwaitingDictation { target }, false);
        }
    }

    /// Drop number/dictation expectations (route change)
    pub fn clear_pending(&mut self) {
        if matches!(
            self.mode,
            Mode::AwaitingNumber | Mode::AwaitingDictation { .. }
        ) {
            self.set(Mode::ActiveListening, self.paused);
        }
    }

    fn set(&mut self, mode: Mode, paused: bool) {
        if self.mode != mode || self.paused != paused {
            tracing::debug!(from = ?self.mode, to = ?mode, paused, "session transition");
        }
        self.mode = mode;
        self.paused = paused;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_enters_wake_mode() {
        let mut session = Session::new();
        assert!(!session.listening());

        session.start();
        assert!(session.listening());
        assert!(session.waiting_for_wake_word());
        assert!(session.paused());
        assert!(!session.is_active());
    }

    #[test]
    fn test_wake_clears_pause() {
        let mut session = Session::new();
        session.start();
        session.wake();

        assert!(session.is_active());
        assert!(!session.paused());
        assert_eq!(session.state(false), SessionState::ActiveListening);
        assert_eq!(session.state(true), SessionState::Recording);
    }

    #[test]
    fn test_wake_ignored_when_idle() {
        let mut session = Session::new();
        session.wake();
        session.await_number();
        assert_eq!(session.mode(), Mode::Idle);
    }

    #[test]
    fn test_pause_implies_waiting_after_wake_mode() {
        let mut session = Session::new();
        session.start();
        session.wake();
        session.await_number();
        session.enter_wake_mode();

        assert!(session.paused());
        assert!(session.waiting_for_wake_word());
        assert!(!session.awaiting_number());
    }

    #[test]
    fn test_clear_pending_returns_to_active() {
        let mut session = Session::new();
        session.start();
        session.await_number();
        assert!(session.is_active());

        session.clear_pending();
        assert_eq!(session.mode(), Mode::ActiveListening);
    }
}
