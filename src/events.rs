//! Typed events
//!
//! Every asynchronous source (VAD worker, recognizers, transcript channel,
//! timers, action queue, host input) posts an [`Event`] into the assistant's
//! single inbox. The assistant publishes [`UiEvent`]s on a broadcast channel
//! for any interested host component.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::channel::ChannelStatus;
use crate::commands::Command;
use crate::page::ElementId;
use crate::session::SessionState;
use crate::settings::SettingsUpdate;
use crate::stt::TranscriptEvent;
use crate::timer::TimerFired;
use crate::voice::{RecognitionEvent, RecognizerRole, VadConfig, VadEvent};
use crate::Result;

/// Sender side of the assistant inbox
pub type Inbox = mpsc::UnboundedSender<Event>;

/// Receiver side of the assistant inbox
pub type InboxReceiver = mpsc::UnboundedReceiver<Event>;

/// Create an assistant inbox
#[must_use]
pub fn inbox() -> (Inbox, InboxReceiver) {
    mpsc::unbounded_channel()
}

/// Input to the assistant task
#[derive(Debug)]
pub enum Event {
    /// Voice activity from the VAD worker
    Vad(VadEvent),
    /// A scheduled timer fired
    Timer(TimerFired),
    /// Output of a recognizer
    Recognition {
        /// Which recognizer produced it
        role: RecognizerRole,
        /// What happened
        event: RecognitionEvent,
    },
    /// A transcript from any STT path
    Transcript(TranscriptEvent),
    /// Transcript channel connectivity
    Channel(ChannelStatus),
    /// Parsed command from the action queue; `done` is signalled after execution
    Execute {
        /// Utterance the command was parsed from
        text: String,
        /// Command to run
        command: Command,
        /// Completion acknowledgement
        done: oneshot::Sender<()>,
    },
    /// Keyboard input from the host
    Key {
        /// Key name (e.g. "F9", "p")
        key: String,
        /// true on press, false on release
        pressed: bool,
    },
    /// A numbered badge was clicked
    BadgeClicked(u32),
    /// The page scrolled or resized
    LayoutChanged,
    /// The host navigated to a route
    Navigate(String),
    /// Listening toggled by the user
    SetListening(bool),
    /// Settings change from the settings surface
    UpdateSettings {
        /// Fields to change
        update: SettingsUpdate,
        /// Validation result
        reply: oneshot::Sender<Result<()>>,
    },
    /// New VAD tuning
    ConfigureVad(VadConfig),
    /// Request a state snapshot
    Snapshot(oneshot::Sender<Snapshot>),
    /// Stop the assistant task
    Shutdown,
}

/// Point-in-time view of the assistant
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Session state
    pub state: SessionState,
    /// Running transcript buffer
    pub transcript: String,
    /// Current route
    pub route: String,
    /// Number of badges currently shown
    pub badges: usize,
}

/// Event published to host UI components
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// A transcript accepted for command handling
    Transcript {
        /// Text heard
        text: String,
        /// Final (true) or interim
        #[serde(rename = "final")]
        is_final: bool,
    },
    /// Control event for dictation areas
    Control {
        /// Operation (e.g. "append", "clear")
        #[serde(skip_serializing_if = "Option::is_none")]
        op: Option<String>,
        /// Target area (e.g. "notes")
        #[serde(skip_serializing_if = "Option::is_none")]
        area: Option<String>,
        /// Raw utterance
        text: String,
    },
    /// Microphone level
    Level {
        /// RMS of the latest frames
        rms: f32,
    },
    /// Session state changed
    State {
        /// New state
        state: SessionState,
    },
    /// A field highlight turned on or off
    Highlight {
        /// Highlighted element
        element: ElementId,
        /// true when shown
        on: bool,
    },
    /// Show or hide the command list
    CommandsPanel {
        /// true when shown
        visible: bool,
    },
    /// A command finished executing
    Executed {
        /// Action discriminant
        action: String,
    },
    /// Transcript channel connectivity changed
    Channel {
        /// New status
        status: ChannelStatus,
    },
    /// A degraded feature the user should know about
    Error {
        /// Human-readable message
        message: String,
    },
}
