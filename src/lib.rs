//! Voice Assist - Voice-controlled form assistant
//!
//! This library provides the core functionality for the assistant:
//! - Wake word detection and a pause hotkey
//! - Voice activity detection and chunked recording
//! - Speech-to-text over an on-device recognizer or the backend
//! - Command parsing and execution against a page model
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Inputs                          │
//! │  Microphone  │  Recognizers  │  Keys  │  Badges     │
//! └────────────────────┬────────────────────────────────┘
//!                      │ Event inbox
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Assistant                         │
//! │  Session  │  Wake Word  │  STT Provider  │  Router  │
//! └──────────┬─────────────────────────┬────────────────┘
//!            │ ActionQueue             │ UiEvent
//! ┌──────────▼──────────────┐ ┌────────▼────────────────┐
//! │  Parse service  │ Page  │ │      Host UI            │
//! └─────────────────────────┘ └─────────────────────────┘
//! ```

pub mod assistant;
pub mod channel;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod hotkey;
pub mod page;
pub mod router;
pub mod session;
pub mod settings;
pub mod setup;
pub mod stt;
pub mod timer;
pub mod voice;

pub use assistant::{Assistant, AssistantHandle};
pub use channel::{ChannelHandle, ChannelStatus};
pub use commands::{ActionQueue, Command, CommandExecutor, CommandParser, ParseClient, ParseOutcome};
pub use config::Config;
pub use error::{Error, Result};
pub use events::{Event, Inbox, Snapshot, UiEvent, inbox};
pub use page::{Document, ElementId, FieldEnumerator, Page};
pub use session::{Session, SessionState};
pub use settings::{Settings, SettingsUpdate, SttProviderKind};
pub use stt::{HttpTranscriber, ProviderSet, SttProvider, TranscriptEvent, TranscriptSource};
