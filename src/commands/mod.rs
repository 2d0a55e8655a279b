//! Voice commands
//!
//! Final transcripts are sent to the backend parse service, which answers with
//! an `action` discriminant and its parameters. [`ActionQueue`] serializes the
//! round trips; [`CommandExecutor`] applies the result to the page.

mod executor;
mod queue;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::BackendConfig;
use crate::{Error, Result};

pub use executor::{CommandExecutor, Effect};
pub use queue::ActionQueue;

/// Actions this assistant knows how to execute
const KNOWN_ACTIONS: &[&str] = &[
    "navigate",
    "fill_field",
    "fill",
    "clear_field",
    "submit_form",
    "book_appointment",
    "refresh_page",
    "stop_listening",
    "show_numbers",
    "open_dropdown",
    "select_option",
    "dictation_control",
    "scroll_up",
    "scroll_down",
    "show_commands",
    "close_commands",
];

/// A parsed voice command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Go to `/<Page>`
    Navigate {
        /// Page name as spoken
        page: String,
    },
    /// Fill a form field by its spoken name
    FillField {
        /// Spoken field name
        field: String,
        /// Spoken value
        #[serde(default)]
        value: String,
    },
    /// Fill a field by label ("type X in Y")
    Fill {
        /// Field label
        #[serde(default)]
        label: Option<String>,
        /// Alternative to `label`
        #[serde(default)]
        field: Option<String>,
        /// Text to enter
        #[serde(default)]
        value: String,
    },
    /// Empty a field
    ClearField {
        /// Spoken field name
        field: String,
    },
    /// Submit the first form
    SubmitForm,
    /// Go to the appointments page
    BookAppointment,
    /// Reload the page
    RefreshPage,
    /// Return to wake-word mode
    StopListening,
    /// Number the visible fields
    ShowNumbers,
    /// Focus and open a select
    OpenDropdown {
        /// Spoken field name
        field: String,
    },
    /// Choose an option in the open select
    SelectOption {
        /// Spoken option
        value: String,
    },
    /// Control a dictation area
    DictationControl {
        /// Operation (e.g. "append", "clear")
        #[serde(default)]
        op: Option<String>,
        /// Target area
        #[serde(default)]
        area: Option<String>,
    },
    /// Scroll up one step
    ScrollUp,
    /// Scroll down one step
    ScrollDown,
    /// Show the command list
    ShowCommands,
    /// Hide the command list
    CloseCommands,
    /// Discriminant this assistant does not implement
    #[serde(skip)]
    Unknown {
        /// The unrecognized action
        action: String,
    },
}

impl Command {
    /// Action discriminant
    #[must_use]
    pub fn action(&self) -> &str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::FillField { .. } => "fill_field",
            Self::Fill { .. } => "fill",
            Self::ClearField { .. } => "clear_field",
            Self::SubmitForm => "submit_form",
            Self::BookAppointment => "book_appointment",
            Self::RefreshPage => "refresh_page",
            Self::StopListening => "stop_listening",
            Self::ShowNumbers => "show_numbers",
            Self::OpenDropdown { .. } => "open_dropdown",
            Self::SelectOption { .. } => "select_option",
            Self::DictationControl { .. } => "dictation_control",
            Self::ScrollUp => "scroll_up",
            Self::ScrollDown => "scroll_down",
            Self::ShowCommands => "show_commands",
            Self::CloseCommands => "close_commands",
            Self::Unknown { action } => action,
        }
    }
}

/// Result of asking the parse service about an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A command to execute
    Command(Command),
    /// The service did not understand the utterance
    NotUnderstood,
}

impl ParseOutcome {
    /// Interpret a parse service response body
    ///
    /// `{"status": "error"}` means the utterance was not understood. Unknown
    /// actions are kept as [`Command::Unknown`].
    ///
    /// # Errors
    ///
    /// Returns error if the body has no action or a known action has
    /// malformed parameters
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if value.get("status").and_then(serde_json::Value::as_str) == Some("error") {
            return Ok(Self::NotUnderstood);
        }

        let action = value
            .get("action")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::Parse("response has no action".to_string()))?
            .to_string();

        if !KNOWN_ACTIONS.contains(&action.as_str()) {
            return Ok(Self::Command(Command::Unknown { action }));
        }

        serde_json::from_value(value)
            .map(Self::Command)
            .map_err(|e| Error::Parse(format!("invalid {action} parameters: {e}")))
    }
}

/// Turns utterances into commands
#[async_trait]
pub trait CommandParser: Send + Sync {
    /// Parse one utterance
    ///
    /// # Errors
    ///
    /// Returns error on network failure or a non-2xx response
    async fn parse(&self, text: &str) -> Result<ParseOutcome>;
}

/// Client for the backend parse endpoint
#[derive(Debug, Clone)]
pub struct ParseClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl ParseClient {
    /// Create a client for `backend`
    #[must_use]
    pub fn new(backend: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: backend.endpoint("/parse"),
            timeout: backend.parse_timeout,
        }
    }

    /// Parse endpoint URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CommandParser for ParseClient {
    async fn parse(&self, text: &str) -> Result<ParseOutcome> {
        tracing::debug!(text, "parsing command");

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Parse(format!("parse endpoint error {status}: {body}")));
        }

        let body: serde_json::Value = response.json().await?;
        ParseOutcome::from_value(body)
    }
}
