//! User-facing assistant settings
//!
//! Settings are an explicit value owned by the assistant task. Every change goes
//! through [`Settings::apply`], which validates the update and reports what
//! changed so dependents (wake-word detector, STT provider) can be rebuilt.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::hotkey::Hotkey;
use crate::{Error, Result};

/// Which speech-to-text backend transcribes active speech
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SttProviderKind {
    /// Continuous on-device recognizer
    #[serde(alias = "webspeech", alias = "native")]
    Browser,
    /// Chunked recording transcribed by the backend
    #[default]
    #[serde(alias = "whisper")]
    Server,
}

impl SttProviderKind {
    /// Canonical name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for SttProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SttProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "browser" | "webspeech" | "native" => Ok(Self::Browser),
            "server" | "whisper" => Ok(Self::Server),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Current assistant settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    wake_word: String,
    hotkey: Hotkey,
    stt_provider: SttProviderKind,
    language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wake_word: crate::config::DEFAULT_WAKE_WORD.to_string(),
            hotkey: Hotkey::default(),
            stt_provider: SttProviderKind::default(),
            language: crate::config::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// A partial settings change
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SettingsUpdate {
    /// New wake phrase
    #[serde(default)]
    pub wake_word: Option<String>,
    /// New hotkey
    #[serde(default)]
    pub hotkey: Option<String>,
    /// New STT provider
    #[serde(default)]
    pub stt_provider: Option<SttProviderKind>,
    /// New recognition locale
    #[serde(default)]
    pub language: Option<String>,
}

/// Which settings an update actually changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct SettingsChange {
    /// Wake phrase differs
    pub wake_word: bool,
    /// Hotkey differs
    pub hotkey: bool,
    /// Provider differs
    pub stt_provider: bool,
    /// Locale differs
    pub language: bool,
}

impl SettingsChange {
    /// True when nothing changed
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.wake_word || self.hotkey || self.stt_provider || self.language)
    }
}

impl Settings {
    /// Build validated settings
    ///
    /// # Errors
    ///
    /// Returns error if the wake word or language is blank or the hotkey is invalid
    pub fn new(
        wake_word: &str,
        hotkey: &str,
        stt_provider: SttProviderKind,
        language: &str,
    ) -> Result<Self> {
        Ok(Self {
            wake_word: validate_wake_word(wake_word)?,
            hotkey: Hotkey::parse(hotkey)?,
            stt_provider,
            language: validate_language(language)?,
        })
    }

    /// Apply a partial update
    ///
    /// The update is validated as a whole; on error nothing is changed.
    ///
    /// # Errors
    ///
    /// Returns error if any provided value is invalid
    pub fn apply(&mut self, update: SettingsUpdate) -> Result<SettingsChange> {
        let wake_word = update
            .wake_word
            .as_deref()
            .map(validate_wake_word)
            .transpose()?;
        let hotkey = update.hotkey.as_deref().map(Hotkey::parse).transpose()?;
        let language = update
            .language
            .as_deref()
            .map(validate_language)
            .transpose()?;

        let mut change = SettingsChange::default();

        if let Some(wake_word) = wake_word {
            change.wake_word = wake_word != self.wake_word;
            self.wake_word = wake_word;
        }
        if let Some(hotkey) = hotkey {
            change.hotkey = hotkey != self.hotkey;
            self.hotkey = hotkey;
        }
        if let Some(provider) = update.stt_provider {
            change.stt_provider = provider != self.stt_provider;
            self.stt_provider = provider;
        }
        if let Some(language) = language {
            change.language = language != self.language;
            self.language = language;
        }

        if !change.is_empty() {
            tracing::info!(
                wake_word = %self.wake_word,
                hotkey = %self.hotkey,
                stt_provider = %self.stt_provider,
                language = %self.language,
                "settings updated"
            );
        }

        Ok(change)
    }

    /// Wake phrase as configured
    #[must_use]
    pub fn wake_word(&self) -> &str {
        &self.wake_word
    }

    /// Pause hotkey
    #[must_use]
    pub const fn hotkey(&self) -> &Hotkey {
        &self.hotkey
    }

    /// Active STT provider
    #[must_use]
    pub const fn stt_provider(&self) -> SttProviderKind {
        self.stt_provider
    }

    /// Recognition locale
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }
}

fn validate_wake_word(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Config("wake word cannot be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

fn validate_language(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
        return Err(Error::Config(format!("invalid language tag: {raw:?}")));
    }
    Ok(trimmed.to_string())
}
