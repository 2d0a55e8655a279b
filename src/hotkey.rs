//! Pause hotkey handling
//!
//! A hotkey is a single character key or a function key (`F1`..`F24`).
//! Pressing it while listening forces the assistant back into wake-word mode.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A normalized hotkey name (uppercase)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hotkey(String);

impl Hotkey {
    /// Parse a hotkey from user input
    ///
    /// # Errors
    ///
    /// Returns error if the key is empty, contains whitespace, or is neither a
    /// single character nor a function key
    pub fn parse(raw: &str) -> Result<Self> {
        let key = raw.trim().to_uppercase();

        if key.is_empty() {
            return Err(Error::Config("hotkey cannot be empty".to_string()));
        }

        if key.chars().count() == 1 || is_function_key(&key) {
            return Ok(Self(key));
        }

        Err(Error::Config(format!(
            "hotkey must be a single key or F1-F24, got {raw:?}"
        )))
    }

    /// Check whether a key name from the host matches this hotkey
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        key.trim().to_uppercase() == self.0
    }

    /// The normalized key name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Hotkey {
    fn default() -> Self {
        Self(crate::config::DEFAULT_HOTKEY.to_string())
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Hotkey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Hotkey> for String {
    fn from(value: Hotkey) -> Self {
        value.0
    }
}

fn is_function_key(key: &str) -> bool {
    key.strip_prefix('F')
        .and_then(|n| n.parse::<u8>().ok())
        .is_some_and(|n| (1..=24).contains(&n))
}

/// Tracks key state so a held key fires once
#[derive(Debug, Default)]
pub struct HotkeyTracker {
    pressed: bool,
}

impl HotkeyTracker {
    /// Create a tracker with the key released
    #[must_use]
    pub const fn new() -> Self {
        Self { pressed: false }
    }

    /// Record a key press; returns true on the first press of the hotkey
    pub fn key_down(&mut self, hotkey: &Hotkey, key: &str) -> bool {
        if !hotkey.matches(key) || self.pressed {
            return false;
        }
        self.pressed = true;
        true
    }

    /// Record a key release
    pub fn key_up(&mut self, hotkey: &Hotkey, key: &str) {
        if hotkey.matches(key) {
            self.pressed = false;
        }
    }

    /// Forget any held key (after a hotkey change)
    pub const fn reset(&mut self) {
        self.pressed = false;
    }
}
