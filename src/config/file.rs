//! TOML configuration file loading
//!
//! Supports `~/.config/voice-assist/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct VoiceAssistConfigFile {
    /// Wake word, hotkey, provider and language
    #[serde(default)]
    pub assistant: AssistantFileConfig,

    /// Parse service and transcript channel endpoints
    #[serde(default)]
    pub backend: BackendFileConfig,

    /// Voice activity detection tuning
    #[serde(default)]
    pub vad: VadFileConfig,

    /// Chunked recording limits
    #[serde(default)]
    pub recording: RecordingFileConfig,

    /// Transcript channel reconnection policy
    #[serde(default)]
    pub channel: ChannelFileConfig,

    /// Audio device selection
    #[serde(default)]
    pub audio: AudioFileConfig,
}

/// Assistant settings
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AssistantFileConfig {
    /// Wake phrase (e.g. "Java")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wake_word: Option<String>,

    /// Pause hotkey (e.g. "F9")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<String>,

    /// STT provider ("browser" or "server")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stt_provider: Option<String>,

    /// Recognition locale (e.g. "en-US")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Backend endpoints
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BackendFileConfig {
    /// Base URL of the parse service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Transcript channel URL; derived from `url` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_url: Option<String>,

    /// Parse request timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_timeout_secs: Option<u64>,
}

/// VAD tuning
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct VadFileConfig {
    /// Run the VAD worker; false selects fixed-length manual chunks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// RMS threshold for speech
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,

    /// Silence required before speech end, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hangover_ms: Option<u64>,

    /// Interval between level reports, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_interval_ms: Option<u64>,
}

/// Recording limits
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RecordingFileConfig {
    /// Hard ceiling on one recording, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_chunk_secs: Option<u64>,

    /// Chunk length when VAD is disabled, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_chunk_secs: Option<u64>,

    /// Debounce between speech end and recorder stop, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_hangover_ms: Option<u64>,

    /// Encoded chunks smaller than this are discarded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_chunk_bytes: Option<usize>,

    /// Chunks quieter than this RMS are discarded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silence_rms: Option<f32>,
}

/// Transcript channel policy
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ChannelFileConfig {
    /// Connection attempts before giving up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect_attempts: Option<u32>,

    /// Fixed delay between attempts, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect_delay_ms: Option<u64>,
}

/// Audio device selection
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AudioFileConfig {
    /// Input device name; default device when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VoiceAssistConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VoiceAssistConfigFile {
    let Some(path) = config_file_path() else {
        return VoiceAssistConfigFile::default();
    };

    load_config_file_from(&path)
}

/// Load a TOML config file from an explicit path
///
/// Missing or malformed files yield defaults with a warning.
pub fn load_config_file_from(path: &Path) -> VoiceAssistConfigFile {
    if !path.exists() {
        return VoiceAssistConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VoiceAssistConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VoiceAssistConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voice-assist/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-assist").join("config.toml"))
}
