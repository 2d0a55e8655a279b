//! Configuration management for the voice assistant
//!
//! Values are layered env > TOML file > defaults.

pub mod file;

use std::time::Duration;

use url::Url;

use crate::settings::{Settings, SttProviderKind};
use crate::voice::VadConfig;
use crate::{Error, Result};

use file::VoiceAssistConfigFile;

/// Default wake phrase
pub const DEFAULT_WAKE_WORD: &str = "Java";

/// Default pause hotkey
pub const DEFAULT_HOTKEY: &str = "F9";

/// Default recognition locale
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Default parse service base URL
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Voice assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Initial user-facing settings
    pub settings: Settings,

    /// Backend endpoints
    pub backend: BackendConfig,

    /// Voice activity detection
    pub vad: VadConfig,

    /// Whether the VAD worker runs at all
    pub vad_enabled: bool,

    /// Chunked recording limits
    pub recording: RecordingConfig,

    /// Transcript channel policy
    pub channel: ChannelConfig,

    /// Input device name (default device when `None`)
    pub device: Option<String>,
}

/// Backend endpoints
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the parse service
    pub url: String,

    /// Explicit transcript channel URL
    pub channel_url: Option<String>,

    /// Parse request timeout
    pub parse_timeout: Duration,
}

impl BackendConfig {
    /// Resolve the transcript channel URL
    ///
    /// Uses the explicit URL when set, otherwise swaps the backend scheme to
    /// `ws`/`wss` and appends `/ws`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL cannot be parsed or has an unsupported scheme
    pub fn channel_url(&self) -> Result<Url> {
        if let Some(explicit) = &self.channel_url {
            return Ok(Url::parse(explicit)?);
        }

        let mut url = Url::parse(&self.url)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::Config(format!(
                    "unsupported backend scheme: {other}"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::Config(format!("cannot use scheme {scheme}")))?;

        let path = format!("{}/ws", url.path().trim_end_matches('/'));
        url.set_path(&path);
        Ok(url)
    }

    /// URL of an endpoint under the backend base
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            channel_url: None,
            parse_timeout: Duration::from_secs(10),
        }
    }
}

/// Chunked recording limits
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Hard ceiling on one recording
    pub max_chunk: Duration,

    /// Chunk length when the VAD is unavailable
    pub manual_chunk: Duration,

    /// Debounce between speech end and recorder stop
    pub stop_hangover: Duration,

    /// Encoded chunks smaller than this are discarded
    pub min_chunk_bytes: usize,

    /// Chunks quieter than this RMS are discarded
    pub silence_rms: f32,

    /// Delay before restarting a failed recognizer or recorder
    pub restart_delay: Duration,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_chunk: Duration::from_secs(15),
            manual_chunk: Duration::from_secs(7),
            stop_hangover: Duration::from_millis(1500),
            min_chunk_bytes: 10_000,
            silence_rms: 0.01,
            restart_delay: Duration::from_millis(500),
        }
    }
}

/// Transcript channel reconnection policy
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Connection attempts before giving up
    pub reconnect_attempts: u32,

    /// Fixed delay between attempts
    pub reconnect_delay: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(1000),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            backend: BackendConfig::default(),
            vad: VadConfig::default(),
            vad_enabled: true,
            recording: RecordingConfig::default(),
            channel: ChannelConfig::default(),
            device: None,
        }
    }
}

impl Config {
    /// Load configuration from env, the TOML file and defaults
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an env lookup
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn from_sources(
        fc: VoiceAssistConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let defaults = Self::default();

        let wake_word = env("VOICE_ASSIST_WAKE_WORD")
            .or(fc.assistant.wake_word)
            .unwrap_or_else(|| DEFAULT_WAKE_WORD.to_string());
        let hotkey = env("VOICE_ASSIST_HOTKEY")
            .or(fc.assistant.hotkey)
            .unwrap_or_else(|| DEFAULT_HOTKEY.to_string());
        let stt_provider = env("VOICE_ASSIST_STT")
            .or(fc.assistant.stt_provider)
            .map(|p| p.parse::<SttProviderKind>())
            .transpose()?
            .unwrap_or_default();
        let language = env("VOICE_ASSIST_LANGUAGE")
            .or(fc.assistant.language)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let settings = Settings::new(&wake_word, &hotkey, stt_provider, &language)?;

        let backend = BackendConfig {
            url: env("VOICE_ASSIST_BACKEND_URL")
                .or(fc.backend.url)
                .unwrap_or(defaults.backend.url),
            channel_url: env("VOICE_ASSIST_CHANNEL_URL").or(fc.backend.channel_url),
            parse_timeout: fc
                .backend
                .parse_timeout_secs
                .map_or(defaults.backend.parse_timeout, Duration::from_secs),
        };

        let vad = VadConfig {
            threshold: fc.vad.threshold.unwrap_or(defaults.vad.threshold),
            hangover_ms: fc.vad.hangover_ms.unwrap_or(defaults.vad.hangover_ms),
            level_interval_ms: fc
                .vad
                .level_interval_ms
                .unwrap_or(defaults.vad.level_interval_ms),
        };
        vad.validate()?;

        let recording = RecordingConfig {
            max_chunk: fc
                .recording
                .max_chunk_secs
                .map_or(defaults.recording.max_chunk, Duration::from_secs),
            manual_chunk: fc
                .recording
                .manual_chunk_secs
                .map_or(defaults.recording.manual_chunk, Duration::from_secs),
            stop_hangover: fc
                .recording
                .stop_hangover_ms
                .map_or(defaults.recording.stop_hangover, Duration::from_millis),
            min_chunk_bytes: fc
                .recording
                .min_chunk_bytes
                .unwrap_or(defaults.recording.min_chunk_bytes),
            silence_rms: fc
                .recording
                .silence_rms
                .unwrap_or(defaults.recording.silence_rms),
            restart_delay: defaults.recording.restart_delay,
        };

        if recording.max_chunk.is_zero() {
            return Err(Error::Config("recording.max_chunk_secs must be > 0".to_string()));
        }

        let channel = ChannelConfig {
            reconnect_attempts: fc
                .channel
                .reconnect_attempts
                .unwrap_or(defaults.channel.reconnect_attempts),
            reconnect_delay: fc
                .channel
                .reconnect_delay_ms
                .map_or(defaults.channel.reconnect_delay, Duration::from_millis),
        };

        Ok(Self {
            settings,
            backend,
            vad,
            vad_enabled: fc.vad.enabled.unwrap_or(true),
            recording,
            channel,
            device: env("VOICE_ASSIST_DEVICE").or(fc.audio.device),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(VoiceAssistConfigFile::default(), no_env).unwrap();

        assert_eq!(config.settings.wake_word(), "Java");
        assert_eq!(config.settings.hotkey().as_str(), "F9");
        assert_eq!(config.settings.stt_provider(), SttProviderKind::Server);
        assert_eq!(config.settings.language(), "en-US");
        assert_eq!(config.recording.max_chunk, Duration::from_secs(15));
        assert_eq!(config.recording.min_chunk_bytes, 10_000);
        assert_eq!(config.channel.reconnect_attempts, 5);
        assert!(config.vad_enabled);
    }

    #[test]
    fn test_env_overrides_file() {
        let fc: VoiceAssistConfigFile = toml::from_str(
            r#"
            [assistant]
            wake_word = "Jarvis"
            stt_provider = "browser"
            "#,
        )
        .unwrap();

        let config = Config::from_sources(fc, |key| {
            (key == "VOICE_ASSIST_WAKE_WORD").then(|| "Friday".to_string())
        })
        .unwrap();

        assert_eq!(config.settings.wake_word(), "Friday");
        assert_eq!(config.settings.stt_provider(), SttProviderKind::Browser);
    }

    #[test]
    fn test_invalid_provider_rejected() {
        let fc: VoiceAssistConfigFile = toml::from_str(
            r#"
            [assistant]
            stt_provider = "carrier-pigeon"
            "#,
        )
        .unwrap();

        assert!(Config::from_sources(fc, no_env).is_err());
    }

    #[test]
    fn test_channel_url_derivation() {
        let backend = BackendConfig {
            url: "https://api.example.com/voice/".to_string(),
            ..BackendConfig::default()
        };
        assert_eq!(
            backend.channel_url().unwrap().as_str(),
            "wss://api.example.com/voice/ws"
        );

        let backend = BackendConfig::default();
        assert_eq!(backend.channel_url().unwrap().as_str(), "ws://localhost:5000/ws");
        assert_eq!(backend.endpoint("/parse"), "http://localhost:5000/parse");
    }

    #[test]
    fn test_explicit_channel_url_wins() {
        let backend = BackendConfig {
            channel_url: Some("ws://10.0.0.2:9000/socket".to_string()),
            ..BackendConfig::default()
        };
        assert_eq!(
            backend.channel_url().unwrap().as_str(),
            "ws://10.0.0.2:9000/socket"
        );
    }
}
