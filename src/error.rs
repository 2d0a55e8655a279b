//! Error types for the voice assistant

use thiserror::Error;

/// Result type alias for voice assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Voice activity detection error
    #[error("vad error: {0}")]
    Vad(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Wake word detection error
    #[error("wake word error: {0}")]
    WakeWord(String),

    /// Transcript channel error
    #[error("channel error: {0}")]
    Channel(String),

    /// Command parse error
    #[error("parse error: {0}")]
    Parse(String),

    /// Page model error (stale handle, missing element)
    #[error("page error: {0}")]
    Page(String),

    /// Assistant task is no longer running
    #[error("assistant stopped")]
    Stopped,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// WebSocket error
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// URL parsing error
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
}
