//! Transcript channel wire format
//!
//! Every frame is a JSON text message `{"event": name, "data": payload}`.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A chunk is being recorded
    StartRecording,
    /// The current chunk ended
    StopRecording,
    /// An encoded chunk
    AudioChunk {
        /// WAV bytes
        audio: Vec<u8>,
        /// Always true: each chunk is a complete utterance
        #[serde(rename = "final")]
        is_final: bool,
        /// Container format
        format: String,
    },
}

impl ClientMessage {
    /// A complete WAV chunk
    #[must_use]
    pub fn wav_chunk(audio: Vec<u8>) -> Self {
        Self::AudioChunk {
            audio,
            is_final: true,
            format: "wav".to_string(),
        }
    }

    /// Event name, for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StartRecording => "start_recording",
            Self::StopRecording => "stop_recording",
            Self::AudioChunk { .. } => "audio_chunk",
        }
    }

    /// Encode as a text frame
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Server to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Handshake acknowledged
    Connected,
    /// Transcription result
    Transcript {
        /// Text heard
        text: String,
        /// Final (true) or interim
        is_final: bool,
    },
    /// Server-side failure
    Error(String),
    /// Event this client does not handle
    Other(String),
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct TranscriptPayload {
    #[serde(alias = "transcript", default)]
    text: String,
    #[serde(alias = "final", default = "default_final")]
    is_final: bool,
}

const fn default_final() -> bool {
    true
}

impl ServerMessage {
    /// Decode a text frame
    ///
    /// # Errors
    ///
    /// Returns error if the frame is not an event envelope
    pub fn parse(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)?;

        Ok(match envelope.event.as_str() {
            "connected" => Self::Connected,
            "transcript" => {
                let payload: TranscriptPayload = serde_json::from_value(envelope.data)?;
                Self::Transcript {
                    text: payload.text,
                    is_final: payload.is_final,
                }
            }
            "error" => Self::Error(error_message(&envelope.data)),
            _ => Self::Other(envelope.event),
        })
    }
}

fn error_message(data: &serde_json::Value) -> String {
    match data {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| data.to_string(), str::to_string),
        other => other.to_string(),
    }
}
