//! One-shot chunk transcription over HTTP
//!
//! Used when the transcript channel is down, and by the diagnose command.

use serde::Deserialize;

use super::{TranscriptEvent, TranscriptSource};
use crate::config::BackendConfig;
use crate::events::{Event, Inbox};
use crate::{Error, Result};

#[derive(Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    error: Option<String>,
}

/// Posts WAV chunks to the backend's transcription endpoints
#[derive(Debug, Clone)]
pub struct HttpTranscriber {
    client: reqwest::Client,
    transcribe_url: String,
    debug_audio_url: String,
}

impl HttpTranscriber {
    /// Create a transcriber for `backend`
    #[must_use]
    pub fn new(backend: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            transcribe_url: backend.endpoint("/api/whisper-transcribe"),
            debug_audio_url: backend.endpoint("/api/save-debug-audio"),
        }
    }

    fn form(wav: Vec<u8>, file_name: &str) -> Result<reqwest::multipart::Form> {
        Ok(reqwest::multipart::Form::new().part(
            "audio",
            reqwest::multipart::Part::bytes(wav)
                .file_name(file_name.to_string())
                .mime_str("audio/wav")
                .map_err(|e| Error::Stt(e.to_string()))?,
        ))
    }

    /// Transcribe one WAV chunk
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the backend reports an error
    pub async fn transcribe(&self, wav: Vec<u8>, language: &str) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "starting http transcription");

        let form = Self::form(wav, "recording.wav")?.text("language", language.to_string());

        let response = self
            .client
            .post(&self.transcribe_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription endpoint error");
            return Err(Error::Stt(format!("transcription error {status}: {body}")));
        }

        let result: TranscribeResponse = response.json().await?;
        if let Some(error) = result.error {
            return Err(Error::Stt(error));
        }

        tracing::info!(transcript = %result.transcript, "http transcription complete");
        Ok(result.transcript)
    }

    /// Transcribe in the background and post the result to `inbox`
    ///
    /// Empty transcripts and failures are logged and dropped.
    pub fn spawn(&self, wav: Vec<u8>, language: &str, inbox: Inbox) {
        let this = self.clone();
        let language = language.to_string();

        tokio::spawn(async move {
            match this.transcribe(wav, &language).await {
                Ok(text) if !text.trim().is_empty() => {
                    let _ = inbox.send(Event::Transcript(TranscriptEvent {
                        text,
                        is_final: true,
                        source: TranscriptSource::Server,
                    }));
                }
                Ok(_) => tracing::debug!("http transcription was empty"),
                Err(e) => tracing::warn!(error = %e, "chunk dropped"),
            }
        });
    }

    /// Upload a recording for inspection and return the backend's report
    ///
    /// # Errors
    ///
    /// Returns error if the upload fails
    pub async fn save_debug_audio(&self, wav: Vec<u8>) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(&self.debug_audio_url)
            .multipart(Self::form(wav, "diagnostic.wav")?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let message = body
                .get("error")
                .and_then(serde_json::Value::as_str)
                .map_or_else(|| format!("HTTP {status}"), str::to_string);
            return Err(Error::Stt(message));
        }

        Ok(response.json().await?)
    }
}
