//! Text-to-speech service — trait and HTTP implementation.
//!
//! The synthesis endpoint accepts `{text, voice, userId}` and answers with
//! `{ audio: "<base64>" }`.  Provider error messages are surfaced verbatim so
//! the UI can display them.  Decoded bytes are handed to the audio layer
//! as-is; format validation is the platform decoder's job.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{TtsConfig, TtsVoice};

// ---------------------------------------------------------------------------
// TtsError
// ---------------------------------------------------------------------------

/// Errors that can occur during speech synthesis.
#[derive(Debug, Error)]
pub enum TtsError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("TTS request timed out")]
    Timeout,

    /// The provider rejected the request; the message is shown to the user
    /// verbatim.
    #[error("{0}")]
    Provider(String),

    /// The response carried no audio or audio that was not valid base64.
    #[error("failed to decode TTS audio: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TtsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TtsError::Timeout
        } else {
            TtsError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// TtsService trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface to a speech-synthesis service.
#[async_trait]
pub trait TtsService: Send + Sync {
    /// Synthesize `text` with `voice` and return the raw audio bytes.
    async fn synthesize(&self, text: &str, voice: TtsVoice) -> Result<Vec<u8>, TtsError>;
}

// Compile-time assertion: Box<dyn TtsService> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn TtsService>) {}
};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TtsRequestBody<'a> {
    text: &'a str,
    voice: &'a str,
    user_id: &'a str,
}

#[derive(Deserialize)]
struct TtsResponseBody {
    audio: Option<String>,
    error: Option<String>,
}

/// Decode a response body into raw audio bytes.
fn audio_from_body(body: TtsResponseBody) -> Result<Vec<u8>, TtsError> {
    if let Some(message) = body.error {
        return Err(TtsError::Provider(message));
    }

    let encoded = body
        .audio
        .filter(|a| !a.is_empty())
        .ok_or_else(|| TtsError::Decode("response carried no audio".into()))?;

    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| TtsError::Decode(e.to_string()))
}

// ---------------------------------------------------------------------------
// ApiTtsService
// ---------------------------------------------------------------------------

/// Calls the configured synthesis endpoint.
///
/// All connection details come from [`TtsConfig`]; nothing is hardcoded.
pub struct ApiTtsService {
    client: reqwest::Client,
    config: TtsConfig,
}

impl ApiTtsService {
    /// Build an `ApiTtsService` from application config.
    pub fn from_config(config: &TtsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl TtsService for ApiTtsService {
    async fn synthesize(&self, text: &str, voice: TtsVoice) -> Result<Vec<u8>, TtsError> {
        let body = TtsRequestBody {
            text,
            voice: voice.as_str(),
            user_id: &self.config.user_id,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            // Providers put their human-readable reason in the body.
            let message = response.text().await.unwrap_or_default();
            return Err(TtsError::Provider(message));
        }

        let parsed: TtsResponseBody = response
            .json()
            .await
            .map_err(|e| TtsError::Decode(e.to_string()))?;

        let bytes = audio_from_body(parsed)?;
        log::debug!("tts: synthesized {} bytes of audio", bytes.len());
        Ok(bytes)
    }
}

// ---------------------------------------------------------------------------
// MockTtsService  (test-only)
// ---------------------------------------------------------------------------

/// A test double that returns fixed bytes after an optional delay.
///
/// The delay lets coordinator tests supersede a request mid-flight.
#[cfg(test)]
pub struct MockTtsService {
    response: Result<Vec<u8>, String>,
    delay_ms: u64,
    pub calls: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockTtsService {
    /// Create a mock that returns `bytes` immediately.
    pub fn ok(bytes: Vec<u8>) -> Self {
        Self {
            response: Ok(bytes),
            delay_ms: 0,
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that returns `bytes` after `delay_ms` milliseconds.
    pub fn slow(bytes: Vec<u8>, delay_ms: u64) -> Self {
        Self {
            response: Ok(bytes),
            delay_ms,
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always fails with a provider error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            delay_ms: 0,
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl TtsService for MockTtsService {
    async fn synthesize(&self, text: &str, _voice: TtsVoice) -> Result<Vec<u8>, TtsError> {
        self.calls.lock().unwrap().push(text.to_string());
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        match &self.response {
            Ok(bytes) => Ok(bytes.clone()),
            Err(message) => Err(TtsError::Provider(message.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
