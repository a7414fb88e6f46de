//! Core `ChatService` trait and the HTTP `ApiChatService` implementation.
//!
//! The chat endpoint accepts the assembled message list plus a small config
//! object and answers with `{answer, sources?, followUpQuestions?,
//! responseTimeMs?}`.  All connection details come from
//! [`LlmConfig`](crate::config::LlmConfig); nothing is hardcoded.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the chat-completion service.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The service returned a response with no usable answer text.
    #[error("LLM returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in the conversation sent to the chat service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Options / Outcome
// ---------------------------------------------------------------------------

/// Per-request options forwarded to the chat service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOptions {
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Let the provider run a web search when the query calls for it.
    pub web_search: bool,
    /// Let the provider execute code.
    pub code_interpreter: bool,
}

impl ChatOptions {
    /// Build options from config, picking up the feature toggles.
    pub fn from_config(llm: &LlmConfig, web_search: bool, code_interpreter: bool) -> Self {
        Self {
            model: llm.model.clone(),
            temperature: llm.temperature,
            web_search,
            code_interpreter,
        }
    }
}

/// Result of one chat completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    /// The main answer text (never empty).
    pub answer: String,
    /// Suggested follow-up questions, in provider order.
    pub follow_up_questions: Vec<String>,
    /// Source references reported by the provider, if any.
    pub sources: Vec<String>,
    /// Provider-reported latency, or the locally measured round-trip time
    /// when the provider omits it.
    pub response_time_ms: u64,
}

// ---------------------------------------------------------------------------
// ChatService trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface to a chat-completion service.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn ChatService>` and called from any task.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Send `messages` and return the completed answer.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatOutcome, LlmError>;
}

// Compile-time assertion: Box<dyn ChatService> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn ChatService>) {}
};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    messages: &'a [ChatMessage],
    config: &'a ChatOptions,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponseBody {
    answer: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    follow_up_questions: Vec<String>,
    response_time_ms: Option<u64>,
}

/// Turn a decoded response body into a [`ChatOutcome`].
///
/// `measured_ms` is substituted when the provider omits `responseTimeMs`.
fn outcome_from_body(body: ChatResponseBody, measured_ms: u64) -> Result<ChatOutcome, LlmError> {
    let answer = body
        .answer
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .ok_or(LlmError::EmptyResponse)?;

    Ok(ChatOutcome {
        answer,
        follow_up_questions: body.follow_up_questions,
        sources: body.sources,
        response_time_ms: body.response_time_ms.unwrap_or(measured_ms),
    })
}

// ---------------------------------------------------------------------------
// ApiChatService
// ---------------------------------------------------------------------------

/// Calls the configured chat endpoint over HTTPS.
///
/// The `Authorization: Bearer …` header is attached **only** when
/// `config.api_key` is `Some(key)` and `key` is non-empty — safe for local
/// endpoints that require no authentication.
pub struct ApiChatService {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ApiChatService {
    /// Build an `ApiChatService` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &LlmConfig) -> Self {
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
impl ChatService for ApiChatService {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatOutcome, LlmError> {
        let body = ChatRequestBody {
            messages,
            config: options,
        };

        let mut req = self.client.post(&self.config.endpoint).json(&body);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let started = Instant::now();
        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Request(format!("{status}: {text}")));
        }

        let measured_ms = started.elapsed().as_millis() as u64;
        let parsed: ChatResponseBody = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        outcome_from_body(parsed, measured_ms)
    }
}

// ---------------------------------------------------------------------------
// MockChatService  (test-only)
// ---------------------------------------------------------------------------

/// A test double that returns a pre-configured outcome and records every
/// message list it receives.
#[cfg(test)]
pub struct MockChatService {
    response: std::sync::Mutex<Result<ChatOutcome, String>>,
    pub calls: std::sync::Mutex<Vec<Vec<ChatMessage>>>,
}

#[cfg(test)]
impl MockChatService {
    /// Create a mock that always answers `Ok` with the given text.
    pub fn ok(answer: impl Into<String>) -> Self {
        Self {
            response: std::sync::Mutex::new(Ok(ChatOutcome {
                answer: answer.into(),
                follow_up_questions: Vec::new(),
                sources: Vec::new(),
                response_time_ms: 1,
            })),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that answers with a full pre-built outcome.
    pub fn with_outcome(outcome: ChatOutcome) -> Self {
        Self {
            response: std::sync::Mutex::new(Ok(outcome)),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always fails with `LlmError::Request(message)`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: std::sync::Mutex::new(Err(message.into())),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ChatService for MockChatService {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: &ChatOptions,
    ) -> Result<ChatOutcome, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        match &*self.response.lock().unwrap() {
            Ok(outcome) => Ok(outcome.clone()),
            Err(msg) => Err(LlmError::Request(msg.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
