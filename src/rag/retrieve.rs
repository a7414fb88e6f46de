//! Knowledge-chunk retrieval via the external workflow webhook.
//!
//! The upstream workflow does not guarantee a consistent response shape —
//! depending on which branch ran, the body may be a JSON array of chunks, an
//! object with a `chunks` field, an object with a single `reply` / `message`
//! string, some other JSON value entirely, or plain text.  [`parse_chunk_body`]
//! resolves the ambiguity with an explicit precedence order instead of
//! guessing per call site:
//!
//! 1. JSON array           → the chunk list
//! 2. object `chunks`      → that list
//! 3. object `reply` / `message` → one-element list
//! 4. any other JSON value → stringified body as a single chunk
//! 5. non-JSON content-type → raw text body as a single chunk
//!
//! An empty body parses to no chunks at all.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::RagConfig;

// ---------------------------------------------------------------------------
// RetrievalError
// ---------------------------------------------------------------------------

/// Errors from the retrieval webhook.  The pipeline treats every variant as
/// "degrade to an empty chunk list", never as a user-facing failure.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("retrieval request timed out")]
    Timeout,

    /// The webhook answered with a non-success status.
    #[error("webhook returned {status}")]
    Status { status: u16 },
}

impl From<reqwest::Error> for RetrievalError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RetrievalError::Timeout
        } else {
            RetrievalError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ChunkRetriever trait
// ---------------------------------------------------------------------------

/// Object-safe interface for knowledge-chunk retrieval.
#[async_trait]
pub trait ChunkRetriever: Send + Sync {
    /// Retrieve reference chunks for `query`.
    ///
    /// `session_id` is a fresh per-call identifier the workflow uses to keep
    /// its own state separated between invocations.
    async fn retrieve(&self, query: &str, session_id: &str)
        -> Result<Vec<String>, RetrievalError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn ChunkRetriever>) {}
};

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Render one JSON element as chunk text: strings as-is, everything else as
/// compact JSON.
fn chunk_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Apply the precedence rules to a decoded JSON body.
fn parse_chunk_value(value: &Value) -> Vec<String> {
    if let Value::Array(items) = value {
        return items.iter().map(chunk_text).collect();
    }

    if let Some(Value::Array(items)) = value.get("chunks") {
        return items.iter().map(chunk_text).collect();
    }

    for key in ["reply", "message"] {
        if let Some(text) = value.get(key).and_then(Value::as_str) {
            return vec![text.to_string()];
        }
    }

    vec![value.to_string()]
}

/// Parse a webhook response body into a chunk list.
///
/// `is_json` reflects the response's content-type; a non-JSON body is used
/// verbatim as a single chunk.
pub fn parse_chunk_body(is_json: bool, body: &str) -> Vec<String> {
    if body.trim().is_empty() {
        return Vec::new();
    }

    if !is_json {
        return vec![body.to_string()];
    }

    match serde_json::from_str::<Value>(body) {
        Ok(value) => parse_chunk_value(&value),
        // Mislabelled content-type — fall back to the raw text.
        Err(_) => vec![body.to_string()],
    }
}

// ---------------------------------------------------------------------------
// WebhookRetriever
// ---------------------------------------------------------------------------

/// Retrieves chunks from the configured workflow webhook.
pub struct WebhookRetriever {
    client: reqwest::Client,
    config: RagConfig,
}

impl WebhookRetriever {
    /// Build a `WebhookRetriever` from application config.
    pub fn from_config(config: &RagConfig) -> Self {
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
impl ChunkRetriever for WebhookRetriever {
    async fn retrieve(
        &self,
        query: &str,
        session_id: &str,
    ) -> Result<Vec<String>, RetrievalError> {
        let body = serde_json::json!({
            "user_query": query,
            "sessionId": session_id,
        });

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::Status {
                status: status.as_u16(),
            });
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("json"));

        let text = response.text().await?;
        let chunks = parse_chunk_body(is_json, &text);
        log::debug!("retrieval: {} chunk(s) for session {session_id}", chunks.len());
        Ok(chunks)
    }
}

// ---------------------------------------------------------------------------
// Test doubles  (test-only)
// ---------------------------------------------------------------------------

/// A retriever that returns fixed chunks and records the queries it saw.
#[cfg(test)]
pub struct MockRetriever {
    response: Result<Vec<String>, u16>,
    pub calls: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl MockRetriever {
    /// Always succeed with `chunks`.
    pub fn ok(chunks: Vec<String>) -> Self {
        Self {
            response: Ok(chunks),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Always fail with the given HTTP status.
    pub fn failing(status: u16) -> Self {
        Self {
            response: Err(status),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ChunkRetriever for MockRetriever {
    async fn retrieve(
        &self,
        query: &str,
        session_id: &str,
    ) -> Result<Vec<String>, RetrievalError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), session_id.to_string()));
        match &self.response {
            Ok(chunks) => Ok(chunks.clone()),
            Err(status) => Err(RetrievalError::Status { status: *status }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- parse_chunk_body precedence ---

    #[test]
    fn json_array_becomes_chunk_list() {
        let chunks = parse_chunk_body(true, r#"["a","b"]"#);
        assert_eq!(chunks, vec!["a", "b"]);
    }

    #[test]
    fn chunks_field_takes_precedence_over_reply() {
        let chunks = parse_chunk_body(true, r#"{"chunks":["p","q"],"reply":"x"}"#);
        assert_eq!(chunks, vec!["p", "q"]);
    }

    #[test]
    fn reply_field_wraps_single_chunk() {
        let chunks = parse_chunk_body(true, r#"{"reply":"x"}"#);
        assert_eq!(chunks, vec!["x"]);
    }

    #[test]
    fn message_field_wraps_single_chunk() {
        let chunks = parse_chunk_body(true, r#"{"message":"calming tea helps"}"#);
        assert_eq!(chunks, vec!["calming tea helps"]);
    }

    #[test]
    fn unknown_json_is_stringified_whole() {
        let chunks = parse_chunk_body(true, r#"{"status":"ok","count":2}"#);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("\"status\""));
    }

    #[test]
    fn non_json_content_type_uses_raw_text() {
        let chunks = parse_chunk_body(false, "hello");
        assert_eq!(chunks, vec!["hello"]);
    }

    #[test]
    fn json_content_type_with_invalid_body_uses_raw_text() {
        let chunks = parse_chunk_body(true, "not json at all");
        assert_eq!(chunks, vec!["not json at all"]);
    }

    #[test]
    fn empty_body_yields_no_chunks() {
        assert!(parse_chunk_body(true, "").is_empty());
        assert!(parse_chunk_body(false, "   ").is_empty());
    }

    #[test]
    fn non_string_array_elements_are_stringified() {
        let chunks = parse_chunk_body(true, r#"[{"text":"a"},42]"#);
        assert_eq!(chunks, vec![r#"{"text":"a"}"#.to_string(), "42".to_string()]);
    }

    // ---- trait plumbing ---

    #[test]
    fn webhook_retriever_is_object_safe() {
        let retriever: Box<dyn ChunkRetriever> =
            Box::new(WebhookRetriever::from_config(&RagConfig::default()));
        drop(retriever);
    }

    #[tokio::test]
    async fn mock_records_query_and_session() {
        let mock = MockRetriever::ok(vec!["c".into()]);
        let chunks = mock.retrieve("sleep", "s-1").await.unwrap();
        assert_eq!(chunks, vec!["c"]);
        assert_eq!(
            mock.calls.lock().unwrap().as_slice(),
            [("sleep".to_string(), "s-1".to_string())]
        );
    }

    #[tokio::test]
    async fn failing_mock_reports_status() {
        let mock = MockRetriever::failing(500);
        let err = mock.retrieve("sleep", "s-1").await.unwrap_err();
        assert!(matches!(err, RetrievalError::Status { status: 500 }));
    }
}
