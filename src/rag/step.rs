//! Step records for the RAG pipeline progress display.
//!
//! Every pipeline run produces an ordered log of [`RagStep`]s, one per
//! pipeline stage, mirrored to an optional progress listener as statuses
//! change.  Records are serde-serializable so the UI layer can ship them to
//! a progress widget unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

// ---------------------------------------------------------------------------
// RagStepId / RagStepStatus
// ---------------------------------------------------------------------------

/// Identifies one stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagStepId {
    /// Record the literal user query.
    Query,
    /// LLM-backed concept extraction.
    Concepts,
    /// Knowledge-chunk retrieval via the external webhook.
    Chunks,
    /// Context assembly (system prompt + chunks + query).
    Context,
    /// The chat-completion call.
    Llm,
    /// Pipeline-level failure record (appended after a terminal error).
    Error,
}

/// Lifecycle of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagStepStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

// ---------------------------------------------------------------------------
// RagStepData
// ---------------------------------------------------------------------------

/// Step-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum RagStepData {
    Query {
        query: String,
        tokens: usize,
    },
    Concepts {
        concepts: Vec<String>,
    },
    Chunks {
        chunks: Vec<String>,
        tokens: usize,
    },
    Context {
        messages: Vec<ChatMessage>,
        total_tokens: usize,
    },
    Llm {
        answer: String,
        follow_up_questions: Vec<String>,
        response_time_ms: u64,
    },
    Error {
        message: String,
    },
}

// ---------------------------------------------------------------------------
// RagStep
// ---------------------------------------------------------------------------

/// One entry in the ordered pipeline step log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagStep {
    pub id: RagStepId,
    pub status: RagStepStatus,
    /// Payload, present once the step has produced (or failed to produce)
    /// something worth displaying.
    pub data: Option<RagStepData>,
    /// When the step started.
    pub timestamp: DateTime<Utc>,
}

impl RagStep {
    /// A step that has just started.
    pub fn processing(id: RagStepId) -> Self {
        Self {
            id,
            status: RagStepStatus::Processing,
            data: None,
            timestamp: Utc::now(),
        }
    }

    /// A step that finished successfully with `data`.
    pub fn completed(id: RagStepId, data: RagStepData) -> Self {
        Self {
            id,
            status: RagStepStatus::Completed,
            data: Some(data),
            timestamp: Utc::now(),
        }
    }

    /// A step that failed with a human-readable `message`.
    pub fn failed(id: RagStepId, message: impl Into<String>) -> Self {
        Self {
            id,
            status: RagStepStatus::Error,
            data: Some(RagStepData::Error {
                message: message.into(),
            }),
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
