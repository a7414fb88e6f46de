//! Concept extraction — distils a user query into 3–5 search phrases.
//!
//! The RAG pipeline sends concepts (not the raw query) to the knowledge
//! webhook so retrieval works on topical keywords rather than conversational
//! phrasing.  Extraction is itself an LLM call; the prompt asks for a plain
//! comma-separated list and [`parse_concepts`] tolerates the usual model
//! formatting drift (newlines, stray empties, over-long lists).

use async_trait::async_trait;
use std::sync::Arc;

use crate::llm::chat::{ChatMessage, ChatOptions, ChatService, LlmError};

/// Most concepts ever passed to retrieval, regardless of model verbosity.
const MAX_CONCEPTS: usize = 5;

const EXTRACTION_PROMPT: &str = "Extract 3-5 short concept phrases from the user's \
message for a wellness knowledge-base search. Reply with ONLY the phrases, \
separated by commas — no numbering, no explanations.";

// ---------------------------------------------------------------------------
// ConceptExtractor trait
// ---------------------------------------------------------------------------

/// Object-safe interface for concept extraction.
#[async_trait]
pub trait ConceptExtractor: Send + Sync {
    /// Extract concept phrases from `query`.
    async fn extract(&self, query: &str) -> Result<Vec<String>, LlmError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn ConceptExtractor>) {}
};

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Split a model reply into concept phrases.
///
/// Commas and newlines both act as separators; entries are trimmed, empties
/// dropped, and the list capped at [`MAX_CONCEPTS`].
pub fn parse_concepts(reply: &str) -> Vec<String> {
    reply
        .split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(MAX_CONCEPTS)
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// LlmConceptExtractor
// ---------------------------------------------------------------------------

/// Concept extraction backed by any [`ChatService`].
pub struct LlmConceptExtractor {
    chat: Arc<dyn ChatService>,
    options: ChatOptions,
}

impl LlmConceptExtractor {
    /// Wrap `chat` with the fixed extraction prompt.
    ///
    /// Extraction runs with the caller-supplied options but never needs web
    /// search or code execution, so those toggles are forced off.
    pub fn new(chat: Arc<dyn ChatService>, mut options: ChatOptions) -> Self {
        options.web_search = false;
        options.code_interpreter = false;
        Self { chat, options }
    }
}

#[async_trait]
impl ConceptExtractor for LlmConceptExtractor {
    async fn extract(&self, query: &str) -> Result<Vec<String>, LlmError> {
        let messages = vec![
            ChatMessage::system(EXTRACTION_PROMPT),
            ChatMessage::user(query),
        ];

        let outcome = self.chat.complete(&messages, &self.options).await?;
        let concepts = parse_concepts(&outcome.answer);

        if concepts.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        log::debug!("concepts: extracted {:?} from query", concepts);
        Ok(concepts)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
