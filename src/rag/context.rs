//! LLM context assembly.
//!
//! The assembled message list always follows the same fixed order:
//!
//! 1. the system prompt,
//! 2. when chunks were retrieved, one synthetic user-role message carrying
//!    every chunk joined by a visible separator,
//! 3. the user's literal query.
//!
//! Token totals use the [`tokens`](crate::tokens) estimator over every
//! message's content.

use crate::llm::ChatMessage;
use crate::tokens::estimate_tokens;

/// Visible marker between chunks inside the synthetic reference message.
pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// Header line prepended to the synthetic reference message so the model
/// knows what the material is for.
const CHUNK_PREAMBLE: &str = "Reference material for answering the next question:\n\n";

/// A fully assembled conversation ready for the chat service.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmContext {
    /// Ordered messages: system prompt, optional chunk message, user query.
    pub messages: Vec<ChatMessage>,
    /// `estimate_tokens` summed over every message's content.
    pub total_tokens: usize,
}

/// Assemble an [`LlmContext`] from the fixed system prompt, the retrieved
/// chunks (possibly empty) and the literal user query.
pub fn build_llm_context(system_prompt: &str, chunks: &[String], query: &str) -> LlmContext {
    let mut messages = vec![ChatMessage::system(system_prompt)];

    if !chunks.is_empty() {
        let joined = chunks.join(CHUNK_SEPARATOR);
        messages.push(ChatMessage::user(format!("{CHUNK_PREAMBLE}{joined}")));
    }

    messages.push(ChatMessage::user(query));

    let total_tokens = messages
        .iter()
        .map(|m| estimate_tokens(&m.content))
        .sum();

    LlmContext {
        messages,
        total_tokens,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRole;

    #[test]
    fn without_chunks_context_is_system_plus_query() {
        let ctx = build_llm_context("be calm", &[], "I can't sleep");

        assert_eq!(ctx.messages.len(), 2);
        assert_eq!(ctx.messages[0].role, ChatRole::System);
        assert_eq!(ctx.messages[0].content, "be calm");
        assert_eq!(ctx.messages[1].role, ChatRole::User);
        assert_eq!(ctx.messages[1].content, "I can't sleep");
    }

    #[test]
    fn chunks_are_joined_into_one_user_message() {
        let chunks = vec!["first chunk".to_string(), "second chunk".to_string()];
        let ctx = build_llm_context("sys", &chunks, "query");

        assert_eq!(ctx.messages.len(), 3);
        assert_eq!(ctx.messages[1].role, ChatRole::User);
        assert!(ctx.messages[1].content.contains("first chunk"));
        assert!(ctx.messages[1].content.contains(CHUNK_SEPARATOR));
        assert!(ctx.messages[1].content.contains("second chunk"));
        // The literal query stays last.
        assert_eq!(ctx.messages[2].content, "query");
    }

    #[test]
    fn total_tokens_sums_every_message() {
        let ctx = build_llm_context("abcd", &[], "efgh");
        // 1 + 1
        assert_eq!(ctx.total_tokens, 2);

        let with_chunks = build_llm_context("abcd", &["ijkl".to_string()], "efgh");
        assert!(with_chunks.total_tokens > ctx.total_tokens);
    }

    #[test]
    fn query_is_passed_verbatim_not_trimmed_of_meaning() {
        let ctx = build_llm_context("sys", &[], "How do I breathe 4-7-8?");
        assert_eq!(ctx.messages.last().unwrap().content, "How do I breathe 4-7-8?");
    }
}
