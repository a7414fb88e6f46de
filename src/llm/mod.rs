//! LLM services for the mindchat core.
//!
//! This module provides:
//! * [`ChatService`] — async trait implemented by all chat backends.
//! * [`ApiChatService`] — HTTP chat-completion client.
//! * [`ConceptExtractor`] / [`LlmConceptExtractor`] — query → concept phrases.
//! * [`ChatMessage`] / [`ChatRole`] / [`ChatOptions`] / [`ChatOutcome`] —
//!   request and response types shared with the RAG pipeline.
//! * [`LlmError`] — error variants for LLM operations.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use mindchat::config::AppConfig;
//! use mindchat::llm::{ApiChatService, ChatMessage, ChatOptions, ChatService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let chat = ApiChatService::from_config(&config.llm);
//!     let options = ChatOptions::from_config(&config.llm, false, false);
//!
//!     let messages = vec![
//!         ChatMessage::system("You are a calm wellness companion."),
//!         ChatMessage::user("I feel restless tonight."),
//!     ];
//!     let outcome = chat.complete(&messages, &options).await.unwrap();
//!     println!("{}", outcome.answer);
//! }
//! ```

pub mod chat;
pub mod concepts;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use chat::{
    ApiChatService, ChatMessage, ChatOptions, ChatOutcome, ChatRole, ChatService, LlmError,
};
pub use concepts::{parse_concepts, ConceptExtractor, LlmConceptExtractor};

// test-only re-export so other modules' test code can import the mock
// without `use mindchat::llm::chat::MockChatService`.
#[cfg(test)]
pub use chat::MockChatService;
