//! Retrieval-augmented generation pipeline.
//!
//! # Architecture
//!
//! ```text
//! RagPipelineRunner::run(query)
//!        │
//!        ├─ query     record verbatim               (tokens.rs estimate)
//!        ├─ concepts  ConceptExtractor (llm)        → fallback: raw query
//!        ├─ chunks    ChunkRetriever   (webhook)    → fallback: no chunks
//!        ├─ context   build_llm_context             (system + chunks + query)
//!        └─ llm       ChatService                   → terminal on failure
//!
//! RagStep records ──▶ progress channel ──▶ UI progress widget
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mindchat::config::AppConfig;
//! use mindchat::llm::{ApiChatService, ChatOptions, LlmConceptExtractor};
//! use mindchat::rag::{RagPipelineRunner, WebhookRetriever};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::load().unwrap();
//!     let chat = Arc::new(ApiChatService::from_config(&config.llm));
//!     let options = ChatOptions::from_config(&config.llm, false, false);
//!
//!     let runner = RagPipelineRunner::new(
//!         Arc::new(LlmConceptExtractor::new(chat.clone(), options)),
//!         Arc::new(WebhookRetriever::from_config(&config.rag)),
//!         chat,
//!         config.features,
//!         config.rag.clone(),
//!         &config.llm,
//!     );
//!
//!     let outcome = runner.run("I can't sleep").await.unwrap();
//!     println!("{}", outcome.answer);
//! }
//! ```

pub mod context;
pub mod retrieve;
pub mod runner;
pub mod step;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use context::{build_llm_context, LlmContext, CHUNK_SEPARATOR};
pub use retrieve::{parse_chunk_body, ChunkRetriever, RetrievalError, WebhookRetriever};
pub use runner::{RagError, RagOutcome, RagPipelineRunner};
pub use step::{RagStep, RagStepData, RagStepId, RagStepStatus};

// test-only re-export so other test modules can import the mock retriever
// without `use mindchat::rag::retrieve::MockRetriever`.
#[cfg(test)]
pub use retrieve::MockRetriever;
