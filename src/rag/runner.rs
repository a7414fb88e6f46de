//! RAG pipeline orchestrator — drives the query → concepts → chunks →
//! context → LLM sequence.
//!
//! # Pipeline flow
//!
//! ```text
//! run(query)
//!   ├─ query     record verbatim + token estimate          [always completed]
//!   ├─ concepts  LLM concept extraction                    [rag_enabled only]
//!   │              └─ Err → step error, fall back to the raw query
//!   ├─ chunks    webhook retrieval (fresh uuid session)    [rag_enabled only]
//!   │              └─ Err → step error, fall back to no chunks
//!   ├─ context   system prompt + joined chunks + query
//!   └─ llm       chat completion
//!                  └─ Err → TERMINAL: error step + Err(RagError::Llm)
//! ```
//!
//! Steps run strictly in order; no step starts before the previous one has
//! settled.  Retrieval failures degrade to plain LLM chat — only the final
//! LLM call can fail the user's request, because without an answer there is
//! nothing to show.
//!
//! The runner is invoked at most once per user submission; callers serialize
//! submissions (e.g. by disabling the input while loading).  There is no
//! mid-pipeline cancellation — a superseded run is simply discarded.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{FeatureToggles, LlmConfig, RagConfig};
use crate::llm::{ChatOptions, ChatService, ConceptExtractor, LlmError};
use crate::rag::context::build_llm_context;
use crate::rag::retrieve::ChunkRetriever;
use crate::rag::step::{RagStep, RagStepData, RagStepId};
use crate::tokens::{chunk_tokens, estimate_tokens};

// ---------------------------------------------------------------------------
// RagError
// ---------------------------------------------------------------------------

/// Terminal pipeline failures.
#[derive(Debug, Error)]
pub enum RagError {
    /// The query was empty after trimming — rejected before any I/O.
    #[error("query must not be empty")]
    EmptyQuery,

    /// The final LLM call failed; there is no answer to show.
    #[error("chat completion failed: {0}")]
    Llm(#[from] LlmError),
}

// ---------------------------------------------------------------------------
// RagOutcome
// ---------------------------------------------------------------------------

/// Result of a completed pipeline run.
#[derive(Debug, Clone)]
pub struct RagOutcome {
    /// The main answer text.
    pub answer: String,
    /// Suggested follow-up questions, capped at `RagConfig::max_follow_ups`.
    pub follow_up_questions: Vec<String>,
    /// Chunks that made it into the context (empty when retrieval failed or
    /// RAG is disabled).
    pub chunks: Vec<String>,
    /// Token estimate over the full assembled context.
    pub total_tokens: usize,
    /// Latency of the chat completion in milliseconds.
    pub response_time_ms: u64,
    /// Final state of every executed step, in execution order.
    pub steps: Vec<RagStep>,
}

// ---------------------------------------------------------------------------
// RagPipelineRunner
// ---------------------------------------------------------------------------

/// Drives the full retrieval-augmented chat pipeline.
///
/// Create with [`RagPipelineRunner::new`], optionally attach a progress
/// listener with [`with_progress`](Self::with_progress), then call
/// [`run`](Self::run) once per user submission.
pub struct RagPipelineRunner {
    extractor: Arc<dyn ConceptExtractor>,
    retriever: Arc<dyn ChunkRetriever>,
    chat: Arc<dyn ChatService>,
    features: FeatureToggles,
    rag: RagConfig,
    options: ChatOptions,
    progress: Option<mpsc::UnboundedSender<RagStep>>,
}

impl RagPipelineRunner {
    /// Create a new runner.
    ///
    /// # Arguments
    ///
    /// * `extractor` — concept extraction service (e.g. `LlmConceptExtractor`).
    /// * `retriever` — knowledge webhook client (e.g. `WebhookRetriever`).
    /// * `chat`      — chat-completion service (e.g. `ApiChatService`).
    /// * `features`  — toggles; `rag_enabled == false` skips extraction and
    ///                 retrieval entirely.
    pub fn new(
        extractor: Arc<dyn ConceptExtractor>,
        retriever: Arc<dyn ChunkRetriever>,
        chat: Arc<dyn ChatService>,
        features: FeatureToggles,
        rag: RagConfig,
        llm: &LlmConfig,
    ) -> Self {
        let options = ChatOptions::from_config(llm, features.web_search, features.code_interpreter);
        Self {
            extractor,
            retriever,
            chat,
            features,
            rag,
            options,
            progress: None,
        }
    }

    /// Attach a progress listener.  Every step-status change is mirrored to
    /// the channel as it happens (Processing, then Completed/Error).
    #[must_use]
    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<RagStep>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Record a step transition: mirror it to the progress listener and keep
    /// the latest state per step id in the run log.
    fn record(&self, log: &mut Vec<RagStep>, step: RagStep) {
        if let Some(tx) = &self.progress {
            // A dropped listener must never fail the pipeline.
            let _ = tx.send(step.clone());
        }
        if let Some(existing) = log.iter_mut().find(|s| s.id == step.id) {
            *existing = step;
        } else {
            log.push(step);
        }
    }

    // -----------------------------------------------------------------------
    // Pipeline
    // -----------------------------------------------------------------------

    /// Run the pipeline for one user submission.
    ///
    /// # Errors
    ///
    /// * [`RagError::EmptyQuery`] — `query` is empty after trimming; no I/O
    ///   was performed.
    /// * [`RagError::Llm`] — the chat completion failed.  Earlier failures
    ///   (concept extraction, retrieval) never surface here; they degrade the
    ///   run and are visible in the step log.
    pub async fn run(&self, query: &str) -> Result<RagOutcome, RagError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(RagError::EmptyQuery);
        }

        let mut log = Vec::new();

        // ── 1. query ─────────────────────────────────────────────────────
        // The step log keeps the input verbatim; trimming is only for the
        // emptiness check and the messages built downstream.
        self.record(
            &mut log,
            RagStep::completed(
                RagStepId::Query,
                RagStepData::Query {
                    query: query.to_string(),
                    tokens: estimate_tokens(query),
                },
            ),
        );

        // ── 2 + 3. concepts / chunks (RAG only) ──────────────────────────
        let chunks = if self.features.rag_enabled {
            let retrieval_query = self.extract_concepts(&mut log, trimmed).await;
            self.retrieve_chunks(&mut log, &retrieval_query).await
        } else {
            log::debug!("rag: retrieval disabled — plain LLM chat");
            Vec::new()
        };

        // ── 4. context ───────────────────────────────────────────────────
        self.record(&mut log, RagStep::processing(RagStepId::Context));
        let context = build_llm_context(&self.rag.system_prompt, &chunks, trimmed);
        self.record(
            &mut log,
            RagStep::completed(
                RagStepId::Context,
                RagStepData::Context {
                    messages: context.messages.clone(),
                    total_tokens: context.total_tokens,
                },
            ),
        );

        // ── 5. llm (terminal on failure) ─────────────────────────────────
        self.record(&mut log, RagStep::processing(RagStepId::Llm));
        let outcome = match self.chat.complete(&context.messages, &self.options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("rag: chat completion failed: {e}");
                self.record(&mut log, RagStep::failed(RagStepId::Llm, e.to_string()));
                self.record(&mut log, RagStep::failed(RagStepId::Error, e.to_string()));
                return Err(RagError::Llm(e));
            }
        };

        let mut follow_ups = outcome.follow_up_questions;
        follow_ups.truncate(self.rag.max_follow_ups);

        self.record(
            &mut log,
            RagStep::completed(
                RagStepId::Llm,
                RagStepData::Llm {
                    answer: outcome.answer.clone(),
                    follow_up_questions: follow_ups.clone(),
                    response_time_ms: outcome.response_time_ms,
                },
            ),
        );

        Ok(RagOutcome {
            answer: outcome.answer,
            follow_up_questions: follow_ups,
            chunks,
            total_tokens: context.total_tokens,
            response_time_ms: outcome.response_time_ms,
            steps: log,
        })
    }

    /// Step 2: concept extraction.  Returns the retrieval query — the joined
    /// concepts on success, the raw query on failure.
    async fn extract_concepts(&self, log: &mut Vec<RagStep>, query: &str) -> String {
        self.record(log, RagStep::processing(RagStepId::Concepts));

        match self.extractor.extract(query).await {
            Ok(concepts) => {
                let joined = concepts.join(", ");
                self.record(
                    log,
                    RagStep::completed(RagStepId::Concepts, RagStepData::Concepts { concepts }),
                );
                joined
            }
            Err(e) => {
                log::warn!("rag: concept extraction failed ({e}), using raw query");
                self.record(log, RagStep::failed(RagStepId::Concepts, e.to_string()));
                query.to_string()
            }
        }
    }

    /// Step 3: chunk retrieval with a fresh per-call session id.  Returns an
    /// empty list on any failure.
    async fn retrieve_chunks(&self, log: &mut Vec<RagStep>, retrieval_query: &str) -> Vec<String> {
        self.record(log, RagStep::processing(RagStepId::Chunks));

        let session_id = uuid::Uuid::new_v4().to_string();
        match self.retriever.retrieve(retrieval_query, &session_id).await {
            Ok(chunks) => {
                self.record(
                    log,
                    RagStep::completed(
                        RagStepId::Chunks,
                        RagStepData::Chunks {
                            tokens: chunk_tokens(&chunks),
                            chunks: chunks.clone(),
                        },
                    ),
                );
                chunks
            }
            Err(e) => {
                log::warn!("rag: retrieval failed ({e}), continuing without chunks");
                self.record(log, RagStep::failed(RagStepId::Chunks, e.to_string()));
                Vec::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::llm::{ChatOutcome, MockChatService};
    use crate::rag::retrieve::MockRetriever;
    use crate::rag::step::RagStepStatus;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Extractor that always returns fixed concepts.
    struct OkExtractor(Vec<String>);

    #[async_trait]
    impl ConceptExtractor for OkExtractor {
        async fn extract(&self, _query: &str) -> Result<Vec<String>, LlmError> {
            Ok(self.0.clone())
        }
    }

    /// Extractor that always fails.
    struct FailExtractor;

    #[async_trait]
    impl ConceptExtractor for FailExtractor {
        async fn extract(&self, _query: &str) -> Result<Vec<String>, LlmError> {
            Err(LlmError::Timeout)
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn make_runner(
        extractor: Arc<dyn ConceptExtractor>,
        retriever: Arc<dyn ChunkRetriever>,
        chat: Arc<dyn ChatService>,
        rag_enabled: bool,
    ) -> RagPipelineRunner {
        let features = FeatureToggles {
            rag_enabled,
            web_search: false,
            code_interpreter: false,
        };
        RagPipelineRunner::new(
            extractor,
            retriever,
            chat,
            features,
            RagConfig::default(),
            &LlmConfig::default(),
        )
    }

    fn step_status(outcome: &RagOutcome, id: RagStepId) -> Option<RagStepStatus> {
        outcome.steps.iter().find(|s| s.id == id).map(|s| s.status)
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    /// Happy path: every step completes, chunks and answer flow through.
    #[tokio::test]
    async fn full_pipeline_completes_all_steps() {
        let chat = Arc::new(MockChatService::ok("Try a body scan before bed."));
        let runner = make_runner(
            Arc::new(OkExtractor(vec!["sleep".into(), "relaxation".into()])),
            Arc::new(MockRetriever::ok(vec!["chunk one".into()])),
            chat.clone(),
            true,
        );

        let outcome = runner.run("help me sleep").await.unwrap();

        assert_eq!(outcome.answer, "Try a body scan before bed.");
        assert_eq!(outcome.chunks, vec!["chunk one"]);
        for id in [
            RagStepId::Query,
            RagStepId::Concepts,
            RagStepId::Chunks,
            RagStepId::Context,
            RagStepId::Llm,
        ] {
            assert_eq!(step_status(&outcome, id), Some(RagStepStatus::Completed));
        }

        // Context carried the chunk message: system + chunks + query.
        let calls = chat.calls.lock().unwrap();
        assert_eq!(calls[0].len(), 3);
    }

    /// A failing webhook degrades to plain chat — empty chunks, completed
    /// llm step, non-empty answer.
    #[tokio::test]
    async fn retrieval_failure_degrades_gracefully() {
        let runner = make_runner(
            Arc::new(OkExtractor(vec!["sleep".into()])),
            Arc::new(MockRetriever::failing(500)),
            Arc::new(MockChatService::ok("Let's slow your breathing.")),
            true,
        );

        let outcome = runner.run("help me sleep").await.unwrap();

        assert!(outcome.chunks.is_empty());
        assert!(!outcome.answer.is_empty());
        assert_eq!(
            step_status(&outcome, RagStepId::Chunks),
            Some(RagStepStatus::Error)
        );
        assert_eq!(
            step_status(&outcome, RagStepId::Llm),
            Some(RagStepStatus::Completed)
        );
    }

    /// Concept extraction failure falls back to the raw query for retrieval.
    #[tokio::test]
    async fn extraction_failure_falls_back_to_raw_query() {
        let retriever = Arc::new(MockRetriever::ok(vec![]));
        let runner = make_runner(
            Arc::new(FailExtractor),
            retriever.clone(),
            Arc::new(MockChatService::ok("answer")),
            true,
        );

        let outcome = runner.run("grounding exercises").await.unwrap();

        assert_eq!(
            step_status(&outcome, RagStepId::Concepts),
            Some(RagStepStatus::Error)
        );
        // The webhook received the raw query verbatim.
        let calls = retriever.calls.lock().unwrap();
        assert_eq!(calls[0].0, "grounding exercises");
    }

    /// With RAG disabled the LLM receives exactly two messages (system +
    /// user) and neither extraction nor retrieval runs.
    #[tokio::test]
    async fn rag_disabled_skips_retrieval_entirely() {
        let chat = Arc::new(MockChatService::ok("You're safe. Breathe."));
        let retriever = Arc::new(MockRetriever::ok(vec!["should not appear".into()]));
        let runner = make_runner(
            Arc::new(OkExtractor(vec!["unused".into()])),
            retriever.clone(),
            chat.clone(),
            false,
        );

        let outcome = runner.run("I can't sleep").await.unwrap();

        assert!(retriever.calls.lock().unwrap().is_empty());
        assert!(outcome.chunks.is_empty());
        assert!(outcome.steps.iter().all(|s| s.id != RagStepId::Concepts));
        assert!(outcome.steps.iter().all(|s| s.id != RagStepId::Chunks));

        let calls = chat.calls.lock().unwrap();
        assert_eq!(calls[0].len(), 2);
        assert_eq!(calls[0][1].content, "I can't sleep");
    }

    /// The final LLM call is terminal — no silent fallback.
    #[tokio::test]
    async fn llm_failure_is_terminal() {
        let runner = make_runner(
            Arc::new(OkExtractor(vec!["x".into()])),
            Arc::new(MockRetriever::ok(vec![])),
            Arc::new(MockChatService::failing("provider down")),
            true,
        );

        let err = runner.run("hello").await.unwrap_err();
        assert!(matches!(err, RagError::Llm(_)));
    }

    /// The query step keeps the user's input verbatim — surrounding
    /// whitespace included — while the messages sent onward are trimmed.
    #[tokio::test]
    async fn query_step_records_the_verbatim_input() {
        let chat = Arc::new(MockChatService::ok("answer"));
        let runner = make_runner(
            Arc::new(OkExtractor(vec![])),
            Arc::new(MockRetriever::ok(vec![])),
            chat.clone(),
            false,
        );

        let outcome = runner.run("  help me sleep  ").await.unwrap();

        let step = outcome
            .steps
            .iter()
            .find(|s| s.id == RagStepId::Query)
            .unwrap();
        assert_eq!(
            step.data,
            Some(RagStepData::Query {
                query: "  help me sleep  ".into(),
                tokens: crate::tokens::estimate_tokens("help me sleep"),
            })
        );

        // The LLM still receives the trimmed query.
        let calls = chat.calls.lock().unwrap();
        assert_eq!(calls[0][1].content, "help me sleep");
    }

    /// Empty queries are rejected before any I/O.
    #[tokio::test]
    async fn empty_query_is_rejected_synchronously() {
        let retriever = Arc::new(MockRetriever::ok(vec![]));
        let chat = Arc::new(MockChatService::ok("unused"));
        let runner = make_runner(
            Arc::new(OkExtractor(vec![])),
            retriever.clone(),
            chat.clone(),
            true,
        );

        let err = runner.run("   ").await.unwrap_err();
        assert!(matches!(err, RagError::EmptyQuery));
        assert!(retriever.calls.lock().unwrap().is_empty());
        assert!(chat.calls.lock().unwrap().is_empty());
    }

    /// Follow-up questions are capped at the configured maximum.
    #[tokio::test]
    async fn follow_ups_are_capped() {
        let outcome = ChatOutcome {
            answer: "ok".into(),
            follow_up_questions: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            sources: Vec::new(),
            response_time_ms: 5,
        };
        let runner = make_runner(
            Arc::new(OkExtractor(vec![])),
            Arc::new(MockRetriever::ok(vec![])),
            Arc::new(MockChatService::with_outcome(outcome)),
            false,
        );

        let result = runner.run("hi").await.unwrap();
        assert_eq!(result.follow_up_questions.len(), 3);
    }

    /// Progress listener sees Processing before Completed, in step order.
    #[tokio::test]
    async fn progress_listener_sees_ordered_transitions() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = make_runner(
            Arc::new(OkExtractor(vec!["calm".into()])),
            Arc::new(MockRetriever::ok(vec!["c".into()])),
            Arc::new(MockChatService::ok("answer")),
            true,
        )
        .with_progress(tx);

        runner.run("hello").await.unwrap();

        let mut seen = Vec::new();
        while let Ok(step) = rx.try_recv() {
            seen.push((step.id, step.status));
        }

        let expected = [
            (RagStepId::Query, RagStepStatus::Completed),
            (RagStepId::Concepts, RagStepStatus::Processing),
            (RagStepId::Concepts, RagStepStatus::Completed),
            (RagStepId::Chunks, RagStepStatus::Processing),
            (RagStepId::Chunks, RagStepStatus::Completed),
            (RagStepId::Context, RagStepStatus::Processing),
            (RagStepId::Context, RagStepStatus::Completed),
            (RagStepId::Llm, RagStepStatus::Processing),
            (RagStepId::Llm, RagStepStatus::Completed),
        ];
        assert_eq!(seen, expected);
    }

    /// A dropped progress listener never fails the run.
    #[tokio::test]
    async fn dropped_listener_is_harmless() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let runner = make_runner(
            Arc::new(OkExtractor(vec![])),
            Arc::new(MockRetriever::ok(vec![])),
            Arc::new(MockChatService::ok("fine")),
            false,
        )
        .with_progress(tx);

        assert!(runner.run("hi").await.is_ok());
    }
}
