//! mindchat — core engine for a guided-wellness chat companion.
//!
//! The crate provides the non-UI half of the application:
//!
//! * [`audio`] — spoken-reply playback with background-music ducking, built
//!   on a single-slot coordinator so at most one utterance is ever audible.
//! * [`rag`] — the retrieval-augmented answer pipeline: concept extraction,
//!   chunk retrieval over a webhook, context assembly and the chat call,
//!   with per-step progress reporting and graceful degradation.
//! * [`llm`] / [`tts`] — thin clients for the chat and speech-synthesis
//!   services, behind traits so everything above them tests offline.
//! * [`hrv`] — heart-rate-variability metrics from tap-recorded beats.
//! * [`tokens`] — the character-based token estimator shared by the
//!   pipeline's budgeting and progress display.
//! * [`config`] — on-disk TOML settings and feature toggles.
//!
//! A UI embeds the crate by constructing the services from [`config`],
//! wiring them into [`rag::RagPipelineRunner`] and
//! [`audio::TtsPlaybackCoordinator`], and subscribing to their event
//! channels.

pub mod audio;
pub mod config;
pub mod hrv;
pub mod llm;
pub mod rag;
pub mod tokens;
pub mod tts;

pub use audio::{BackgroundMusicController, TtsPlaybackCoordinator};
pub use config::AppConfig;
pub use hrv::{calculate_hrv_metrics, HrvMetrics, HrvSample};
pub use rag::RagPipelineRunner;
pub use tokens::estimate_tokens;
