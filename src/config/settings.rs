//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// TtsVoice
// ---------------------------------------------------------------------------

/// Named synthesis voices offered by the TTS provider.
///
/// The set is fixed; the wire representation is the lowercase voice name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsVoice {
    /// Warm, slow guidance voice — the default for meditation scripts.
    Sage,
    /// Soft female voice.
    Luna,
    /// Neutral narrator voice.
    River,
    /// Deep male voice.
    Orion,
}

impl TtsVoice {
    /// Wire name sent to the TTS service.
    pub fn as_str(&self) -> &'static str {
        match self {
            TtsVoice::Sage => "sage",
            TtsVoice::Luna => "luna",
            TtsVoice::River => "river",
            TtsVoice::Orion => "orion",
        }
    }
}

impl Default for TtsVoice {
    fn default() -> Self {
        Self::Sage
    }
}

// ---------------------------------------------------------------------------
// FeatureToggles
// ---------------------------------------------------------------------------

/// Feature switches consumed by the RAG pipeline runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggles {
    /// Retrieval-augmented generation: concept extraction + knowledge-chunk
    /// retrieval before the LLM call.  When off, the pipeline degrades to
    /// plain LLM chat (system prompt + user query only).
    pub rag_enabled: bool,
    /// Forwarded to the chat service — lets the provider run a web search.
    pub web_search: bool,
    /// Forwarded to the chat service — lets the provider execute code.
    pub code_interpreter: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            rag_enabled: true,
            web_search: false,
            code_interpreter: false,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for the text-to-speech service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Full URL of the synthesis endpoint.
    pub endpoint: String,
    /// Voice used for synthesized speech.
    pub voice: TtsVoice,
    /// Opaque user identifier forwarded for provider-side usage accounting.
    pub user_id: String,
    /// Maximum seconds to wait for a synthesis response.
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8787/tts".into(),
            voice: TtsVoice::default(),
            user_id: "anonymous".into(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the chat-completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Full URL of the chat endpoint.
    pub endpoint: String,
    /// API key — `None` or empty for endpoints that need no authentication.
    pub api_key: Option<String>,
    /// Model identifier sent to the API.
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).  Lower = more deterministic.
    pub temperature: f32,
    /// Maximum seconds to wait for a chat response before timing out.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8787/chat".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// RagConfig
// ---------------------------------------------------------------------------

/// Settings for retrieval-augmented generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Knowledge-retrieval webhook URL.
    pub webhook_url: String,
    /// System prompt placed first in every assembled context.
    pub system_prompt: String,
    /// Maximum follow-up questions surfaced to the suggested-question UI.
    pub max_follow_ups: usize,
    /// Maximum seconds to wait for the retrieval webhook.
    pub timeout_secs: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            webhook_url: "http://localhost:5678/webhook/knowledge".into(),
            system_prompt: "You are a calm, supportive wellness companion. \
                            Answer briefly and kindly, grounding your advice \
                            in the reference material when it is provided."
                .into(),
            max_follow_ups: 3,
            timeout_secs: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// BgmConfig
// ---------------------------------------------------------------------------

/// Settings for background-music playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BgmConfig {
    /// User-chosen volume in `[0.0, 1.0]`, persisted across sessions.
    pub volume: f32,
    /// Volume used while speech is playing (ducking).
    pub ducked_volume: f32,
    /// Path to the default track — `None` means no music until the user
    /// uploads one.
    pub default_track: Option<PathBuf>,
}

impl Default for BgmConfig {
    fn default() -> Self {
        Self {
            volume: 0.5,
            ducked_volume: 0.1,
            default_track: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use mindchat::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Feature switches read by the RAG pipeline.
    pub features: FeatureToggles,
    /// Text-to-speech settings.
    pub tts: TtsConfig,
    /// Chat-completion settings.
    pub llm: LlmConfig,
    /// Retrieval settings.
    pub rag: RagConfig,
    /// Background-music settings.
    pub bgm: BgmConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            features: FeatureToggles::default(),
            tts: TtsConfig::default(),
            llm: LlmConfig::default(),
            rag: RagConfig::default(),
            bgm: BgmConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns `true` when no `settings.toml` file exists yet — first-run
    /// detection used by the onboarding flow.
    pub fn is_first_run() -> bool {
        !AppPaths::new().settings_file.exists()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        // FeatureToggles
        assert_eq!(original.features, loaded.features);

        // TtsConfig
        assert_eq!(original.tts.endpoint, loaded.tts.endpoint);
        assert_eq!(original.tts.voice, loaded.tts.voice);
        assert_eq!(original.tts.timeout_secs, loaded.tts.timeout_secs);

        // LlmConfig
        assert_eq!(original.llm.endpoint, loaded.llm.endpoint);
        assert_eq!(original.llm.api_key, loaded.llm.api_key);
        assert_eq!(original.llm.model, loaded.llm.model);
        assert_eq!(original.llm.temperature, loaded.llm.temperature);

        // RagConfig
        assert_eq!(original.rag.webhook_url, loaded.rag.webhook_url);
        assert_eq!(original.rag.system_prompt, loaded.rag.system_prompt);
        assert_eq!(original.rag.max_follow_ups, loaded.rag.max_follow_ups);

        // BgmConfig
        assert_eq!(original.bgm.volume, loaded.bgm.volume);
        assert_eq!(original.bgm.ducked_volume, loaded.bgm.ducked_volume);
        assert_eq!(original.bgm.default_track, loaded.bgm.default_track);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.features, default.features);
        assert_eq!(config.llm.model, default.llm.model);
        assert_eq!(config.tts.voice, default.tts.voice);
        assert_eq!(config.rag.webhook_url, default.rag.webhook_url);
    }

    /// Pin the shipped defaults so accidental changes show up in review.
    #[test]
    fn default_values_are_stable() {
        let cfg = AppConfig::default();

        assert!(cfg.features.rag_enabled);
        assert!(!cfg.features.web_search);
        assert!(!cfg.features.code_interpreter);
        assert_eq!(cfg.tts.voice, TtsVoice::Sage);
        assert_eq!(cfg.tts.timeout_secs, 30);
        assert!(cfg.llm.api_key.is_none());
        assert_eq!(cfg.rag.max_follow_ups, 3);
        assert!((cfg.bgm.volume - 0.5).abs() < f32::EPSILON);
        assert!((cfg.bgm.ducked_volume - 0.1).abs() < f32::EPSILON);
        assert!(cfg.bgm.default_track.is_none());
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.features.rag_enabled = false;
        cfg.features.web_search = true;
        cfg.tts.voice = TtsVoice::Orion;
        cfg.llm.api_key = Some("sk-test".into());
        cfg.llm.model = "gpt-4o".into();
        cfg.rag.webhook_url = "https://flows.example.com/hook".into();
        cfg.bgm.volume = 0.8;
        cfg.bgm.default_track = Some(PathBuf::from("/music/rain.mp3"));

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert!(!loaded.features.rag_enabled);
        assert!(loaded.features.web_search);
        assert_eq!(loaded.tts.voice, TtsVoice::Orion);
        assert_eq!(loaded.llm.api_key, Some("sk-test".into()));
        assert_eq!(loaded.llm.model, "gpt-4o");
        assert_eq!(loaded.rag.webhook_url, "https://flows.example.com/hook");
        assert!((loaded.bgm.volume - 0.8).abs() < f32::EPSILON);
        assert_eq!(
            loaded.bgm.default_track,
            Some(PathBuf::from("/music/rain.mp3"))
        );
    }

    /// Voice names serialise as lowercase strings.
    #[test]
    fn voice_wire_names_are_lowercase() {
        assert_eq!(TtsVoice::Sage.as_str(), "sage");
        assert_eq!(TtsVoice::Orion.as_str(), "orion");
        let json = serde_json::to_string(&TtsVoice::Luna).unwrap();
        assert_eq!(json, "\"luna\"");
    }
}
