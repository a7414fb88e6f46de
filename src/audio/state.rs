//! Shared playback status for UI consumption.

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// PlaybackState
// ---------------------------------------------------------------------------

/// Lifecycle of the single speech-playback slot.
///
/// Exactly one session can be in flight at a time; a new request tears the
/// previous one down before this state ever re-enters `Requesting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing playing and no request in flight.
    #[default]
    Idle,
    /// Speech audio is being synthesized.
    Requesting,
    /// Speech audio is playing.
    Playing,
}

impl PlaybackState {
    /// True while a session is in flight (synthesis or playback).
    pub fn is_busy(&self) -> bool {
        !matches!(self, PlaybackState::Idle)
    }

    /// Short label for UI display.
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Requesting => "requesting",
            PlaybackState::Playing => "playing",
        }
    }
}

// ---------------------------------------------------------------------------
// SessionKey / PlaybackStatus
// ---------------------------------------------------------------------------

/// Identifies which utterance a playback session belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKey {
    /// The most recent assistant reply (auto-play).
    Latest,
    /// A specific message replayed by id.
    Message(String),
}

/// Snapshot of the playback slot, shared between the coordinator and the UI.
#[derive(Debug, Clone, Default)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    /// Which utterance the current session belongs to; `None` when idle.
    pub session: Option<SessionKey>,
    /// Last session's error, cleared when a new session starts.
    pub error_message: Option<String>,
}

/// Shared, mutex-guarded playback status.
pub type SharedPlayback = Arc<Mutex<PlaybackStatus>>;

pub fn new_shared_playback() -> SharedPlayback {
    Arc::new(Mutex::new(PlaybackStatus::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
