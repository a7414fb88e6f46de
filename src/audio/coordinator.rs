//! Speech playback coordinator.
//!
//! Owns the single speech-playback slot: synthesize text, play the result,
//! and duck the background music while speech is audible.  A monotonically
//! increasing generation counter makes supersession cheap — every new
//! request bumps it, and every in-flight session checks it at each await
//! point, so a stale session simply falls through without touching shared
//! state.
//!
//! Rapid successive requests (e.g. streamed assistant replies re-rendering)
//! are debounced: only the request still current after the debounce window
//! reaches the synthesis service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::audio::bgm::BackgroundMusicController;
use crate::audio::element::{AudioElement, AudioError, AudioOutput, ElementEvent};
use crate::audio::state::{new_shared_playback, PlaybackState, SessionKey, SharedPlayback};
use crate::config::TtsVoice;
use crate::tts::{TtsError, TtsService};

/// Requests arriving within this window collapse to the newest one.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

// ---------------------------------------------------------------------------
// PlaybackError / PlaybackEvent
// ---------------------------------------------------------------------------

/// Errors a playback session can end with.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error(transparent)]
    Tts(#[from] TtsError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// What happened to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEventKind {
    /// Synthesis has begun.
    Requesting,
    /// Speech audio is audible.
    Started,
    /// Speech drained naturally.
    Ended,
    /// Synthesis or playback failed.
    Errored(String),
}

/// Session lifecycle notification for the UI.
///
/// A superseded or explicitly stopped session emits nothing further — only
/// the session that runs to completion (or failure) reports a terminal
/// event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackEvent {
    pub session: SessionKey,
    pub kind: PlaybackEventKind,
}

// ---------------------------------------------------------------------------
// TtsPlaybackCoordinator
// ---------------------------------------------------------------------------

/// Coordinates speech synthesis, the single playback slot and music ducking.
pub struct TtsPlaybackCoordinator {
    tts: Arc<dyn TtsService>,
    output: Arc<dyn AudioOutput>,
    bgm: Arc<Mutex<BackgroundMusicController>>,
    status: SharedPlayback,
    /// The at-most-one speech element currently loaded.
    voice_slot: Mutex<Option<AudioElement>>,
    /// Bumped by every new request and by `stop`; sessions whose generation
    /// no longer matches are stale and go silent.
    generation: AtomicU64,
    /// Serializes session startup so teardown and start never interleave.
    start_lock: tokio::sync::Mutex<()>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    debounce: Duration,
}

impl TtsPlaybackCoordinator {
    /// Create a coordinator and the receiving end of its event channel.
    pub fn new(
        tts: Arc<dyn TtsService>,
        output: Arc<dyn AudioOutput>,
        bgm: Arc<Mutex<BackgroundMusicController>>,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                tts,
                output,
                bgm,
                status: new_shared_playback(),
                voice_slot: Mutex::new(None),
                generation: AtomicU64::new(0),
                start_lock: tokio::sync::Mutex::new(()),
                events,
                debounce: DEFAULT_DEBOUNCE,
            },
            rx,
        )
    }

    /// Override the debounce window (zero disables debouncing).
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Shared status handle for UI polling.
    pub fn status(&self) -> SharedPlayback {
        Arc::clone(&self.status)
    }

    /// Synthesize `text` and play it, ducking the background music while it
    /// is audible.
    ///
    /// Any session already in flight is torn down first.  Resolves when the
    /// speech drains, fails, or is superseded by a newer request; a
    /// superseded session resolves `Ok` without emitting anything.
    pub async fn play_text(
        &self,
        text: &str,
        voice: TtsVoice,
        session: SessionKey,
    ) -> Result<(), PlaybackError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("playback: session {generation} requested");

        // The new request owns the slot from here on.
        self.stop_voice();

        // Music starts right away so the room is not silent during the
        // debounce window and the synthesis round-trip.
        if let Err(e) = self.bgm.lock().unwrap().play() {
            log::warn!("background music failed to start: {e}");
        }

        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
            if !self.is_current(generation) {
                return Ok(());
            }
        }

        let start = self.start_lock.lock().await;
        if !self.is_current(generation) {
            return Ok(());
        }

        self.set_status(PlaybackState::Requesting, Some(session.clone()), None);
        self.emit(&session, PlaybackEventKind::Requesting);

        let bytes = match self.tts.synthesize(text, voice).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if !self.is_current(generation) {
                    return Ok(());
                }
                self.fail_session(&session, e.to_string());
                return Err(e.into());
            }
        };
        if !self.is_current(generation) {
            // Superseded mid-synthesis; the audio is discarded unplayed.
            return Ok(());
        }

        let (element, mut lifecycle) =
            match AudioElement::load(self.output.as_ref(), bytes, false) {
                Ok(pair) => pair,
                Err(e) => {
                    self.fail_session(&session, e.to_string());
                    return Err(e.into());
                }
            };
        if let Err(e) = element.play() {
            self.fail_session(&session, e.to_string());
            return Err(e.into());
        }

        self.bgm.lock().unwrap().duck();
        *self.voice_slot.lock().unwrap() = Some(element);
        self.set_status(PlaybackState::Playing, Some(session.clone()), None);
        drop(start);

        // Forward the element lifecycle until it reaches a terminal event.
        // If a newer request tears the slot down, the channel closes without
        // one and this session goes silent.
        while let Some(event) = lifecycle.recv().await {
            match event {
                ElementEvent::Started => {
                    self.emit(&session, PlaybackEventKind::Started);
                }
                ElementEvent::Ended => {
                    if self.is_current(generation) {
                        self.finish_session(None);
                        self.emit(&session, PlaybackEventKind::Ended);
                    }
                    return Ok(());
                }
                ElementEvent::Errored(message) => {
                    if self.is_current(generation) {
                        self.fail_session(&session, message);
                    }
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Pause speech and music, keeping positions.
    pub fn pause(&self) {
        if let Some(element) = self.voice_slot.lock().unwrap().as_ref() {
            element.pause();
        }
        self.bgm.lock().unwrap().pause();
    }

    /// Resume music first so it is already audible under the speech.
    pub fn resume(&self) {
        self.bgm.lock().unwrap().resume();
        if let Some(element) = self.voice_slot.lock().unwrap().as_ref() {
            element.resume();
        }
    }

    /// Stop the current session, restore the music volume and stop the
    /// music.  Idempotent; emits no event — the caller initiated this.
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.finish_session(None);
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn emit(&self, session: &SessionKey, kind: PlaybackEventKind) {
        let _ = self.events.send(PlaybackEvent {
            session: session.clone(),
            kind,
        });
    }

    /// Stop and drop the speech element, if any.  Dropping it closes its
    /// lifecycle channel, which wakes the session task awaiting it.
    fn stop_voice(&self) {
        if let Some(element) = self.voice_slot.lock().unwrap().take() {
            element.stop();
        }
    }

    /// Return the slot to idle: speech stopped, music restored and stopped.
    fn finish_session(&self, error: Option<String>) {
        self.stop_voice();
        {
            let mut bgm = self.bgm.lock().unwrap();
            bgm.restore();
            bgm.stop();
        }
        let mut status = self.status.lock().unwrap();
        status.state = PlaybackState::Idle;
        status.session = None;
        status.error_message = error;
    }

    fn fail_session(&self, session: &SessionKey, message: String) {
        log::error!("playback session failed: {message}");
        self.finish_session(Some(message.clone()));
        self.emit(session, PlaybackEventKind::Errored(message));
    }

    fn set_status(
        &self,
        state: PlaybackState,
        session: Option<SessionKey>,
        error: Option<String>,
    ) {
        let mut status = self.status.lock().unwrap();
        status.state = state;
        status.session = session;
        status.error_message = error;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
