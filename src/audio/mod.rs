//! Audio subsystem: speech playback, background music and ducking.
//!
//! ```text
//!             TtsPlaybackCoordinator
//!              /        |         \
//!     TtsService   AudioElement   BackgroundMusicController
//!                       |              |
//!                  AudioHandle    AudioHandle   (trait objects)
//!                       \              /
//!                        AudioOutput  ── RodioOutput (audio thread)
//! ```
//!
//! The coordinator owns the single speech slot; the music controller owns
//! the single looping track.  Both reach the sound card only through the
//! [`AudioOutput`] seam, which tests replace with an in-memory mock.

mod bgm;
mod coordinator;
mod device;
mod element;
mod state;

pub use bgm::{BackgroundMusicController, TrackSource, VolumeHook};
pub use coordinator::{PlaybackError, PlaybackEvent, PlaybackEventKind, TtsPlaybackCoordinator};
pub use device::RodioOutput;
pub use element::{AudioElement, AudioError, AudioHandle, AudioOutput, ElementEvent};
pub use state::{
    new_shared_playback, PlaybackState, PlaybackStatus, SessionKey, SharedPlayback,
};

#[cfg(test)]
pub use element::{MockAudioHandle, MockAudioOutput};
