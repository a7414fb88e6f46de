//! Single-audio-handle lifecycle wrapper.
//!
//! # Overview
//!
//! [`AudioOutput`] / [`AudioHandle`] form the seam between the playback
//! logic and the platform audio device.  [`RodioOutput`](crate::audio::RodioOutput)
//! is the production implementation; [`MockAudioOutput`] (test-only) drives
//! the same code paths without touching a sound card.
//!
//! [`AudioElement`] owns exactly one handle and emits lifecycle events over
//! an unbounded channel:
//!
//! * `Started` — playback has begun,
//! * then exactly one of `Ended` / `Errored` — never both, never neither —
//!   unless the element is explicitly stopped, which fires neither.
//!
//! Decoded audio buffers are non-trivially sized, so handles release their
//! source data when stopped or dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// All errors that can arise from the audio subsystem.
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    /// The byte buffer could not be decoded as audio.
    #[error("failed to decode audio: {0}")]
    Decode(String),

    /// The output device is unavailable or the audio thread is gone.
    #[error("audio output unavailable: {0}")]
    Output(String),

    /// The platform refused to start playback.
    #[error("playback refused: {0}")]
    Playback(String),

    /// A track file could not be read from disk.
    #[error("failed to read track: {0}")]
    TrackRead(String),
}

// ---------------------------------------------------------------------------
// AudioOutput / AudioHandle traits
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe handle to one loaded piece of audio.
///
/// Handles start paused; [`play`](Self::play) resolves once playback has
/// *started*, not when it ends.  Use [`watch_end`](Self::watch_end) to learn
/// when the audio drains.
pub trait AudioHandle: Send + Sync {
    /// Begin (or restart after `stop`) playback.
    fn play(&self) -> Result<(), AudioError>;

    /// Pause, keeping the current position.
    fn pause(&self);

    /// Resume from the current position.
    fn resume(&self);

    /// Stop playback, reset the position and release the buffered source.
    fn stop(&self);

    /// Set the live volume, clamped to `[0.0, 1.0]`.
    fn set_volume(&self, volume: f32);

    /// Receiver that fires once when the handle drains — naturally or via
    /// [`stop`](Self::stop).  Each call registers an independent watcher.
    fn watch_end(&self) -> oneshot::Receiver<()>;
}

/// Object-safe, thread-safe factory for audio handles.
pub trait AudioOutput: Send + Sync {
    /// Create a playable handle from an in-memory byte buffer.
    ///
    /// Decoding happens up front so format errors surface here rather than
    /// mid-playback.  `looping` repeats the source indefinitely (background
    /// music); non-looping handles drain once.
    fn load(&self, bytes: Vec<u8>, looping: bool) -> Result<Arc<dyn AudioHandle>, AudioError>;
}

// Compile-time assertions: both traits must stay object-safe.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioOutput>, _: Box<dyn AudioHandle>) {}
};

// ---------------------------------------------------------------------------
// ElementEvent / AudioElement
// ---------------------------------------------------------------------------

/// Lifecycle events emitted by an [`AudioElement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementEvent {
    /// Playback has started.
    Started,
    /// Playback drained naturally.
    Ended,
    /// The platform refused playback or the source failed mid-stream.
    Errored(String),
}

/// Owns one audio handle and reports its lifecycle over a channel.
pub struct AudioElement {
    handle: Arc<dyn AudioHandle>,
    events: mpsc::UnboundedSender<ElementEvent>,
    stopped: Arc<AtomicBool>,
}

impl AudioElement {
    /// Decode `bytes` into a new element.
    ///
    /// Returns the element plus the receiving end of its event channel.
    pub fn load(
        output: &dyn AudioOutput,
        bytes: Vec<u8>,
        looping: bool,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ElementEvent>), AudioError> {
        let handle = output.load(bytes, looping)?;
        let (events, rx) = mpsc::unbounded_channel();

        Ok((
            Self {
                handle,
                events,
                stopped: Arc::new(AtomicBool::new(false)),
            },
            rx,
        ))
    }

    /// Start playback.
    ///
    /// Emits `Started` on success and spawns a watcher that emits `Ended`
    /// when the handle drains naturally.  On failure emits `Errored` and
    /// returns the error.
    pub fn play(&self) -> Result<(), AudioError> {
        if let Err(e) = self.handle.play() {
            let _ = self.events.send(ElementEvent::Errored(e.to_string()));
            return Err(e);
        }

        let _ = self.events.send(ElementEvent::Started);

        let end = self.handle.watch_end();
        let events = self.events.clone();
        let stopped = Arc::clone(&self.stopped);
        tokio::spawn(async move {
            if end.await.is_ok() && !stopped.load(Ordering::SeqCst) {
                let _ = events.send(ElementEvent::Ended);
            }
        });

        Ok(())
    }

    /// Pause, keeping the position.
    pub fn pause(&self) {
        self.handle.pause();
    }

    /// Resume from the current position.
    pub fn resume(&self) {
        self.handle.resume();
    }

    /// Stop playback and release the source buffer.  Fires no event — the
    /// caller initiated this, so there is nothing to report.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.handle.stop();
    }

    /// Set the live volume.
    pub fn set_volume(&self, volume: f32) {
        self.handle.set_volume(volume);
    }
}

// ---------------------------------------------------------------------------
// MockAudioOutput / MockAudioHandle  (test-only)
// ---------------------------------------------------------------------------

/// A test double for [`AudioHandle`] with inspectable state.
///
/// Tests end playback by calling [`finish`](Self::finish); `stop` also fires
/// pending end-watchers, mirroring the production behaviour where stopping a
/// sink wakes its drain watcher.
#[cfg(test)]
pub struct MockAudioHandle {
    pub looping: bool,
    pub byte_len: usize,
    pub volume: std::sync::Mutex<f32>,
    pub playing: AtomicBool,
    pub paused: AtomicBool,
    pub stopped: AtomicBool,
    finished: AtomicBool,
    fail_play: Option<String>,
    auto_finish: bool,
    end_txs: std::sync::Mutex<Vec<oneshot::Sender<()>>>,
}

#[cfg(test)]
impl MockAudioHandle {
    fn new(looping: bool, byte_len: usize, fail_play: Option<String>, auto_finish: bool) -> Self {
        Self {
            looping,
            byte_len,
            volume: std::sync::Mutex::new(1.0),
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            fail_play,
            auto_finish,
            end_txs: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn fire_end_watchers(&self) {
        for tx in self.end_txs.lock().unwrap().drain(..) {
            let _ = tx.send(());
        }
    }

    /// Simulate the audio draining naturally.
    pub fn finish(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.finished.store(true, Ordering::SeqCst);
        self.fire_end_watchers();
    }

    pub fn current_volume(&self) -> f32 {
        *self.volume.lock().unwrap()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
impl AudioHandle for MockAudioHandle {
    fn play(&self) -> Result<(), AudioError> {
        if let Some(message) = &self.fail_play {
            return Err(AudioError::Playback(message.clone()));
        }
        self.playing.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        if self.auto_finish {
            self.finished.store(true, Ordering::SeqCst);
            self.fire_end_watchers();
        }
        Ok(())
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);
        self.fire_end_watchers();
    }

    fn set_volume(&self, volume: f32) {
        *self.volume.lock().unwrap() = volume.clamp(0.0, 1.0);
    }

    fn watch_end(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        if self.finished.load(Ordering::SeqCst) || self.stopped.load(Ordering::SeqCst) {
            let _ = tx.send(());
        } else {
            self.end_txs.lock().unwrap().push(tx);
        }
        rx
    }
}

/// A test double for [`AudioOutput`] that records every loaded handle.
#[cfg(test)]
pub struct MockAudioOutput {
    pub loaded: std::sync::Mutex<Vec<Arc<MockAudioHandle>>>,
    fail_load: Option<String>,
    fail_play: Option<String>,
    auto_finish: bool,
}

#[cfg(test)]
impl MockAudioOutput {
    /// Handles end only when a test calls `finish()` on them.
    pub fn new() -> Self {
        Self {
            loaded: std::sync::Mutex::new(Vec::new()),
            fail_load: None,
            fail_play: None,
            auto_finish: false,
        }
    }

    /// Non-looping handles finish as soon as `play` is called.
    pub fn auto_finishing() -> Self {
        Self {
            auto_finish: true,
            ..Self::new()
        }
    }

    /// Every `load` fails with a decode error.
    pub fn failing_load(message: impl Into<String>) -> Self {
        Self {
            fail_load: Some(message.into()),
            ..Self::new()
        }
    }

    /// Every `play` fails with a playback error.
    pub fn failing_play(message: impl Into<String>) -> Self {
        Self {
            fail_play: Some(message.into()),
            ..Self::new()
        }
    }

    /// The most recently loaded handle.
    pub fn last_handle(&self) -> Option<Arc<MockAudioHandle>> {
        self.loaded.lock().unwrap().last().cloned()
    }

    /// Handles filtered by looping flag — background music loads looping,
    /// speech does not.
    pub fn handles(&self, looping: bool) -> Vec<Arc<MockAudioHandle>> {
        self.loaded
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.looping == looping)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
impl AudioOutput for MockAudioOutput {
    fn load(&self, bytes: Vec<u8>, looping: bool) -> Result<Arc<dyn AudioHandle>, AudioError> {
        if let Some(message) = &self.fail_load {
            return Err(AudioError::Decode(message.clone()));
        }
        // Looping handles never auto-finish; background music plays until
        // stopped.
        let auto = self.auto_finish && !looping;
        let handle = Arc::new(MockAudioHandle::new(
            looping,
            bytes.len(),
            self.fail_play.clone(),
            auto,
        ));
        self.loaded.lock().unwrap().push(Arc::clone(&handle));
        Ok(handle)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
