//! Background-music controller — one looping track, volume, duck/restore.
//!
//! Owns the single background track for the whole application session.  The
//! coordinator ducks the track while speech plays and restores the user's
//! persisted volume when speech ends; UI code never touches the handle
//! directly, which is what keeps the "no two tracks ever play concurrently"
//! invariant enforceable.

use std::path::PathBuf;
use std::sync::Arc;

use crate::audio::element::{AudioError, AudioHandle, AudioOutput};
use crate::config::BgmConfig;

// ---------------------------------------------------------------------------
// TrackSource
// ---------------------------------------------------------------------------

/// Where the background track's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    /// A bundled or previously saved asset on disk.
    File(PathBuf),
    /// A user-uploaded byte blob held in memory.
    Bytes(Vec<u8>),
}

impl TrackSource {
    /// Materialise the track bytes.
    fn bytes(&self) -> Result<Vec<u8>, AudioError> {
        match self {
            TrackSource::File(path) => {
                std::fs::read(path).map_err(|e| AudioError::TrackRead(e.to_string()))
            }
            TrackSource::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Volume persistence hook
// ---------------------------------------------------------------------------

/// Called whenever the user volume changes so the embedding app can persist
/// it (the controller itself has no storage).
pub type VolumeHook = Box<dyn Fn(f32) + Send + Sync>;

// ---------------------------------------------------------------------------
// BackgroundMusicController
// ---------------------------------------------------------------------------

/// Owns the looping background-music track, its volume and duck behaviour.
pub struct BackgroundMusicController {
    output: Arc<dyn AudioOutput>,
    track: Option<TrackSource>,
    handle: Option<Arc<dyn AudioHandle>>,
    /// User-chosen volume, restored after every duck.
    volume: f32,
    /// Fixed low volume used while speech plays.
    ducked_volume: f32,
    on_volume_change: Option<VolumeHook>,
}

impl BackgroundMusicController {
    /// Create a controller from config.  `default_track` (when set) becomes
    /// the initial track.
    pub fn new(output: Arc<dyn AudioOutput>, config: &BgmConfig) -> Self {
        Self {
            output,
            track: config.default_track.clone().map(TrackSource::File),
            handle: None,
            volume: config.volume.clamp(0.0, 1.0),
            ducked_volume: config.ducked_volume.clamp(0.0, 1.0),
            on_volume_change: None,
        }
    }

    /// Attach a persistence hook invoked on every volume change.
    #[must_use]
    pub fn with_volume_hook(mut self, hook: VolumeHook) -> Self {
        self.on_volume_change = Some(hook);
        self
    }

    // -----------------------------------------------------------------------
    // Track management
    // -----------------------------------------------------------------------

    /// Replace the current track.  Any playing handle is stopped and
    /// released first — no two tracks ever play concurrently.
    pub fn set_track(&mut self, source: TrackSource) {
        self.stop();
        self.track = Some(source);
    }

    /// Remove the track entirely, releasing its byte buffer.
    pub fn clear_track(&mut self) {
        self.stop();
        self.track = None;
    }

    pub fn has_track(&self) -> bool {
        self.track.is_some()
    }

    // -----------------------------------------------------------------------
    // Volume
    // -----------------------------------------------------------------------

    /// Update the user volume: live handle (if any) plus the persistence
    /// hook.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(handle) = &self.handle {
            handle.set_volume(self.volume);
        }
        if let Some(hook) = &self.on_volume_change {
            hook(self.volume);
        }
    }

    /// The persisted user volume (not the live ducked level).
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Lower the live volume to the ducked level without restarting
    /// playback.  No-op when nothing is playing.
    pub fn duck(&self) {
        if let Some(handle) = &self.handle {
            handle.set_volume(self.ducked_volume);
        }
    }

    /// Restore the live volume to the persisted user volume without
    /// restarting playback.
    pub fn restore(&self) {
        if let Some(handle) = &self.handle {
            handle.set_volume(self.volume);
        }
    }

    // -----------------------------------------------------------------------
    // Playback
    // -----------------------------------------------------------------------

    /// Start the track from position 0, looping, at the user volume.
    ///
    /// No-op when no track is set or the volume is exactly 0 (silent music
    /// is pointless work).  Any previous handle is stopped first.
    pub fn play(&mut self) -> Result<(), AudioError> {
        let Some(track) = &self.track else {
            return Ok(());
        };
        if self.volume == 0.0 {
            return Ok(());
        }

        if let Some(old) = self.handle.take() {
            old.stop();
        }

        let handle = self.output.load(track.bytes()?, true)?;
        handle.set_volume(self.volume);
        handle.play()?;
        self.handle = Some(handle);

        log::debug!("bgm: playback started at volume {:.2}", self.volume);
        Ok(())
    }

    /// Pause, keeping the position.
    pub fn pause(&self) {
        if let Some(handle) = &self.handle {
            handle.pause();
        }
    }

    /// Resume from the current position at the live volume.
    pub fn resume(&self) {
        if let Some(handle) = &self.handle {
            handle.resume();
        }
    }

    /// Stop and release the handle.  The track itself is kept so playback
    /// can resume later.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.handle.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::element::MockAudioOutput;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(volume: f32) -> BgmConfig {
        BgmConfig {
            volume,
            ducked_volume: 0.1,
            default_track: None,
        }
    }

    fn controller(output: &Arc<MockAudioOutput>, volume: f32) -> BackgroundMusicController {
        let mut bgm = BackgroundMusicController::new(
            Arc::clone(output) as Arc<dyn AudioOutput>,
            &config(volume),
        );
        bgm.set_track(TrackSource::Bytes(vec![0; 32]));
        bgm
    }

    #[test]
    fn play_without_track_is_a_noop() {
        let output = Arc::new(MockAudioOutput::new());
        let mut bgm =
            BackgroundMusicController::new(Arc::clone(&output) as _, &config(0.5));

        bgm.play().unwrap();
        assert!(!bgm.is_playing());
        assert!(output.loaded.lock().unwrap().is_empty());
    }

    #[test]
    fn play_at_zero_volume_is_a_noop() {
        let output = Arc::new(MockAudioOutput::new());
        let mut bgm = controller(&output, 0.0);

        bgm.play().unwrap();
        assert!(!bgm.is_playing());
        assert!(output.loaded.lock().unwrap().is_empty());
    }

    #[test]
    fn play_loads_looping_at_user_volume() {
        let output = Arc::new(MockAudioOutput::new());
        let mut bgm = controller(&output, 0.7);

        bgm.play().unwrap();

        let handle = output.last_handle().unwrap();
        assert!(handle.looping);
        assert!(handle.is_playing());
        assert_eq!(handle.current_volume(), 0.7);
    }

    /// Round-trip invariant: restore(duck(v)) == v for any persisted volume.
    #[test]
    fn duck_then_restore_round_trips_volume() {
        for v in [0.1_f32, 0.3, 0.5, 1.0] {
            let output = Arc::new(MockAudioOutput::new());
            let mut bgm = controller(&output, v);
            bgm.play().unwrap();

            bgm.duck();
            let handle = output.last_handle().unwrap();
            assert_eq!(handle.current_volume(), 0.1);

            bgm.restore();
            assert_eq!(handle.current_volume(), v);
            assert_eq!(bgm.volume(), v);
        }
    }

    #[test]
    fn set_volume_updates_live_handle_and_hook() {
        let output = Arc::new(MockAudioOutput::new());
        let persisted = Arc::new(AtomicUsize::new(0));
        let persisted_clone = Arc::clone(&persisted);

        let mut bgm = controller(&output, 0.5).with_volume_hook(Box::new(move |v| {
            persisted_clone.store((v * 100.0) as usize, Ordering::SeqCst);
        }));
        bgm.play().unwrap();

        bgm.set_volume(0.8);

        assert_eq!(output.last_handle().unwrap().current_volume(), 0.8);
        assert_eq!(persisted.load(Ordering::SeqCst), 80);
    }

    #[test]
    fn set_volume_clamps_out_of_range() {
        let output = Arc::new(MockAudioOutput::new());
        let mut bgm = controller(&output, 0.5);
        bgm.set_volume(1.7);
        assert_eq!(bgm.volume(), 1.0);
        bgm.set_volume(-0.2);
        assert_eq!(bgm.volume(), 0.0);
    }

    #[test]
    fn replacing_track_stops_old_handle_first() {
        let output = Arc::new(MockAudioOutput::new());
        let mut bgm = controller(&output, 0.5);
        bgm.play().unwrap();
        let first = output.last_handle().unwrap();

        bgm.set_track(TrackSource::Bytes(vec![1; 64]));

        assert!(first.is_stopped());
        assert!(!bgm.is_playing());

        bgm.play().unwrap();
        let second = output.last_handle().unwrap();
        assert_eq!(second.byte_len, 64);
        // Never two tracks live at once.
        assert!(first.is_stopped());
        assert!(second.is_playing());
    }

    #[test]
    fn stop_keeps_track_for_later_resume() {
        let output = Arc::new(MockAudioOutput::new());
        let mut bgm = controller(&output, 0.5);
        bgm.play().unwrap();

        bgm.stop();
        assert!(!bgm.is_playing());
        assert!(bgm.has_track());

        bgm.play().unwrap();
        assert!(bgm.is_playing());
    }

    #[test]
    fn clear_track_releases_everything() {
        let output = Arc::new(MockAudioOutput::new());
        let mut bgm = controller(&output, 0.5);
        bgm.play().unwrap();

        bgm.clear_track();
        assert!(!bgm.is_playing());
        assert!(!bgm.has_track());

        // Playing again is a silent no-op.
        bgm.play().unwrap();
        assert!(!bgm.is_playing());
    }

    #[test]
    fn pause_and_resume_preserve_handle() {
        let output = Arc::new(MockAudioOutput::new());
        let mut bgm = controller(&output, 0.5);
        bgm.play().unwrap();
        let handle = output.last_handle().unwrap();

        bgm.pause();
        assert!(handle.is_paused());

        bgm.resume();
        assert!(!handle.is_paused());
        // Same handle throughout — position is preserved.
        assert_eq!(output.loaded.lock().unwrap().len(), 1);
    }

    #[test]
    fn missing_track_file_surfaces_read_error() {
        let output = Arc::new(MockAudioOutput::new());
        let mut bgm =
            BackgroundMusicController::new(Arc::clone(&output) as _, &config(0.5));
        bgm.set_track(TrackSource::File(PathBuf::from("/nonexistent/track.mp3")));

        let err = bgm.play().unwrap_err();
        assert!(matches!(err, AudioError::TrackRead(_)));
    }
}
