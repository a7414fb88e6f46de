//! Production audio output — `rodio` confined to a dedicated I/O thread.
//!
//! `rodio::OutputStream` is `!Send` on some platforms. Rather than using
//! `unsafe impl Send/Sync`, the stream lives on a single named OS thread and
//! handle creation is proxied through a request–reply channel. `rodio::Sink`
//! itself is `Send + Sync`, so once a sink exists the returned
//! [`RodioHandle`] can be used from any thread directly — only `load` pays
//! the (microsecond) channel round-trip.

use std::io::Cursor;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use rodio::source::Source;
use rodio::{Decoder, OutputStream, Sink};
use tokio::sync::oneshot;

use super::element::{AudioError, AudioHandle, AudioOutput};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

enum DeviceCommand {
    /// Decode `bytes` into a fresh paused sink and reply with it.
    Load {
        bytes: Vec<u8>,
        looping: bool,
        reply: mpsc::Sender<Result<Arc<Sink>, AudioError>>,
    },

    /// Shut down the audio thread, releasing the output stream.
    Shutdown,
}

// ---------------------------------------------------------------------------
// RodioOutput
// ---------------------------------------------------------------------------

/// `Send + Sync` factory for rodio-backed audio handles.
///
/// Spawn once per application session with [`RodioOutput::new`]; dropping it
/// shuts the audio thread down and silences any remaining sinks.
pub struct RodioOutput {
    cmd_tx: mpsc::Sender<DeviceCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RodioOutput {
    /// Spawn the audio thread and open the default output device.
    ///
    /// Errors from `OutputStream::try_default` are propagated back through a
    /// one-shot init channel.
    pub fn new() -> Result<Self, AudioError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<DeviceCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), AudioError>>();

        let thread = thread::Builder::new()
            .name("mindchat-audio".into())
            .spawn(move || Self::run(&cmd_rx, &init_tx))
            .map_err(|e| AudioError::Output(format!("failed to spawn audio thread: {e}")))?;

        match init_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(AudioError::Output("audio thread died during init".into()));
            }
        }

        log::info!("audio: output initialized on default device");

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }

    /// Audio-thread main loop.  Owns the `!Send` output stream.
    fn run(cmd_rx: &mpsc::Receiver<DeviceCommand>, init_tx: &mpsc::Sender<Result<(), AudioError>>) {
        let (stream, stream_handle) = match OutputStream::try_default() {
            Ok(pair) => pair,
            Err(e) => {
                let _ = init_tx.send(Err(AudioError::Output(e.to_string())));
                return;
            }
        };
        // Keep the stream alive for the lifetime of the loop.
        let _stream = stream;
        let _ = init_tx.send(Ok(()));

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                DeviceCommand::Load {
                    bytes,
                    looping,
                    reply,
                } => {
                    let result = (|| {
                        let source = Decoder::new(Cursor::new(bytes))
                            .map_err(|e| AudioError::Decode(e.to_string()))?;

                        let sink = Sink::try_new(&stream_handle)
                            .map_err(|e| AudioError::Output(e.to_string()))?;

                        // Handles start paused; `play` flips them live.
                        sink.pause();
                        if looping {
                            sink.append(source.repeat_infinite());
                        } else {
                            sink.append(source);
                        }
                        Ok(Arc::new(sink))
                    })();

                    let _ = reply.send(result);
                }
                DeviceCommand::Shutdown => break,
            }
        }

        log::debug!("audio: thread shutting down");
    }
}

impl AudioOutput for RodioOutput {
    fn load(&self, bytes: Vec<u8>, looping: bool) -> Result<Arc<dyn AudioHandle>, AudioError> {
        let (reply_tx, reply_rx) = mpsc::channel();

        self.cmd_tx
            .send(DeviceCommand::Load {
                bytes,
                looping,
                reply: reply_tx,
            })
            .map_err(|_| AudioError::Output("audio thread is gone".into()))?;

        let sink = reply_rx
            .recv()
            .map_err(|_| AudioError::Output("audio thread is gone".into()))??;

        Ok(Arc::new(RodioHandle { sink }))
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(DeviceCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

// ---------------------------------------------------------------------------
// RodioHandle
// ---------------------------------------------------------------------------

/// One loaded piece of audio backed by a `rodio::Sink`.
struct RodioHandle {
    sink: Arc<Sink>,
}

impl AudioHandle for RodioHandle {
    fn play(&self) -> Result<(), AudioError> {
        // rodio sinks cannot refuse playback once created; device failures
        // show up as the sink draining immediately.
        self.sink.play();
        Ok(())
    }

    fn pause(&self) {
        self.sink.pause();
    }

    fn resume(&self) {
        self.sink.play();
    }

    fn stop(&self) {
        // Drops queued sources, releasing the decoded buffer, and wakes any
        // `sleep_until_end` watcher.
        self.sink.stop();
    }

    fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume.clamp(0.0, 1.0));
    }

    fn watch_end(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let sink = Arc::clone(&self.sink);

        // `sleep_until_end` blocks until the queue drains or `stop()` is
        // called, so this must live on a plain OS thread, never the async
        // runtime.
        thread::spawn(move || {
            sink.sleep_until_end();
            let _ = tx.send(());
        });

        rx
    }
}
