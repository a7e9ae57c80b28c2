//! # Playback Engine
//!
//! Thin adapter over a single audio output device. The device guarantees
//! exclusivity (at most one active stream); the engine adds the lifecycle
//! contract the room queue depends on: every accepted `play` call produces
//! exactly one terminal [`EngineEvent`] on the engine's event channel, tagged
//! with the caller's cycle token: finished, errored, preempted by a later
//! `play`, or stopped. The queue's drain loop awaits
//! these typed events instead of registering callbacks, which turns the
//! stale-completion race into a token comparison.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Monotonically increasing token identifying one play call.
pub type CycleToken = u64;

/// Playback-specific error types
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("output device error: {0}")]
    Device(String),

    #[error("audio source not playable: {0}")]
    BadSource(String),
}

/// Terminal event for one accepted `play` call.
#[derive(Debug)]
pub enum EngineEvent {
    /// The stream ended: it played out, was preempted, or was stopped.
    Finished { cycle: CycleToken },
    /// The device could not play the stream.
    Errored { cycle: CycleToken, error: PlaybackError },
}

impl EngineEvent {
    pub fn cycle(&self) -> CycleToken {
        match self {
            EngineEvent::Finished { cycle } => *cycle,
            EngineEvent::Errored { cycle, .. } => *cycle,
        }
    }
}

/// Coarse engine state exposed in status snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum EngineStatus {
    Idle,
    Playing,
}

/// Seam to the actual audio output.
///
/// A production device plays the file into the room's voice transport; tests
/// supply mocks. One instance backs one engine.
#[async_trait]
pub trait OutputDevice: Send + Sync {
    /// Play the audio at `source` to completion. The engine preempts a
    /// stream by dropping this future; implementations must stop emitting
    /// output when that happens.
    async fn play(&self, source: &Path) -> Result<(), PlaybackError>;

    /// Immediately silence the device, regardless of stream state.
    fn stop(&self);
}

struct ActiveStream {
    cycle: CycleToken,
    cancel: CancellationToken,
}

/// Per-room playback adapter. See the module docs for the event contract.
pub struct PlaybackEngine {
    device: Arc<dyn OutputDevice>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    current: Arc<Mutex<Option<ActiveStream>>>,
}

impl PlaybackEngine {
    /// Create an engine over `device`; the returned receiver yields one
    /// terminal event per accepted `play` call.
    pub fn new(device: Arc<dyn OutputDevice>) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let engine = Self {
            device,
            events_tx,
            current: Arc::new(Mutex::new(None)),
        };
        (engine, events_rx)
    }

    /// Start playing `source`, preempting whatever is currently active.
    /// The preempted stream still gets its terminal event.
    pub fn play(&self, source: PathBuf, cycle: CycleToken) {
        let cancel = CancellationToken::new();
        let previous = {
            let mut current = self.current.lock();
            current.replace(ActiveStream {
                cycle,
                cancel: cancel.clone(),
            })
        };
        if let Some(previous) = previous {
            debug!(preempted = previous.cycle, cycle, "preempting active stream");
            previous.cancel.cancel();
        }

        let device = self.device.clone();
        let events = self.events_tx.clone();
        let current = self.current.clone();
        tokio::spawn(async move {
            let event = tokio::select! {
                _ = cancel.cancelled() => EngineEvent::Finished { cycle },
                result = device.play(&source) => match result {
                    Ok(()) => EngineEvent::Finished { cycle },
                    Err(error) => EngineEvent::Errored { cycle, error },
                },
            };
            {
                let mut active = current.lock();
                if active.as_ref().map(|s| s.cycle) == Some(cycle) {
                    *active = None;
                }
            }
            let _ = events.send(event);
        });
    }

    /// Stop the active stream, if any; its terminal event still fires.
    /// `force` additionally silences the device synchronously.
    pub fn stop(&self, force: bool) {
        let previous = self.current.lock().take();
        if let Some(stream) = previous {
            debug!(cycle = stream.cycle, force, "stopping active stream");
            stream.cancel.cancel();
            if force {
                self.device.stop();
            }
        }
    }

    pub fn status(&self) -> EngineStatus {
        if self.current.lock().is_some() {
            EngineStatus::Playing
        } else {
            EngineStatus::Idle
        }
    }
}
