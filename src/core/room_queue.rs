//! # Room Queue
//!
//! The per-room FIFO playback queue. It owns the backlog of pending
//! utterances and a single drain worker task that reconciles three
//! independently-moving parts (the synthesizer, the playback engine and the
//! voice connection) into one "what plays next" decision.
//!
//! ## Model
//!
//! The worker is the only task that pops the backlog, calls the synthesizer
//! and awaits engine events, so no two drain cycles for the same room can
//! ever overlap; `enqueue`, `interrupt` and `clear` are safe from any task
//! and only mutate shared state under short locks. One drain cycle is:
//! pop → check connection (single status read, treated as a value) →
//! synthesize → play → await the terminal event carrying this cycle's token
//! → delete the artifact → next. Failures of a single utterance are logged
//! and skipped; they never stall the queue.
//!
//! Interrupt clips bypass the backlog: they preempt the active stream at the
//! engine level and park the worker until the clip's own terminal event
//! arrives. An utterance cycle that was in flight when the interrupt landed
//! is abandoned: its artifact is still released when its event shows up,
//! and the cycle-token comparison keeps that stale completion from
//! advancing the queue twice.
//!
//! Connection policy: with no connection attached the backlog is held
//! untouched and nothing is synthesized. With a connection that has gone
//! `Disconnected`/`Destroyed` the whole backlog is flushed; replaying a
//! pile of stale chat after reconnecting is worse than saying nothing.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::normalize::normalize;
use super::playback::{CycleToken, EngineEvent, EngineStatus, OutputDevice, PlaybackEngine};
use super::synth::SpeechSynthesizer;
use crate::voice::{ConnectionStatus, VoiceConnection};

/// Queue playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PlaybackState {
    /// Nothing playing; the backlog is empty or waiting for a connection.
    Idle,
    /// One utterance is being synthesized or played.
    Draining,
    /// An out-of-band clip is playing; the backlog is untouched.
    Interrupted,
}

/// Read-only snapshot returned by [`RoomQueue::status`].
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct QueueStatus {
    pub backlog: usize,
    pub state: PlaybackState,
    pub engine: EngineStatus,
}

/// State shared between the queue handle and its drain worker.
#[derive(Clone)]
struct Shared {
    backlog: Arc<Mutex<VecDeque<String>>>,
    state: Arc<Mutex<PlaybackState>>,
    connection: Arc<Mutex<Option<Arc<dyn VoiceConnection>>>>,
    /// Cycle token of the clip currently interrupting, if any.
    interrupt_cycle: Arc<Mutex<Option<CycleToken>>>,
    engine: Arc<PlaybackEngine>,
    synth: Arc<dyn SpeechSynthesizer>,
    drain_notify: Arc<Notify>,
    cycles: Arc<AtomicU64>,
    /// Bumped by `clear()`; a drain cycle that spans a bump abandons itself.
    epoch: Arc<AtomicU64>,
    shutdown: CancellationToken,
}

/// FIFO playback queue for one room. See the module docs for the model.
pub struct RoomQueue {
    shared: Shared,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RoomQueue {
    /// Create the queue and spawn its drain worker. Must be called within a
    /// tokio runtime.
    pub fn new(synth: Arc<dyn SpeechSynthesizer>, device: Arc<dyn OutputDevice>) -> Self {
        let (engine, events) = PlaybackEngine::new(device);
        let shared = Shared {
            backlog: Arc::new(Mutex::new(VecDeque::new())),
            state: Arc::new(Mutex::new(PlaybackState::Idle)),
            connection: Arc::new(Mutex::new(None)),
            interrupt_cycle: Arc::new(Mutex::new(None)),
            engine: Arc::new(engine),
            synth,
            drain_notify: Arc::new(Notify::new()),
            cycles: Arc::new(AtomicU64::new(0)),
            epoch: Arc::new(AtomicU64::new(0)),
            shutdown: CancellationToken::new(),
        };
        let worker = tokio::spawn(drain_worker(shared.clone(), events));
        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Normalize `text` and append it to the backlog. Input that normalizes
    /// to nothing is dropped silently, a no-op rather than an error. Wakes the
    /// drain worker; if a cycle is already running the text just queues up.
    pub fn enqueue(&self, text: &str) {
        let normalized = normalize(text);
        if normalized.is_empty() {
            debug!("message empty after normalization; dropped");
            return;
        }
        let depth = {
            let mut backlog = self.shared.backlog.lock();
            backlog.push_back(normalized);
            backlog.len()
        };
        debug!(depth, "utterance queued");
        self.shared.drain_notify.notify_one();
    }

    /// Play `clip` immediately, preempting any in-progress utterance. The
    /// backlog is untouched; draining resumes after the clip's terminal
    /// event. Clip files are caller-owned and never deleted here.
    pub fn interrupt(&self, clip: impl Into<PathBuf>) {
        let clip = clip.into();
        let cycle = next_cycle(&self.shared.cycles);
        {
            // Holding the interrupt slot across the play call keeps a racing
            // drain cycle from preempting the clip with its own utterance.
            let mut slot = self.shared.interrupt_cycle.lock();
            *slot = Some(cycle);
            self.shared.engine.play(clip.clone(), cycle);
        }
        *self.shared.state.lock() = PlaybackState::Interrupted;
        info!(cycle, clip = %clip.display(), "interrupt clip started");
    }

    /// Attach (or replace) the voice connection. Any stream bound to a
    /// previous connection is stopped; a backlog held while unjoined starts
    /// draining.
    pub fn set_connection(&self, connection: Arc<dyn VoiceConnection>) {
        let previous = self.shared.connection.lock().replace(connection);
        if previous.is_some() {
            debug!("voice connection replaced");
            self.shared.engine.stop(true);
        }
        self.shared.drain_notify.notify_one();
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connection.lock().is_some()
    }

    /// Status of the attached connection, if any.
    pub fn connection_status(&self) -> Option<ConnectionStatus> {
        self.shared.connection.lock().as_ref().map(|c| c.status())
    }

    /// Empty the backlog, stop playback and force `Idle`. An in-flight
    /// synthesis notices the epoch bump and discards its artifact instead of
    /// playing it.
    pub fn clear(&self) {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.backlog.lock().clear();
        *self.shared.interrupt_cycle.lock() = None;
        self.shared.engine.stop(true);
        *self.shared.state.lock() = PlaybackState::Idle;
        debug!("queue cleared");
    }

    /// `clear()` plus release and destroy the connection.
    pub fn disconnect(&self) {
        self.clear();
        let connection = self.shared.connection.lock().take();
        if let Some(connection) = connection {
            connection.destroy();
        }
        info!("room queue disconnected");
    }

    /// Read-only snapshot of the queue.
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            backlog: self.shared.backlog.lock().len(),
            state: *self.shared.state.lock(),
            engine: self.shared.engine.status(),
        }
    }
}

impl Drop for RoomQueue {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }
}

fn next_cycle(cycles: &AtomicU64) -> CycleToken {
    cycles.fetch_add(1, Ordering::SeqCst) + 1
}

fn set_state(shared: &Shared, state: PlaybackState) {
    *shared.state.lock() = state;
}

/// Worker entry point: parks until woken by an enqueue, a connection change
/// or an engine event, then drains.
async fn drain_worker(shared: Shared, mut events: mpsc::UnboundedReceiver<EngineEvent>) {
    debug!("drain worker started");
    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = shared.drain_notify.notified() => {
                drain(&shared, &mut events).await;
            }
            Some(event) = events.recv() => {
                // A clip finishing while the worker was parked: resume the
                // backlog. Anything else here is a stale completion.
                let resumed = {
                    let mut slot = shared.interrupt_cycle.lock();
                    if *slot == Some(event.cycle()) {
                        *slot = None;
                        true
                    } else {
                        false
                    }
                };
                if resumed {
                    if let EngineEvent::Errored { error, .. } = &event {
                        warn!(%error, "interrupt clip playback failed");
                    }
                    drain(&shared, &mut events).await;
                } else {
                    debug!(cycle = event.cycle(), "stale playback event ignored");
                }
            }
        }
    }
    debug!("drain worker exited");
}

/// Drain the backlog one utterance at a time until it is empty or unusable.
/// Explicitly a loop: failure paths continue to the next item instead of
/// re-entering through a callback.
async fn drain(shared: &Shared, events: &mut mpsc::UnboundedReceiver<EngineEvent>) {
    loop {
        if !settle_interrupt(shared, events).await {
            return;
        }

        let epoch = shared.epoch.load(Ordering::SeqCst);

        let connection = shared.connection.lock().clone();
        let Some(connection) = connection else {
            if !shared.backlog.lock().is_empty() {
                warn!("no voice connection; backlog held until one is set");
            }
            set_state(shared, PlaybackState::Idle);
            return;
        };

        // One authoritative status read per drain decision.
        let status = connection.status();
        if !status.is_usable() {
            let dropped = {
                let mut backlog = shared.backlog.lock();
                let count = backlog.len();
                backlog.clear();
                count
            };
            if dropped > 0 {
                warn!(dropped, ?status, "voice connection unusable; backlog flushed");
            }
            set_state(shared, PlaybackState::Idle);
            return;
        }

        let Some(text) = shared.backlog.lock().pop_front() else {
            set_state(shared, PlaybackState::Idle);
            return;
        };
        set_state(shared, PlaybackState::Draining);
        debug!(remaining = shared.backlog.lock().len(), "drain cycle started");

        let artifact = match shared.synth.synthesize(&text).await {
            Ok(artifact) => artifact,
            Err(error) => {
                warn!(%error, "synthesis failed; utterance skipped");
                continue;
            }
        };

        if shared.epoch.load(Ordering::SeqCst) != epoch {
            // Cleared while synthesizing; the artifact must still be released.
            artifact.discard().await;
            continue;
        }

        let cycle = next_cycle(&shared.cycles);
        let started = {
            let slot = shared.interrupt_cycle.lock();
            if slot.is_none() {
                shared.engine.play(artifact.path().to_path_buf(), cycle);
                true
            } else {
                false
            }
        };
        if !started {
            // Interrupted mid-synthesis; this cycle is abandoned.
            debug!("utterance abandoned: interrupt arrived during synthesis");
            artifact.discard().await;
            continue;
        }

        let completed = wait_for_cycle(shared, events, cycle).await;
        artifact.discard().await;
        if !completed {
            return;
        }
    }
}

/// If a clip is interrupting, consume events until its terminal one arrives.
/// Returns `false` on shutdown.
async fn settle_interrupt(
    shared: &Shared,
    events: &mut mpsc::UnboundedReceiver<EngineEvent>,
) -> bool {
    loop {
        let waiting_on = *shared.interrupt_cycle.lock();
        let Some(clip_cycle) = waiting_on else {
            return true;
        };
        set_state(shared, PlaybackState::Interrupted);

        tokio::select! {
            _ = shared.shutdown.cancelled() => return false,
            event = events.recv() => {
                let Some(event) = event else { return false };
                if event.cycle() == clip_cycle {
                    if let EngineEvent::Errored { error, .. } = &event {
                        warn!(%error, "interrupt clip playback failed");
                    }
                    *shared.interrupt_cycle.lock() = None;
                } else {
                    debug!(cycle = event.cycle(), "stale playback event ignored");
                }
            }
        }
    }
}

/// Await the terminal event for `cycle`. Events for an interrupt clip are
/// settled in passing; anything else is stale. Returns `false` on shutdown.
async fn wait_for_cycle(
    shared: &Shared,
    events: &mut mpsc::UnboundedReceiver<EngineEvent>,
    cycle: CycleToken,
) -> bool {
    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => return false,
            event = events.recv() => {
                let Some(event) = event else { return false };
                if event.cycle() == cycle {
                    if let EngineEvent::Errored { error, .. } = &event {
                        warn!(%error, "playback failed; utterance skipped");
                    }
                    return true;
                }
                let mut slot = shared.interrupt_cycle.lock();
                if *slot == Some(event.cycle()) {
                    // Short clip finished before the preempted utterance's
                    // own event made it through.
                    *slot = None;
                } else {
                    debug!(cycle = event.cycle(), "stale playback event ignored");
                }
            }
        }
    }
}
