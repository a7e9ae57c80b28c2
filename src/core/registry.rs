//! Room registry: room id → [`RoomQueue`], created lazily, removed on leave.
//!
//! An explicit context object rather than a process-wide map, so callers
//! (and tests) can run any number of independent registries. Creation is
//! serialized by the map lock: two concurrent `get_or_create` calls for the
//! same room always yield the same queue.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::playback::OutputDevice;
use super::room_queue::RoomQueue;
use super::synth::SpeechSynthesizer;

/// Builds the per-room output device when a room queue is created.
pub type DeviceFactory = Box<dyn Fn() -> Arc<dyn OutputDevice> + Send + Sync>;

pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, Arc<RoomQueue>>>,
    synth: Arc<dyn SpeechSynthesizer>,
    device_factory: DeviceFactory,
}

impl RoomRegistry {
    pub fn new(
        synth: Arc<dyn SpeechSynthesizer>,
        device_factory: impl Fn() -> Arc<dyn OutputDevice> + Send + Sync + 'static,
    ) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            synth,
            device_factory: Box::new(device_factory),
        }
    }

    /// Return the room's queue, creating it on first reference. Must be
    /// called within a tokio runtime (queue creation spawns its worker).
    pub fn get_or_create(&self, room_id: &str) -> Arc<RoomQueue> {
        let mut rooms = self.rooms.lock();
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                info!(room_id, "creating room queue");
                Arc::new(RoomQueue::new(self.synth.clone(), (self.device_factory)()))
            })
            .clone()
    }

    /// Existing queue for the room, if any.
    pub fn get(&self, room_id: &str) -> Option<Arc<RoomQueue>> {
        self.rooms.lock().get(room_id).cloned()
    }

    /// Disconnect the room's queue (if present) and drop the mapping.
    pub fn remove(&self, room_id: &str) {
        let queue = self.rooms.lock().remove(room_id);
        if let Some(queue) = queue {
            queue.disconnect();
            info!(room_id, "room queue removed");
        }
    }

    /// Out-of-band entry point for soundboard clips. Returns whether the
    /// clip was handed to the room's engine; rooms that were never joined or
    /// have no connection are skipped.
    pub fn interrupt(&self, room_id: &str, clip: &Path) -> bool {
        let Some(queue) = self.get(room_id) else {
            debug!(room_id, "no queue for room; clip skipped");
            return false;
        };
        if !queue.is_connected() {
            debug!(room_id, "no active voice connection; clip skipped");
            return false;
        }
        queue.interrupt(clip.to_path_buf());
        true
    }

    pub fn len(&self) -> usize {
        self.rooms.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.lock().is_empty()
    }
}
