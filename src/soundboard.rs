//! Soundboard: per-user clips played when a configured user joins a voice
//! channel. Clips are pre-resolved files on disk; they go through the room
//! queue's interrupt path and are never deleted by the queue.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::ReaderConfig;
use crate::core::registry::RoomRegistry;

pub struct Soundboard {
    sounds_dir: PathBuf,
    user_sounds: HashMap<String, String>,
}

impl Soundboard {
    pub fn new(sounds_dir: impl Into<PathBuf>, user_sounds: HashMap<String, String>) -> Self {
        Self {
            sounds_dir: sounds_dir.into(),
            user_sounds,
        }
    }

    pub fn from_config(config: &ReaderConfig) -> Self {
        Self::new(config.sounds_dir.clone(), config.user_sounds.clone())
    }

    /// Whether the user has a clip configured (regardless of the file
    /// actually existing).
    pub fn has_sound(&self, username: &str) -> bool {
        self.user_sounds.contains_key(username)
    }

    /// All configured (username, clip file) pairs.
    pub fn configured_users(&self) -> Vec<(&str, &str)> {
        self.user_sounds
            .iter()
            .map(|(user, file)| (user.as_str(), file.as_str()))
            .collect()
    }

    /// Resolve the clip path for a user, verifying the file exists.
    fn clip_path(&self, username: &str) -> Option<PathBuf> {
        let file = self.user_sounds.get(username)?;
        let path = self.sounds_dir.join(file);
        if !path.exists() {
            warn!(username, path = %path.display(), "configured clip file not found");
            return None;
        }
        Some(path)
    }

    /// Play the user's clip into the room, interrupting any current
    /// utterance. Returns whether a clip was actually played.
    pub fn play_for_user(&self, registry: &RoomRegistry, username: &str, room_id: &str) -> bool {
        let Some(clip) = self.clip_path(username) else {
            return false;
        };
        info!(username, room_id, "playing join clip");
        registry.interrupt(room_id, &clip)
    }
}
