pub mod commands;
pub mod config;
pub mod core;
pub mod soundboard;
pub mod voice;

// Re-export commonly used items for convenience
pub use crate::core::*;
pub use config::ReaderConfig;
pub use soundboard::Soundboard;
pub use voice::{ConnectionStatus, VoiceConnection, VoiceError, VoiceTransport};
