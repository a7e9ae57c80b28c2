pub mod connection;
pub mod types;

pub use connection::{wait_ready, VoiceConnection, VoiceTransport};
pub use types::{ConnectionStatus, VoiceError};
