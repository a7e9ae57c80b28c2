use serde::Serialize;

/// Voice transport connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionStatus {
    Signalling,
    Connecting,
    Ready,
    Disconnected,
    Destroyed,
}

impl ConnectionStatus {
    /// Whether audio can still be sent over a connection in this state.
    /// Signalling/Connecting are treated optimistically.
    pub fn is_usable(&self) -> bool {
        !matches!(self, ConnectionStatus::Disconnected | ConnectionStatus::Destroyed)
    }
}

/// Voice transport error types
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("not connected to a voice channel")]
    NotConnected,

    #[error("already connected to a voice channel")]
    AlreadyConnected,

    #[error("transport error: {0}")]
    Transport(String),
}
