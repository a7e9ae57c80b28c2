//! # Speech Synthesizer Boundary
//!
//! The queue treats text-to-speech generation as a black box behind the
//! [`SpeechSynthesizer`] trait: text in, a locally stored audio artifact out,
//! or a synthesis error. The artifact is a transient file exclusively owned
//! by the drain cycle that requested it; [`SpeechArtifact::discard`] must be
//! called on every exit path of that cycle, with a best-effort `Drop`
//! fallback for the paths that cannot.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

/// Default synthesis language.
pub const DEFAULT_LANGUAGE: &str = "it-IT";
/// Default speaking speed factor.
pub const DEFAULT_SPEED: f32 = 1.0;
/// Maximum characters sent to the synthesizer; longer input is truncated.
pub const MAX_TEXT_LENGTH: usize = 200;

/// Synthesis-specific error types
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("synthesis request failed: {0}")]
    Network(String),

    #[error("synthesis service error ({status}): {body}")]
    Service { status: u16, body: String },

    #[error("could not store audio artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid synthesis input: {0}")]
    InvalidInput(String),
}

/// Result type for synthesis operations
pub type SynthResult<T> = Result<T, SynthError>;

/// Configuration for speech synthesis
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SynthConfig {
    /// Language code passed to the synthesis service
    pub language: String,
    /// Speaking speed factor (values below 1.0 request slow speech)
    pub speed: f32,
    /// Maximum input length in characters; input is truncated beyond this
    pub max_text_length: usize,
    /// Request timeout in seconds
    pub request_timeout: Option<u64>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            speed: DEFAULT_SPEED,
            max_text_length: MAX_TEXT_LENGTH,
            request_timeout: Some(60),
        }
    }
}

/// Handle to one transient audio file produced by a synthesizer.
///
/// Exactly one playback cycle owns the artifact. `discard` deletes the file
/// and is the normal release path; if the handle is dropped without being
/// discarded, `Drop` removes the file best-effort so a failed cycle cannot
/// leak it.
#[derive(Debug)]
pub struct SpeechArtifact {
    path: PathBuf,
    armed: bool,
}

impl SpeechArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Location of the audio file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the underlying file. Deletion failures are logged and ignored;
    /// a missing file is not even worth logging.
    pub async fn discard(mut self) {
        self.armed = false;
        let path = std::mem::take(&mut self.path);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "audio artifact removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove audio artifact"),
        }
    }
}

impl Drop for SpeechArtifact {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Boundary trait for text-to-speech backends.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Convert `text` into a locally stored audio artifact.
    ///
    /// Implementations truncate input to their configured maximum length
    /// before contacting the service. The returned artifact is owned by the
    /// caller and must be released with [`SpeechArtifact::discard`].
    async fn synthesize(&self, text: &str) -> SynthResult<SpeechArtifact>;
}
