pub mod normalize;
pub mod playback;
pub mod registry;
pub mod room_queue;
pub mod synth;

// Re-export commonly used types for convenience
pub use normalize::{collapse_links, contains_link, is_speakable, normalize, strip_custom_emoji};
pub use playback::{CycleToken, EngineEvent, EngineStatus, OutputDevice, PlaybackEngine, PlaybackError};
pub use registry::RoomRegistry;
pub use room_queue::{PlaybackState, QueueStatus, RoomQueue};
pub use synth::{
    GoogleTranslateSynth, SpeechArtifact, SpeechSynthesizer, SynthConfig, SynthError, SynthResult,
};
