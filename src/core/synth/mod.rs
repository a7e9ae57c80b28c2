mod base;
pub mod google;

pub use base::{
    SpeechArtifact, SpeechSynthesizer, SynthConfig, SynthError, SynthResult, DEFAULT_LANGUAGE,
    DEFAULT_SPEED, MAX_TEXT_LENGTH,
};
pub use google::{GoogleTranslateSynth, GOOGLE_TRANSLATE_TTS_URL};
