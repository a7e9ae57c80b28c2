use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::synth::{SynthConfig, DEFAULT_LANGUAGE, DEFAULT_SPEED, MAX_TEXT_LENGTH};

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Synthesis language code
    pub language: String,
    /// Speaking speed factor (values below 1.0 request slow speech)
    pub speed: f32,
    /// Maximum characters per utterance; longer messages are truncated
    pub max_text_length: usize,
    /// How long `join` waits for the transport to reach Ready before
    /// proceeding optimistically
    pub ready_timeout_secs: u64,
    /// Grace period a dropped transport gets to start reconnecting before
    /// the room is torn down
    pub reconnect_grace_secs: u64,
    /// Synthesis HTTP request timeout
    pub request_timeout_secs: u64,
    /// Directory holding soundboard clips
    pub sounds_dir: PathBuf,
    /// Username -> clip file name, played when that user joins voice
    pub user_sounds: HashMap<String, String>,
}

impl ReaderConfig {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let language = env::var("VOCERO_LANGUAGE").unwrap_or_else(|_| DEFAULT_LANGUAGE.to_string());

        let speed = match env::var("VOCERO_SPEED") {
            Ok(raw) => raw
                .parse::<f32>()
                .map_err(|e| format!("invalid VOCERO_SPEED: {e}"))?,
            Err(_) => DEFAULT_SPEED,
        };

        let max_text_length = match env::var("VOCERO_MAX_TEXT_LENGTH") {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|e| format!("invalid VOCERO_MAX_TEXT_LENGTH: {e}"))?,
            Err(_) => MAX_TEXT_LENGTH,
        };

        let ready_timeout_secs = match env::var("VOCERO_READY_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|e| format!("invalid VOCERO_READY_TIMEOUT_SECS: {e}"))?,
            Err(_) => 30,
        };

        let reconnect_grace_secs = match env::var("VOCERO_RECONNECT_GRACE_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|e| format!("invalid VOCERO_RECONNECT_GRACE_SECS: {e}"))?,
            Err(_) => 5,
        };

        let request_timeout_secs = match env::var("VOCERO_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|e| format!("invalid VOCERO_REQUEST_TIMEOUT_SECS: {e}"))?,
            Err(_) => 60,
        };

        let sounds_dir = env::var("VOCERO_SOUNDS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("sounds"));

        // JSON object, e.g. {"alice":"alice.mp3","bob":"horn.mp3"}
        let user_sounds = match env::var("VOCERO_USER_SOUNDS") {
            Ok(raw) => {
                serde_json::from_str(&raw).map_err(|e| format!("invalid VOCERO_USER_SOUNDS: {e}"))?
            }
            Err(_) => HashMap::new(),
        };

        Ok(ReaderConfig {
            language,
            speed,
            max_text_length,
            ready_timeout_secs,
            reconnect_grace_secs,
            request_timeout_secs,
            sounds_dir,
            user_sounds,
        })
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_secs(self.reconnect_grace_secs)
    }

    /// The synthesis slice of this configuration.
    pub fn synth_config(&self) -> SynthConfig {
        SynthConfig {
            language: self.language.clone(),
            speed: self.speed,
            max_text_length: self.max_text_length,
            request_timeout: Some(self.request_timeout_secs),
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            speed: DEFAULT_SPEED,
            max_text_length: MAX_TEXT_LENGTH,
            ready_timeout_secs: 30,
            reconnect_grace_secs: 5,
            request_timeout_secs: 60,
            sounds_dir: PathBuf::from("sounds"),
            user_sounds: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = ReaderConfig::default();
        assert_eq!(config.language, "it-IT");
        assert_eq!(config.speed, 1.0);
        assert_eq!(config.max_text_length, 200);
        assert_eq!(config.ready_timeout(), Duration::from_secs(30));
        assert_eq!(config.reconnect_grace(), Duration::from_secs(5));
        assert!(config.user_sounds.is_empty());
    }

    #[test]
    fn synth_config_carries_the_synthesis_fields() {
        let config = ReaderConfig {
            language: "es-ES".to_string(),
            speed: 0.8,
            max_text_length: 120,
            request_timeout_secs: 15,
            ..Default::default()
        };
        let synth = config.synth_config();
        assert_eq!(synth.language, "es-ES");
        assert_eq!(synth.speed, 0.8);
        assert_eq!(synth.max_text_length, 120);
        assert_eq!(synth.request_timeout, Some(15));
    }

    #[test]
    fn user_sounds_json_shape_parses() {
        let raw = r#"{"alice":"alice.mp3","bob":"horn.mp3"}"#;
        let parsed: HashMap<String, String> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.get("alice").map(String::as_str), Some("alice.mp3"));
        assert_eq!(parsed.len(), 2);
    }
}
