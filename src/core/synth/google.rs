//! Google Translate TTS backend.
//!
//! Uses the public `translate_tts` endpoint: one GET request per utterance,
//! MP3 body streamed straight to a uniquely named temp file. No API key is
//! involved, which also means the service enforces a short input limit,
//! hence the truncation in [`SynthConfig::max_text_length`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};
use uuid::Uuid;

use super::base::{SpeechArtifact, SpeechSynthesizer, SynthConfig, SynthError, SynthResult};

/// Public Google Translate TTS endpoint
pub const GOOGLE_TRANSLATE_TTS_URL: &str = "https://translate.google.com/translate_tts";

/// HTTP-based synthesizer backed by the Google Translate TTS endpoint.
pub struct GoogleTranslateSynth {
    config: SynthConfig,
    endpoint: String,
    output_dir: PathBuf,
    client: reqwest::Client,
}

impl GoogleTranslateSynth {
    /// Create a new synthesizer with the given configuration.
    pub fn new(config: SynthConfig) -> SynthResult<Self> {
        let timeout = Duration::from_secs(config.request_timeout.unwrap_or(60));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynthError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            endpoint: GOOGLE_TRANSLATE_TTS_URL.to_string(),
            output_dir: std::env::temp_dir(),
            client,
        })
    }

    /// Override the service endpoint (used by tests to point at a mock server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override where artifact files are written (default: the OS temp dir).
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    fn artifact_path(&self) -> PathBuf {
        self.output_dir.join(format!("tts_{}.mp3", Uuid::new_v4()))
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTranslateSynth {
    async fn synthesize(&self, text: &str) -> SynthResult<SpeechArtifact> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SynthError::InvalidInput("text must not be empty".to_string()));
        }

        // Enforce the service input limit by truncation, on char boundaries.
        let clipped: String = text.chars().take(self.config.max_text_length).collect();
        let textlen = clipped.chars().count().to_string();
        let slow = self.config.speed < 1.0;

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", self.config.language.as_str()),
                ("q", clipped.as_str()),
                ("total", "1"),
                ("idx", "0"),
                ("textlen", textlen.as_str()),
                ("ttsspeed", if slow { "0.24" } else { "1" }),
            ])
            .send()
            .await
            .map_err(|e| SynthError::Network(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, "TTS service returned an error");
            return Err(SynthError::Service { status, body });
        }

        let path = self.artifact_path();
        let mut file = tokio::fs::File::create(&path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => file.write_all(&bytes).await?,
                Err(e) => {
                    // Drop the partial file; the artifact was never handed out.
                    drop(file);
                    let _ = tokio::fs::remove_file(&path).await;
                    return Err(SynthError::Network(format!("failed to read audio body: {e}")));
                }
            }
        }
        file.flush().await?;

        debug!(path = %path.display(), chars = textlen, "synthesized utterance");
        Ok(SpeechArtifact::new(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_empty_input() {
        let synth = GoogleTranslateSynth::new(SynthConfig::default()).unwrap();
        let result = synth.synthesize("   ").await;
        assert!(matches!(result, Err(SynthError::InvalidInput(_))));
    }

    #[test]
    fn artifact_paths_are_unique() {
        let synth = GoogleTranslateSynth::new(SynthConfig::default()).unwrap();
        assert_ne!(synth.artifact_path(), synth.artifact_path());
    }
}
