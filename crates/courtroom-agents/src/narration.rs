//! Narration adapters.
//!
//! Audio bytes are fetched and discarded: playback happens on the client.
//! Duration is estimated from the word count so pacing can still be scored.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};
use trial_coordination::{Completion, NarrationRequest, NarrationService, ServiceError};

use crate::config::NarrationConfig;
use crate::reasoning::{status_error, transport_error};

/// Shortest clip a turn is assumed to take.
const MIN_CLIP_MS: u64 = 2_000;

/// Estimated speaking time for `text` at `words_per_minute`.
pub fn estimate_duration_ms(text: &str, words_per_minute: f64) -> u64 {
    let words = text.split_whitespace().count();
    if words == 0 || !words_per_minute.is_finite() || words_per_minute <= 0.0 {
        return MIN_CLIP_MS;
    }
    let ms = (words as f64 * 60_000.0 / words_per_minute).round() as u64;
    ms.max(MIN_CLIP_MS)
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// ElevenLabs-compatible text-to-speech service.
pub struct ElevenLabsNarration {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    config: NarrationConfig,
    timeout: Duration,
}

impl ElevenLabsNarration {
    /// Build a client. Returns `None` when no API key is configured.
    pub fn from_config(config: &NarrationConfig) -> Result<Option<Self>, reqwest::Error> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let timeout = Duration::from_secs(config.request_timeout_secs);
        Ok(Some(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            config: config.clone(),
            timeout,
        }))
    }

    fn speech_url(&self, voice_id: &str) -> String {
        format!("{}/text-to-speech/{}", self.base_url, voice_id)
    }
}

#[async_trait]
impl NarrationService for ElevenLabsNarration {
    async fn narrate(&self, request: &NarrationRequest) -> Result<Completion, ServiceError> {
        let Some(voice_id) = request.voice.voice_id.as_deref().filter(|v| !v.trim().is_empty())
        else {
            debug!(sequence = request.sequence, role = %request.voice.role, "No voice assigned, showing text");
            return Ok(Completion::fallback());
        };

        let body = SpeechRequest {
            text: &request.text,
            model_id: &self.config.model_id,
            voice_settings: VoiceSettings {
                stability: self.config.stability,
                similarity_boost: self.config.similarity_boost,
            },
        };
        let response = self
            .http
            .post(self.speech_url(voice_id))
            .header("Accept", "audio/mpeg")
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, sequence = request.sequence, "Speech synthesis rejected");
            return Err(status_error(status, &detail));
        }
        let audio = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        if audio.is_empty() {
            return Err(ServiceError::Malformed("empty audio clip".to_string()));
        }

        let duration_ms = estimate_duration_ms(&request.text, self.config.words_per_minute);
        debug!(
            sequence = request.sequence,
            bytes = audio.len(),
            duration_ms,
            "Speech synthesized"
        );
        if self.config.realtime_playback {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        }
        Ok(Completion::played(duration_ms))
    }
}

/// Shows every turn as text.
#[derive(Debug, Default, Clone)]
pub struct TextOnlyNarration {
    /// Hold each turn for its estimated reading time.
    pub realtime: Option<f64>,
}

impl TextOnlyNarration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause for the reading time of each turn at `words_per_minute`.
    pub fn realtime(words_per_minute: f64) -> Self {
        Self {
            realtime: Some(words_per_minute),
        }
    }
}

#[async_trait]
impl NarrationService for TextOnlyNarration {
    async fn narrate(&self, request: &NarrationRequest) -> Result<Completion, ServiceError> {
        if let Some(wpm) = self.realtime {
            let duration_ms = estimate_duration_ms(&request.text, wpm);
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        }
        Ok(Completion::fallback())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trial_coordination::{CompletionStatus, CourtRole, VoicePersona};

    fn request(voice_id: Option<&str>) -> NarrationRequest {
        NarrationRequest {
            session_id: "s-1".into(),
            sequence: 3,
            text: "Where were you standing?".into(),
            voice: VoicePersona {
                role: CourtRole::Prosecutor,
                display_name: "Prosecutor Lane".into(),
                voice_id: voice_id.map(str::to_string),
            },
        }
    }

    #[test]
    fn test_duration_estimate() {
        let sentence = vec!["word"; 300].join(" ");
        assert_eq!(estimate_duration_ms(&sentence, 150.0), 120_000);
        assert_eq!(estimate_duration_ms("Objection.", 150.0), MIN_CLIP_MS);
        assert_eq!(estimate_duration_ms("", 150.0), MIN_CLIP_MS);
        assert_eq!(estimate_duration_ms("a b c", 0.0), MIN_CLIP_MS);
    }

    #[tokio::test]
    async fn test_missing_voice_falls_back_to_text() {
        let config = NarrationConfig {
            api_key: Some("xi-test".into()),
            ..Default::default()
        };
        let narration = ElevenLabsNarration::from_config(&config).unwrap().unwrap();
        let completion = narration.narrate(&request(None)).await.unwrap();
        assert_eq!(completion.status, CompletionStatus::Fallback);
    }

    #[test]
    fn test_speech_url() {
        let config = NarrationConfig {
            api_key: Some("xi-test".into()),
            base_url: "https://tts.example/v1/".into(),
            ..Default::default()
        };
        let narration = ElevenLabsNarration::from_config(&config).unwrap().unwrap();
        assert_eq!(
            narration.speech_url("abc"),
            "https://tts.example/v1/text-to-speech/abc"
        );
        assert!(ElevenLabsNarration::from_config(&NarrationConfig::default())
            .unwrap()
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_only_realtime_holds_for_reading_time() {
        let narration = TextOnlyNarration::realtime(60.0);
        let started = tokio::time::Instant::now();
        let completion = narration.narrate(&request(Some("abc"))).await.unwrap();
        assert_eq!(completion, Completion::fallback());
        assert!(started.elapsed() >= Duration::from_secs(4));
    }
}
