//! Reasoning adapters: an OpenAI-compatible chat client and a scripted
//! offline fallback.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use trial_coordination::{CourtRole, GenerationRequest, ReasoningService, ServiceError, Utterance};

use crate::config::ReasoningConfig;
use crate::personas;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat-completions reasoning service.
pub struct OpenAiReasoning {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiReasoning {
    /// Build a client. Returns `None` when no API key is configured.
    pub fn from_config(config: &ReasoningConfig) -> Result<Option<Self>, reqwest::Error> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let timeout = Duration::from_secs(config.request_timeout_secs);
        Ok(Some(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout,
        }))
    }

    fn chat_request(&self, request: &GenerationRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: personas::system_prompt(request),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: personas::user_prompt(request),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl ReasoningService for OpenAiReasoning {
    async fn generate(&self, request: &GenerationRequest) -> Result<Utterance, ServiceError> {
        let body = self.chat_request(request);
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, role = %request.role, "Chat completion rejected");
            return Err(status_error(status, &detail));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(format!("Failed to parse response: {}", e)))?;
        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ServiceError::Malformed("No content in chat completion".to_string()))?;

        debug!(role = %request.role, chars = text.len(), "Chat completion received");
        Ok(Utterance::new(text))
    }
}

/// Map a reqwest transport failure onto the service taxonomy.
pub(crate) fn transport_error(e: reqwest::Error, timeout: Duration) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout {
            after_ms: timeout.as_millis() as u64,
        }
    } else if e.is_connect() {
        ServiceError::Unavailable(e.to_string())
    } else {
        ServiceError::Request(e.to_string())
    }
}

/// Rate limits and server errors are transient; anything else is a bad request.
pub(crate) fn status_error(status: reqwest::StatusCode, detail: &str) -> ServiceError {
    let message = format!("HTTP {}: {}", status, detail.trim());
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ServiceError::Unavailable(message)
    } else {
        ServiceError::Request(message)
    }
}

const JUDGE_LINES: &[&str] = &[
    "Overruled. The witness may answer.",
    "Sustained. Counsel, rephrase your question.",
];

const PROSECUTOR_LINES: &[&str] = &[
    "Members of the jury, the evidence will show the defendant was at the scene that night.",
    "Where were you standing when you first saw the defendant?",
    "And you are certain of what you saw?",
    "Nothing further, Your Honor.",
];

const DEFENSE_LINES: &[&str] = &[
    "Your Honor, members of the jury, the defense will prove that the prosecution lacks sufficient evidence.",
    "How far away were you from the door?",
    "Was the lighting good at that hour?",
    "The defense rests, Your Honor.",
];

const WITNESS_LINES: &[&str] = &[
    "I was behind the counter when it happened.",
    "It was dark, but I could see the street light outside.",
    "I am fairly sure, yes.",
    "I told the officers everything I remembered.",
];

const COACH_LINES: &[&str] = &["Slow down and ask one fact per question."];

/// Cycles canned lines per role. Used when no reasoning endpoint is
/// configured, and in tests.
#[derive(Default)]
pub struct ScriptedReasoning {
    cursors: Mutex<HashMap<CourtRole, usize>>,
}

impl ScriptedReasoning {
    pub fn new() -> Self {
        Self::default()
    }

    fn lines(role: CourtRole) -> &'static [&'static str] {
        match role {
            CourtRole::Judge => JUDGE_LINES,
            CourtRole::Prosecutor => PROSECUTOR_LINES,
            CourtRole::Defense => DEFENSE_LINES,
            CourtRole::Witness => WITNESS_LINES,
            CourtRole::Coach => COACH_LINES,
        }
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoning {
    async fn generate(&self, request: &GenerationRequest) -> Result<Utterance, ServiceError> {
        let lines = Self::lines(request.role);
        let index = {
            let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
            let cursor = cursors.entry(request.role).or_default();
            let index = *cursor % lines.len();
            *cursor += 1;
            index
        };
        Ok(Utterance::new(lines[index]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trial_coordination::TrialPhase;

    fn request(role: CourtRole) -> GenerationRequest {
        GenerationRequest {
            session_id: "s-1".into(),
            phase: TrialPhase::Opening,
            role,
            speaker_id: role.to_string(),
            speaker_name: role.title().to_string(),
            persona: "Test persona.".into(),
            addressee: None,
            fact_context: vec![],
            history: vec![],
            constraints: vec![],
        }
    }

    #[tokio::test]
    async fn test_scripted_cycles_per_role() {
        let reasoning = ScriptedReasoning::new();
        let a = reasoning.generate(&request(CourtRole::Defense)).await.unwrap();
        let judge = reasoning.generate(&request(CourtRole::Judge)).await.unwrap();
        let b = reasoning.generate(&request(CourtRole::Defense)).await.unwrap();

        assert_eq!(a.text, DEFENSE_LINES[0]);
        assert_eq!(b.text, DEFENSE_LINES[1]);
        assert!(judge.text.starts_with("Overruled"));
    }

    #[tokio::test]
    async fn test_scripted_judge_alternates_verdicts() {
        let reasoning = ScriptedReasoning::new();
        let mut verdicts = Vec::new();
        for _ in 0..3 {
            verdicts.push(reasoning.generate(&request(CourtRole::Judge)).await.unwrap().text);
        }
        assert!(verdicts[1].starts_with("Sustained"));
        assert_eq!(verdicts[0], verdicts[2]);
    }

    #[test]
    fn test_from_config_without_key() {
        let reasoning = OpenAiReasoning::from_config(&ReasoningConfig::default()).unwrap();
        assert!(reasoning.is_none());
    }

    #[test]
    fn test_chat_request_shape() {
        let config = ReasoningConfig {
            api_key: Some("sk-test".into()),
            base_url: "http://localhost:8080/v1/".into(),
            ..Default::default()
        };
        let reasoning = OpenAiReasoning::from_config(&config).unwrap().unwrap();
        assert_eq!(reasoning.endpoint, "http://localhost:8080/v1/chat/completions");

        let body = serde_json::to_value(reasoning.chat_request(&request(CourtRole::Prosecutor)))
            .unwrap();
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["max_tokens"], 150);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn test_status_error_classification() {
        assert!(matches!(
            status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down"),
            ServiceError::Unavailable(_)
        ));
        assert!(matches!(
            status_error(reqwest::StatusCode::BAD_GATEWAY, ""),
            ServiceError::Unavailable(_)
        ));
        assert!(matches!(
            status_error(reqwest::StatusCode::UNAUTHORIZED, "bad key"),
            ServiceError::Request(_)
        ));
    }
}
