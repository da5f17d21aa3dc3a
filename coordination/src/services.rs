//! External service contracts: reasoning (utterances) and narration (audio).
//!
//! The engine only calls these traits. Concrete adapters live outside the
//! core; every call is wrapped in a `tokio::time::timeout` by the caller.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::roles::CourtRole;
use crate::scenario::ScenarioCatalog;
use crate::session::TrialPhase;

/// Errors from an external service call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Service timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed service response: {0}")]
    Malformed(String),

    #[error("Request failed: {0}")]
    Request(String),
}

/// Everything the reasoning service needs to produce one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub session_id: String,
    pub phase: TrialPhase,
    pub role: CourtRole,
    pub speaker_id: String,
    pub speaker_name: String,
    pub persona: String,
    /// Role being addressed, for examination turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addressee: Option<CourtRole>,
    pub fact_context: Vec<String>,
    /// Trailing transcript window, oldest first, as "Name: text" lines.
    pub history: Vec<String>,
    /// Extra instructions (exclusions after a sustained objection, ruling format).
    pub constraints: Vec<String>,
}

/// Text produced by the reasoning service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Voice settings for one narration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoicePersona {
    pub role: CourtRole,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

/// A request to speak one turn aloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationRequest {
    pub session_id: String,
    pub sequence: u64,
    pub text: String,
    pub voice: VoicePersona,
}

/// How narration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    /// Audio played to the end.
    Played,
    /// Service chose to show text instead of audio.
    Fallback,
    /// Playback failed.
    Error,
}

/// Completion signal from the narration service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub status: CompletionStatus,
    pub duration_ms: u64,
}

impl Completion {
    pub fn played(duration_ms: u64) -> Self {
        Self {
            status: CompletionStatus::Played,
            duration_ms,
        }
    }

    pub fn fallback() -> Self {
        Self {
            status: CompletionStatus::Fallback,
            duration_ms: 0,
        }
    }
}

/// Produces each agent's next utterance.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Utterance, ServiceError>;
}

/// Converts an utterance to audio and reports completion.
#[async_trait]
pub trait NarrationService: Send + Sync {
    async fn narrate(&self, request: &NarrationRequest) -> Result<Completion, ServiceError>;
}

/// The collaborators a trial engine calls out to.
#[derive(Clone)]
pub struct TrialServices {
    pub reasoning: Arc<dyn ReasoningService>,
    pub narration: Arc<dyn NarrationService>,
    pub catalog: Arc<dyn ScenarioCatalog>,
}

impl TrialServices {
    pub fn new(
        reasoning: Arc<dyn ReasoningService>,
        narration: Arc<dyn NarrationService>,
        catalog: Arc<dyn ScenarioCatalog>,
    ) -> Self {
        Self {
            reasoning,
            narration,
            catalog,
        }
    }
}
