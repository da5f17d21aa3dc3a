//! Voice sync coordinator: gates turn advance on narration completion.
//!
//! Split into three steps so the engine can drain its command inbox around
//! the single suspension point:
//!
//! ```text
//! begin()            await_completion()          settle()
//! Pending → Playing  narrate under timeout  ──▶  Complete | Skipped(+fallback)
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{TrialError, TrialResult};
use crate::services::{
    CompletionStatus, NarrationRequest, NarrationService, ServiceError, VoicePersona,
};
use crate::transcript::{NarrationStatus, TranscriptLog};

/// What the narration service reported, after timeout handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum NarrationSignal {
    Played { duration_ms: u64 },
    /// Service asked for a text fallback.
    Fallback,
    /// Service errored, timed out, or reported a playback error.
    Unavailable { reason: String },
}

/// Final narration state of a turn.
#[derive(Debug, Clone)]
pub struct NarrationOutcome {
    pub sequence: u64,
    pub status: NarrationStatus,
    pub text_fallback: bool,
    pub duration_ms: Option<u64>,
    /// Set when audio failed; surfaced as a warning event.
    pub warning: Option<TrialError>,
}

/// Coordinates narration for one session.
#[derive(Debug, Clone)]
pub struct VoiceSyncCoordinator {
    timeout: Duration,
}

impl VoiceSyncCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Build the narration request for a turn and mark it `Playing`.
    ///
    /// A regenerated turn that was already narrated keeps its status.
    pub fn begin(
        &self,
        session_id: &str,
        transcript: &mut TranscriptLog,
        sequence: u64,
        voice: VoicePersona,
    ) -> TrialResult<NarrationRequest> {
        let turn = transcript.turn_mut(sequence)?;
        if turn.narration == NarrationStatus::Pending {
            turn.advance_narration(NarrationStatus::Playing)?;
        }
        debug!(session_id, sequence, revision = turn.revision, "Narration started");
        Ok(NarrationRequest {
            session_id: session_id.to_string(),
            sequence,
            text: turn.content.clone(),
            voice,
        })
    }

    /// Call the narration service. Never fails: errors become a signal.
    pub async fn await_completion(
        &self,
        service: &dyn NarrationService,
        request: &NarrationRequest,
    ) -> NarrationSignal {
        let result = match tokio::time::timeout(self.timeout, service.narrate(request)).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout {
                after_ms: self.timeout.as_millis() as u64,
            }),
        };
        match result {
            Ok(completion) => match completion.status {
                CompletionStatus::Played => NarrationSignal::Played {
                    duration_ms: completion.duration_ms,
                },
                CompletionStatus::Fallback => NarrationSignal::Fallback,
                CompletionStatus::Error => NarrationSignal::Unavailable {
                    reason: "playback reported an error".to_string(),
                },
            },
            Err(e) => NarrationSignal::Unavailable {
                reason: e.to_string(),
            },
        }
    }

    /// Apply a completion signal to the turn.
    ///
    /// Both `Complete` and `Skipped` release the scheduler.
    pub fn settle(
        &self,
        transcript: &mut TranscriptLog,
        sequence: u64,
        signal: NarrationSignal,
    ) -> TrialResult<NarrationOutcome> {
        let turn = transcript.turn_mut(sequence)?;
        let renarration = turn.renarrate;
        turn.renarrate = false;

        let mut warning = None;
        match signal {
            NarrationSignal::Played { duration_ms } => {
                if !renarration {
                    turn.advance_narration(NarrationStatus::Complete)?;
                }
                // Status never moves back, so a skipped turn keeps its text fallback.
                if turn.narration == NarrationStatus::Skipped {
                    turn.text_fallback = true;
                } else {
                    turn.text_fallback = false;
                    turn.narration_ms = Some(duration_ms);
                }
            }
            NarrationSignal::Fallback => {
                if !renarration {
                    turn.advance_narration(NarrationStatus::Skipped)?;
                }
                turn.text_fallback = true;
            }
            NarrationSignal::Unavailable { reason } => {
                if !renarration {
                    turn.advance_narration(NarrationStatus::Skipped)?;
                }
                turn.text_fallback = true;
                warn!(sequence, reason = %reason, "Narration unavailable, falling back to text");
                warning = Some(TrialError::NarrationUnavailable { sequence, reason });
            }
        }

        Ok(NarrationOutcome {
            sequence,
            status: turn.narration,
            text_fallback: turn.text_fallback,
            duration_ms: turn.narration_ms,
            warning,
        })
    }

    /// Run all three steps back to back.
    pub async fn narrate_turn(
        &self,
        session_id: &str,
        transcript: &mut TranscriptLog,
        service: &dyn NarrationService,
        sequence: u64,
        voice: VoicePersona,
    ) -> TrialResult<NarrationOutcome> {
        let request = self.begin(session_id, transcript, sequence, voice)?;
        let signal = self.await_completion(service, &request).await;
        self.settle(transcript, sequence, signal)
    }
}
