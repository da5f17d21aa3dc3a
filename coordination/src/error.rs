//! Trial error taxonomy
//!
//! Structural failures (bad scenario, stale or closed session) are returned
//! to the caller immediately and never retried. Per-turn failures
//! (generation, narration) degrade a single turn and surface as warning
//! events on the bus instead of aborting the session.

use thiserror::Error;

use crate::roles::CourtRole;
use crate::session::TrialPhase;
use crate::transcript::NarrationStatus;

/// Result type alias for trial operations
pub type TrialResult<T> = Result<T, TrialError>;

/// Errors raised by the orchestration core
#[derive(Error, Debug, Clone)]
pub enum TrialError {
    /// Scenario is missing required fields or is internally inconsistent
    #[error("Scenario '{scenario_id}' is invalid: {reason}")]
    ScenarioInvalid { scenario_id: String, reason: String },

    /// Catalog has no scenario with this id
    #[error("Scenario not found: {scenario_id}")]
    ScenarioNotFound { scenario_id: String },

    /// Phase still has scheduled turns, unsettled narration, or open objections
    #[error(
        "Phase {phase} is not exhausted: {remaining_turns} scheduled turn(s), \
         {outstanding_objections} outstanding objection(s), narration pending: {narration_pending}"
    )]
    PhaseNotExhausted {
        phase: TrialPhase,
        remaining_turns: u32,
        outstanding_objections: usize,
        narration_pending: bool,
    },

    /// Scenario was removed or revised since the session started
    #[error("Session {session_id} is stale: {reason}")]
    StaleSession { session_id: String, reason: String },

    /// Reasoning service failed twice for the same slot
    #[error("Generation failed for {role} in {phase} after {attempts} attempt(s): {reason}")]
    GenerationFailed {
        phase: TrialPhase,
        role: CourtRole,
        attempts: u32,
        reason: String,
    },

    /// Narration errored or timed out; the turn falls back to text
    #[error("Narration unavailable for turn {sequence}: {reason}")]
    NarrationUnavailable { sequence: u64, reason: String },

    /// Bounded objection queue is full; the newest objection is rejected
    #[error("Objection queue is full ({capacity} outstanding)")]
    ObjectionQueueOverflow { capacity: usize },

    /// Mutating call on a closed session
    #[error("Session {session_id} is closed")]
    SessionClosed { session_id: String },

    /// Interrupt raised by the wrong role or against the wrong turn
    #[error("Invalid interrupt: {reason}")]
    InvalidInterrupt { reason: String },

    /// Phase transition outside the fixed trial order
    #[error("Invalid transition {from} → {to}: {reason}")]
    InvalidTransition {
        from: TrialPhase,
        to: TrialPhase,
        reason: String,
    },

    /// Skip requested for a phase that has no failed turns
    #[error("Phase {phase} is not degraded and cannot be skipped")]
    PhaseNotDegraded { phase: TrialPhase },

    /// Narration status may only move forward
    #[error("Turn {sequence} narration cannot move from {from} to {to}")]
    InvalidNarrationTransition {
        sequence: u64,
        from: NarrationStatus,
        to: NarrationStatus,
    },

    /// No turn with this sequence number
    #[error("Turn {sequence} not found in transcript")]
    TurnNotFound { sequence: u64 },

    /// Transcript was sealed when the session closed
    #[error("Transcript is sealed; turn {sequence} rejected")]
    TranscriptSealed { sequence: u64 },

    /// Scheduler asked for a new turn while earlier work is unresolved
    #[error("Turn blocked: {reason}")]
    TurnBlocked { reason: String },

    /// User-supplied utterance was empty or too long
    #[error("Invalid utterance: {reason}")]
    InvalidUtterance { reason: String },
}

impl TrialError {
    /// Create a scenario invalid error
    pub fn scenario_invalid(scenario_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ScenarioInvalid {
            scenario_id: scenario_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a stale session error
    pub fn stale(session_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StaleSession {
            session_id: session_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a session closed error
    pub fn closed(session_id: impl Into<String>) -> Self {
        Self::SessionClosed {
            session_id: session_id.into(),
        }
    }

    /// Create an invalid interrupt error
    pub fn invalid_interrupt(reason: impl Into<String>) -> Self {
        Self::InvalidInterrupt {
            reason: reason.into(),
        }
    }

    /// Create a turn blocked error
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self::TurnBlocked {
            reason: reason.into(),
        }
    }

    /// Machine-readable code used on warning events and exported summaries
    pub fn code(&self) -> &'static str {
        match self {
            Self::ScenarioInvalid { .. } => "scenario_invalid",
            Self::ScenarioNotFound { .. } => "scenario_not_found",
            Self::PhaseNotExhausted { .. } => "phase_not_exhausted",
            Self::StaleSession { .. } => "stale_session",
            Self::GenerationFailed { .. } => "generation_failed",
            Self::NarrationUnavailable { .. } => "narration_unavailable",
            Self::ObjectionQueueOverflow { .. } => "objection_queue_overflow",
            Self::SessionClosed { .. } => "session_closed",
            Self::InvalidInterrupt { .. } => "invalid_interrupt",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::PhaseNotDegraded { .. } => "phase_not_degraded",
            Self::InvalidNarrationTransition { .. } => "invalid_narration_transition",
            Self::TurnNotFound { .. } => "turn_not_found",
            Self::TranscriptSealed { .. } => "transcript_sealed",
            Self::TurnBlocked { .. } => "turn_blocked",
            Self::InvalidUtterance { .. } => "invalid_utterance",
        }
    }

    /// Structural failures go straight back to the caller and are never retried
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::ScenarioInvalid { .. }
                | Self::ScenarioNotFound { .. }
                | Self::StaleSession { .. }
                | Self::SessionClosed { .. }
        )
    }

    /// Per-turn failures that degrade a turn but leave the session running
    pub fn is_turn_local(&self) -> bool {
        matches!(
            self,
            Self::GenerationFailed { .. } | Self::NarrationUnavailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_classification() {
        assert!(TrialError::scenario_invalid("s1", "no witnesses").is_structural());
        assert!(TrialError::closed("abc").is_structural());
        assert!(TrialError::stale("abc", "revision changed").is_structural());
        assert!(!TrialError::ObjectionQueueOverflow { capacity: 4 }.is_structural());
    }

    #[test]
    fn test_turn_local_classification() {
        let err = TrialError::GenerationFailed {
            phase: TrialPhase::Opening,
            role: CourtRole::Prosecutor,
            attempts: 2,
            reason: "empty utterance".into(),
        };
        assert!(err.is_turn_local());
        assert!(!err.is_structural());
        assert_eq!(err.code(), "generation_failed");
    }

    #[test]
    fn test_display_messages() {
        let err = TrialError::PhaseNotExhausted {
            phase: TrialPhase::Opening,
            remaining_turns: 2,
            outstanding_objections: 0,
            narration_pending: false,
        };
        let msg = err.to_string();
        assert!(msg.contains("opening"));
        assert!(msg.contains("2 scheduled turn(s)"));

        let err = TrialError::NarrationUnavailable {
            sequence: 3,
            reason: "timed out".into(),
        };
        assert_eq!(err.to_string(), "Narration unavailable for turn 3: timed out");
    }
}
