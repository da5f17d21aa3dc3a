//! Trial event types
//!
//! Every state change a session makes is published as one of these.
//! Presentation layers consume them; nothing in the engine reads them back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interrupt::{InterruptKind, Resolution};
use crate::roles::CourtRole;
use crate::session::TrialPhase;
use crate::transcript::NarrationStatus;

/// All session events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrialEvent {
    /// The session moved to a new phase
    PhaseChanged {
        session_id: String,
        from: TrialPhase,
        to: TrialPhase,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A turn was appended to the transcript
    TurnAppended {
        session_id: String,
        sequence: u64,
        phase: TrialPhase,
        speaker_role: CourtRole,
        speaker_id: String,
        content: String,
        user_authored: bool,
        timestamp: DateTime<Utc>,
    },

    /// A turn's content was replaced after a sustained objection
    TurnRegenerated {
        session_id: String,
        sequence: u64,
        revision: u32,
        content: String,
        stricken: bool,
        timestamp: DateTime<Utc>,
    },

    /// Narration of a turn settled
    TurnNarrated {
        session_id: String,
        sequence: u64,
        status: NarrationStatus,
        text_fallback: bool,
        duration_ms: Option<u64>,
        timestamp: DateTime<Utc>,
    },

    /// An interrupt was admitted
    InterruptRaised {
        session_id: String,
        interrupt_id: String,
        kind: InterruptKind,
        raised_by: CourtRole,
        target_sequence: Option<u64>,
        resolution: Resolution,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// An objection was ruled on or dismissed
    InterruptResolved {
        session_id: String,
        interrupt_id: String,
        kind: InterruptKind,
        resolution: Resolution,
        ruling: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A metric aggregate changed
    EvaluationUpdated {
        session_id: String,
        metric: String,
        value: f64,
        mean: f64,
        count: u64,
        sequence: Option<u64>,
        timestamp: DateTime<Utc>,
    },

    /// A non-fatal problem the session recovered from
    Warning {
        session_id: String,
        code: String,
        message: String,
        sequence: Option<u64>,
        timestamp: DateTime<Utc>,
    },

    SessionPaused {
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    SessionResumed {
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The session reached `Closed`. Published exactly once.
    SessionClosed {
        session_id: String,
        reason: CloseReason,
        turns: usize,
        timestamp: DateTime<Utc>,
    },
}

impl TrialEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TrialEvent::PhaseChanged { timestamp, .. } => *timestamp,
            TrialEvent::TurnAppended { timestamp, .. } => *timestamp,
            TrialEvent::TurnRegenerated { timestamp, .. } => *timestamp,
            TrialEvent::TurnNarrated { timestamp, .. } => *timestamp,
            TrialEvent::InterruptRaised { timestamp, .. } => *timestamp,
            TrialEvent::InterruptResolved { timestamp, .. } => *timestamp,
            TrialEvent::EvaluationUpdated { timestamp, .. } => *timestamp,
            TrialEvent::Warning { timestamp, .. } => *timestamp,
            TrialEvent::SessionPaused { timestamp, .. } => *timestamp,
            TrialEvent::SessionResumed { timestamp, .. } => *timestamp,
            TrialEvent::SessionClosed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            TrialEvent::PhaseChanged { .. } => "phase_changed",
            TrialEvent::TurnAppended { .. } => "turn_appended",
            TrialEvent::TurnRegenerated { .. } => "turn_regenerated",
            TrialEvent::TurnNarrated { .. } => "turn_narrated",
            TrialEvent::InterruptRaised { .. } => "interrupt_raised",
            TrialEvent::InterruptResolved { .. } => "interrupt_resolved",
            TrialEvent::EvaluationUpdated { .. } => "evaluation_updated",
            TrialEvent::Warning { .. } => "warning",
            TrialEvent::SessionPaused { .. } => "session_paused",
            TrialEvent::SessionResumed { .. } => "session_resumed",
            TrialEvent::SessionClosed { .. } => "session_closed",
        }
    }

    /// Session this event belongs to
    pub fn session_id(&self) -> &str {
        match self {
            TrialEvent::PhaseChanged { session_id, .. }
            | TrialEvent::TurnAppended { session_id, .. }
            | TrialEvent::TurnRegenerated { session_id, .. }
            | TrialEvent::TurnNarrated { session_id, .. }
            | TrialEvent::InterruptRaised { session_id, .. }
            | TrialEvent::InterruptResolved { session_id, .. }
            | TrialEvent::EvaluationUpdated { session_id, .. }
            | TrialEvent::Warning { session_id, .. }
            | TrialEvent::SessionPaused { session_id, .. }
            | TrialEvent::SessionResumed { session_id, .. }
            | TrialEvent::SessionClosed { session_id, .. } => session_id,
        }
    }

    /// Transcript sequence this event concerns, if any
    pub fn sequence(&self) -> Option<u64> {
        match self {
            TrialEvent::TurnAppended { sequence, .. }
            | TrialEvent::TurnRegenerated { sequence, .. }
            | TrialEvent::TurnNarrated { sequence, .. } => Some(*sequence),
            TrialEvent::InterruptRaised {
                target_sequence, ..
            } => *target_sequence,
            TrialEvent::EvaluationUpdated { sequence, .. }
            | TrialEvent::Warning { sequence, .. } => *sequence,
            _ => None,
        }
    }
}

/// Why a session closed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The trial ran through evaluation
    Completed,
    /// The user or a host stopped the session
    Aborted(String),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::Completed => write!(f, "completed"),
            CloseReason::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}

/// An event with its position in the session's event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedEvent {
    /// Monotonic per-bus event id, starting at 1
    pub id: u64,
    #[serde(flatten)]
    pub event: TrialEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = TrialEvent::TurnAppended {
            session_id: "session-1".to_string(),
            sequence: 3,
            phase: TrialPhase::Opening,
            speaker_role: CourtRole::Defense,
            speaker_id: "defense".to_string(),
            content: "Members of the jury...".to_string(),
            user_authored: false,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"turn_appended\""));
        let parsed: TrialEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_type(), "turn_appended");
        assert_eq!(parsed.sequence(), Some(3));
    }

    #[test]
    fn test_event_accessors() {
        let event = TrialEvent::SessionClosed {
            session_id: "session-1".to_string(),
            reason: CloseReason::Aborted("user quit".to_string()),
            turns: 7,
            timestamp: Utc::now(),
        };

        assert_eq!(event.session_id(), "session-1");
        assert_eq!(event.sequence(), None);
        assert_eq!(event.event_type(), "session_closed");
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::Completed.to_string(), "completed");
        assert_eq!(
            CloseReason::Aborted("user quit".into()).to_string(),
            "aborted: user quit"
        );
    }

    #[test]
    fn test_sequenced_event_flattens() {
        let sequenced = SequencedEvent {
            id: 9,
            event: TrialEvent::SessionPaused {
                session_id: "s".to_string(),
                timestamp: Utc::now(),
            },
        };
        let value = serde_json::to_value(&sequenced).unwrap();
        assert_eq!(value["id"], 9);
        assert_eq!(value["type"], "session_paused");
    }
}
