//! Turn record and its narration status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TrialError, TrialResult};
use crate::roles::CourtRole;
use crate::session::TrialPhase;

/// Narration progress of a turn.
///
/// Moves only forward: `Pending → Playing → Complete`, or to `Skipped`
/// from either of the first two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrationStatus {
    Pending,
    Playing,
    Complete,
    /// Audio was not played; the turn is shown as text.
    Skipped,
}

impl NarrationStatus {
    /// Whether the scheduler may move past this turn.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Complete | Self::Skipped)
    }

    /// Whether `self → next` is a legal forward move.
    pub fn can_move_to(self, next: NarrationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Playing)
                | (Self::Pending, Self::Skipped)
                | (Self::Playing, Self::Complete)
                | (Self::Playing, Self::Skipped)
        )
    }
}

impl std::fmt::Display for NarrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Playing => write!(f, "playing"),
            Self::Complete => write!(f, "complete"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Kind of annotation attached to a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    CoachingTip,
    ObjectionFlag,
    Ruling,
}

/// Metadata attached to a turn by the interrupt arbiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueAnnotation {
    pub interrupt_id: String,
    pub kind: CueKind,
    /// Higher sorts first when displayed.
    pub priority: u8,
    pub text: String,
    pub attached_at: DateTime<Utc>,
}

/// One utterance in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Strictly increasing, never reused.
    pub sequence: u64,
    pub phase: TrialPhase,
    pub speaker_role: CourtRole,
    pub speaker_id: String,
    pub speaker_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addressee: Option<CourtRole>,
    /// Witness under examination when this turn was scheduled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_id: Option<String>,
    pub content: String,
    pub narration: NarrationStatus,
    /// Audio was unavailable; show text instead.
    pub text_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_ms: Option<u64>,
    /// Regenerated content of a settled turn awaiting a fresh narration.
    #[serde(default)]
    pub renarrate: bool,
    pub cues: Vec<CueAnnotation>,
    /// Bumped on every content replacement.
    pub revision: u32,
    /// Objected material was removed and could not be replaced.
    pub stricken: bool,
    /// Content typed by the user rather than generated.
    pub user_authored: bool,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a new turn in `Pending` narration status.
    pub fn new(
        sequence: u64,
        phase: TrialPhase,
        speaker_role: CourtRole,
        speaker_id: impl Into<String>,
        speaker_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sequence,
            phase,
            speaker_role,
            speaker_id: speaker_id.into(),
            speaker_name: speaker_name.into(),
            addressee: None,
            witness_id: None,
            content: content.into(),
            narration: NarrationStatus::Pending,
            text_fallback: false,
            narration_ms: None,
            renarrate: false,
            cues: Vec::new(),
            revision: 0,
            stricken: false,
            user_authored: false,
            created_at: Utc::now(),
        }
    }

    pub fn addressing(mut self, addressee: Option<CourtRole>) -> Self {
        self.addressee = addressee;
        self
    }

    pub fn examining(mut self, witness_id: Option<String>) -> Self {
        self.witness_id = witness_id;
        self
    }

    /// Move narration forward. Backward or sideways moves are rejected.
    pub fn advance_narration(&mut self, to: NarrationStatus) -> TrialResult<()> {
        if !self.narration.can_move_to(to) {
            return Err(TrialError::InvalidNarrationTransition {
                sequence: self.sequence,
                from: self.narration,
                to,
            });
        }
        self.narration = to;
        Ok(())
    }

    /// Whether the voice coordinator still owes this turn a narration.
    pub fn needs_narration(&self) -> bool {
        self.narration == NarrationStatus::Pending || self.renarrate
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }

    /// "Name: text" line used for reasoning history.
    pub fn history_line(&self) -> String {
        format!("{}: {}", self.speaker_name, self.content)
    }

    /// Attach an annotation, keeping higher priorities first.
    pub fn attach_cue(&mut self, cue: CueAnnotation) {
        let pos = self
            .cues
            .iter()
            .position(|c| c.priority < cue.priority)
            .unwrap_or(self.cues.len());
        self.cues.insert(pos, cue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn() -> Turn {
        Turn::new(
            1,
            TrialPhase::Opening,
            CourtRole::Prosecutor,
            "prosecutor",
            "Prosecutor Lane",
            "Ladies and gentlemen of the jury.",
        )
    }

    #[test]
    fn test_forward_moves() {
        let mut t = turn();
        t.advance_narration(NarrationStatus::Playing).unwrap();
        t.advance_narration(NarrationStatus::Complete).unwrap();
        assert!(t.narration.is_settled());
    }

    #[test]
    fn test_pending_to_skipped() {
        let mut t = turn();
        t.advance_narration(NarrationStatus::Skipped).unwrap();
        assert!(t.narration.is_settled());
    }

    #[test]
    fn test_backward_moves_rejected() {
        let mut t = turn();
        t.advance_narration(NarrationStatus::Playing).unwrap();
        t.advance_narration(NarrationStatus::Complete).unwrap();
        for to in [
            NarrationStatus::Pending,
            NarrationStatus::Playing,
            NarrationStatus::Skipped,
        ] {
            let err = t.advance_narration(to).unwrap_err();
            assert!(matches!(
                err,
                TrialError::InvalidNarrationTransition { sequence: 1, .. }
            ));
        }
        assert_eq!(t.narration, NarrationStatus::Complete);
    }

    #[test]
    fn test_pending_cannot_jump_to_complete() {
        let mut t = turn();
        assert!(t.advance_narration(NarrationStatus::Complete).is_err());
    }

    #[test]
    fn test_cues_ordered_by_priority() {
        let mut t = turn();
        let cue = |id: &str, priority| CueAnnotation {
            interrupt_id: id.into(),
            kind: CueKind::CoachingTip,
            priority,
            text: String::new(),
            attached_at: Utc::now(),
        };
        t.attach_cue(cue("tip-1", 0));
        t.attach_cue(cue("ruling", 2));
        t.attach_cue(cue("tip-2", 0));
        let ids: Vec<_> = t.cues.iter().map(|c| c.interrupt_id.as_str()).collect();
        assert_eq!(ids, vec!["ruling", "tip-1", "tip-2"]);
    }

    #[test]
    fn test_history_line() {
        assert_eq!(
            turn().history_line(),
            "Prosecutor Lane: Ladies and gentlemen of the jury."
        );
        assert_eq!(turn().word_count(), 6);
    }
}
