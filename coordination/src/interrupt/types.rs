//! Interrupt records: objections, coaching cues and rulings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roles::CourtRole;
use crate::transcript::CueKind;

/// Kind of interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptKind {
    /// Blocking. Resolved by a judge ruling.
    Objection,
    /// Non-blocking feedback from the coach.
    CoachingCue,
    /// Non-blocking notice from the judge.
    Ruling,
}

impl InterruptKind {
    pub fn is_blocking(self) -> bool {
        self == Self::Objection
    }

    /// Display priority of the cue this kind attaches to a turn.
    pub fn display_priority(self) -> u8 {
        match self {
            Self::CoachingCue => 0,
            Self::Objection => 1,
            Self::Ruling => 2,
        }
    }

    pub fn cue_kind(self) -> CueKind {
        match self {
            Self::Objection => CueKind::ObjectionFlag,
            Self::CoachingCue => CueKind::CoachingTip,
            Self::Ruling => CueKind::Ruling,
        }
    }
}

impl std::fmt::Display for InterruptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Objection => write!(f, "objection"),
            Self::CoachingCue => write!(f, "coaching_cue"),
            Self::Ruling => write!(f, "ruling"),
        }
    }
}

/// What prompted a judge-initiated ruling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulingKind {
    TimingReminder,
    DecorumNotice,
    General,
}

/// Resolution state of an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Waiting behind the pending objection.
    Queued,
    /// Being arbitrated. At most one per session.
    Pending,
    Granted,
    Denied,
    /// Dropped without a ruling (session closed or phase skipped).
    Dismissed,
}

impl Resolution {
    pub fn is_outstanding(self) -> bool {
        matches!(self, Self::Queued | Self::Pending)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Pending => write!(f, "pending"),
            Self::Granted => write!(f, "granted"),
            Self::Denied => write!(f, "denied"),
            Self::Dismissed => write!(f, "dismissed"),
        }
    }
}

/// Judge's decision on an objection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Sustained,
    Overruled,
}

impl Verdict {
    pub fn resolution(self) -> Resolution {
        match self {
            Self::Sustained => Resolution::Granted,
            Self::Overruled => Resolution::Denied,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sustained => write!(f, "sustained"),
            Self::Overruled => write!(f, "overruled"),
        }
    }
}

/// Interrupt content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterruptPayload {
    pub text: String,
    /// Legal grounds, for objections ("hearsay", "leading").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounds: Option<String>,
    /// Portion of the target turn being objected to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruling_kind: Option<RulingKind>,
}

/// A request to preempt normal turn order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interrupt {
    pub id: String,
    pub kind: InterruptKind,
    pub raised_by: CourtRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sequence: Option<u64>,
    pub payload: InterruptPayload,
    pub resolution: Resolution,
    /// Judge's ruling text, for objections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruling_text: Option<String>,
    pub raised_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Interrupt {
    fn new(
        kind: InterruptKind,
        raised_by: CourtRole,
        target_sequence: Option<u64>,
        payload: InterruptPayload,
    ) -> Self {
        Self {
            id: format!("int-{}", uuid::Uuid::new_v4()),
            kind,
            raised_by,
            target_sequence,
            payload,
            resolution: Resolution::Queued,
            ruling_text: None,
            raised_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// New objection against a turn, initially queued.
    pub fn objection(
        raised_by: CourtRole,
        target_sequence: u64,
        grounds: impl Into<String>,
        excerpt: Option<String>,
    ) -> Self {
        let grounds = grounds.into();
        let payload = InterruptPayload {
            text: format!("Objection, {}.", grounds),
            grounds: Some(grounds),
            excerpt,
            ruling_kind: None,
        };
        Self::new(
            InterruptKind::Objection,
            raised_by,
            Some(target_sequence),
            payload,
        )
    }

    /// New coaching cue.
    pub fn coaching_cue(target_sequence: Option<u64>, text: impl Into<String>) -> Self {
        let payload = InterruptPayload {
            text: text.into(),
            ..Default::default()
        };
        Self::new(
            InterruptKind::CoachingCue,
            CourtRole::Coach,
            target_sequence,
            payload,
        )
    }

    /// New judge-initiated ruling.
    pub fn ruling(kind: RulingKind, target_sequence: Option<u64>, text: impl Into<String>) -> Self {
        let payload = InterruptPayload {
            text: text.into(),
            ruling_kind: Some(kind),
            ..Default::default()
        };
        Self::new(InterruptKind::Ruling, CourtRole::Judge, target_sequence, payload)
    }

    /// Set a final resolution and stamp the time.
    pub fn resolve(&mut self, resolution: Resolution) {
        self.resolution = resolution;
        self.resolved_at = Some(Utc::now());
    }

    pub fn is_outstanding(&self) -> bool {
        self.resolution.is_outstanding()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objection_payload() {
        let obj = Interrupt::objection(CourtRole::Defense, 5, "hearsay", None);
        assert_eq!(obj.kind, InterruptKind::Objection);
        assert_eq!(obj.payload.text, "Objection, hearsay.");
        assert_eq!(obj.target_sequence, Some(5));
        assert!(obj.is_outstanding());
        assert!(obj.kind.is_blocking());
    }

    #[test]
    fn test_priorities() {
        assert!(InterruptKind::Ruling.display_priority() > InterruptKind::CoachingCue.display_priority());
        assert!(!InterruptKind::Ruling.is_blocking());
        assert!(!InterruptKind::CoachingCue.is_blocking());
    }

    #[test]
    fn test_resolve_stamps_time() {
        let mut cue = Interrupt::coaching_cue(Some(1), "Slow down.");
        cue.resolve(Resolution::Granted);
        assert!(!cue.is_outstanding());
        assert!(cue.resolved_at.is_some());
        assert_eq!(Verdict::Sustained.resolution(), Resolution::Granted);
        assert_eq!(Verdict::Overruled.resolution(), Resolution::Denied);
    }
}
