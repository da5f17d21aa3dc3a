//! Trial phases and their fixed order.

use serde::{Deserialize, Serialize};

/// Phase of a trial session.
///
/// `Paused` is not a phase; it is an orthogonal flag on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialPhase {
    /// Session created, nobody has spoken.
    Lobby,
    Opening,
    DirectExamination,
    CrossExamination,
    Closing,
    /// Rotation is over; the evaluation report is final.
    Evaluation,
    /// Terminal. Reached by completion or abort.
    Closed,
}

impl TrialPhase {
    /// All phases in trial order.
    pub const ALL: [TrialPhase; 7] = [
        Self::Lobby,
        Self::Opening,
        Self::DirectExamination,
        Self::CrossExamination,
        Self::Closing,
        Self::Evaluation,
        Self::Closed,
    ];

    /// Whether this is the terminal phase.
    pub fn is_terminal(self) -> bool {
        self == Self::Closed
    }

    /// Whether witnesses are examined in this phase.
    pub fn is_examination(self) -> bool {
        matches!(self, Self::DirectExamination | Self::CrossExamination)
    }

    /// Next phase in the fixed order.
    pub fn next(self) -> Option<TrialPhase> {
        match self {
            Self::Lobby => Some(Self::Opening),
            Self::Opening => Some(Self::DirectExamination),
            Self::DirectExamination => Some(Self::CrossExamination),
            Self::CrossExamination => Some(Self::Closing),
            Self::Closing => Some(Self::Evaluation),
            Self::Evaluation => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Valid transitions from this phase: the next phase, or abort to `Closed`.
    pub fn valid_transitions(self) -> &'static [TrialPhase] {
        match self {
            Self::Lobby => &[Self::Opening, Self::Closed],
            Self::Opening => &[Self::DirectExamination, Self::Closed],
            Self::DirectExamination => &[Self::CrossExamination, Self::Closed],
            Self::CrossExamination => &[Self::Closing, Self::Closed],
            Self::Closing => &[Self::Evaluation, Self::Closed],
            Self::Evaluation => &[Self::Closed],
            Self::Closed => &[],
        }
    }

    /// Human-facing name.
    pub fn title(self) -> &'static str {
        match self {
            Self::Lobby => "Lobby",
            Self::Opening => "Opening Statements",
            Self::DirectExamination => "Direct Examination",
            Self::CrossExamination => "Cross Examination",
            Self::Closing => "Closing Arguments",
            Self::Evaluation => "Evaluation",
            Self::Closed => "Closed",
        }
    }
}

impl std::fmt::Display for TrialPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "lobby"),
            Self::Opening => write!(f, "opening"),
            Self::DirectExamination => write!(f, "direct_examination"),
            Self::CrossExamination => write!(f, "cross_examination"),
            Self::Closing => write!(f, "closing"),
            Self::Evaluation => write!(f, "evaluation"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_order() {
        let mut phase = TrialPhase::Lobby;
        let mut visited = vec![phase];
        while let Some(next) = phase.next() {
            assert!(phase.valid_transitions().contains(&next));
            visited.push(next);
            phase = next;
        }
        assert_eq!(visited, TrialPhase::ALL.to_vec());
    }

    #[test]
    fn test_any_live_phase_can_close() {
        for phase in TrialPhase::ALL.iter().filter(|p| !p.is_terminal()) {
            assert!(phase.valid_transitions().contains(&TrialPhase::Closed));
        }
        assert!(TrialPhase::Closed.valid_transitions().is_empty());
    }

    #[test]
    fn test_no_backward_transitions() {
        assert!(!TrialPhase::CrossExamination
            .valid_transitions()
            .contains(&TrialPhase::Opening));
        assert!(!TrialPhase::Opening
            .valid_transitions()
            .contains(&TrialPhase::Lobby));
    }
}
