//! Append-only transcript of turns plus the interrupts raised against them.

use serde::{Deserialize, Serialize};

use crate::error::{TrialError, TrialResult};
use crate::interrupt::Interrupt;

use super::turn::{NarrationStatus, Turn};

/// Text that replaces struck material under the redact remedy.
pub const STRICKEN_MARKER: &str = "[stricken]";

/// Ordered record of a session's turns and interrupts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptLog {
    turns: Vec<Turn>,
    interrupts: Vec<Interrupt>,
    sealed: bool,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn. Its sequence must exceed every earlier one.
    pub fn append(&mut self, turn: Turn) -> TrialResult<()> {
        if self.sealed {
            return Err(TrialError::TranscriptSealed {
                sequence: turn.sequence,
            });
        }
        if let Some(last) = self.turns.last() {
            if turn.sequence <= last.sequence {
                return Err(TrialError::blocked(format!(
                    "sequence {} does not follow {}",
                    turn.sequence, last.sequence
                )));
            }
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Replace a turn's content after a sustained objection.
    ///
    /// Keeps the sequence number and cue history. A turn that was already
    /// narrated is flagged for a fresh narration; its status stays put.
    pub fn replace_content(&mut self, sequence: u64, content: impl Into<String>) -> TrialResult<&Turn> {
        let turn = self.turn_mut(sequence)?;
        turn.content = content.into();
        turn.revision += 1;
        if turn.narration.is_settled() {
            turn.renarrate = true;
        }
        Ok(&*turn)
    }

    /// Strike the excerpt from a turn, or the whole content when the excerpt
    /// is absent or not found.
    pub fn redact(&mut self, sequence: u64, excerpt: Option<&str>) -> TrialResult<&Turn> {
        let turn = self.turn_mut(sequence)?;
        let redacted = match excerpt.filter(|e| !e.trim().is_empty()) {
            Some(e) if turn.content.contains(e) => turn.content.replace(e, STRICKEN_MARKER),
            _ => STRICKEN_MARKER.to_string(),
        };
        turn.content = redacted;
        turn.revision += 1;
        turn.stricken = true;
        Ok(&*turn)
    }

    /// Seal the transcript. Later appends are rejected.
    ///
    /// Turns still awaiting narration are settled as skipped text.
    pub fn seal(&mut self) {
        for turn in &mut self.turns {
            if !turn.narration.is_settled() {
                turn.narration = NarrationStatus::Skipped;
                turn.text_fallback = true;
            }
            turn.renarrate = false;
        }
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn latest(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn get(&self, sequence: u64) -> Option<&Turn> {
        self.turns
            .binary_search_by_key(&sequence, |t| t.sequence)
            .ok()
            .map(|idx| &self.turns[idx])
    }

    pub fn turn_mut(&mut self, sequence: u64) -> TrialResult<&mut Turn> {
        match self.turns.binary_search_by_key(&sequence, |t| t.sequence) {
            Ok(idx) => Ok(&mut self.turns[idx]),
            Err(_) => Err(TrialError::TurnNotFound { sequence }),
        }
    }

    /// First turn that still needs narration, oldest first.
    pub fn awaiting_narration(&self) -> Option<&Turn> {
        self.turns.iter().find(|t| t.needs_narration())
    }

    /// Record a newly raised interrupt.
    pub fn record_interrupt(&mut self, interrupt: Interrupt) {
        self.interrupts.push(interrupt);
    }

    pub fn interrupts(&self) -> &[Interrupt] {
        &self.interrupts
    }

    pub fn interrupt(&self, id: &str) -> Option<&Interrupt> {
        self.interrupts.iter().find(|i| i.id == id)
    }

    pub fn interrupt_mut(&mut self, id: &str) -> Option<&mut Interrupt> {
        self.interrupts.iter_mut().find(|i| i.id == id)
    }

    /// Interrupts attached to one turn, in raise order.
    pub fn interrupts_for(&self, sequence: u64) -> impl Iterator<Item = &Interrupt> {
        self.interrupts
            .iter()
            .filter(move |i| i.target_sequence == Some(sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::CourtRole;
    use crate::session::TrialPhase;

    fn turn(sequence: u64, content: &str) -> Turn {
        Turn::new(
            sequence,
            TrialPhase::Opening,
            CourtRole::Prosecutor,
            "prosecutor",
            "Prosecutor",
            content,
        )
    }

    #[test]
    fn test_append_requires_increasing_sequence() {
        let mut log = TranscriptLog::new();
        log.append(turn(1, "a")).unwrap();
        log.append(turn(2, "b")).unwrap();
        assert!(log.append(turn(2, "dup")).is_err());
        assert!(log.append(turn(1, "old")).is_err());
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_replace_keeps_sequence_and_cues() {
        let mut log = TranscriptLog::new();
        log.append(turn(1, "improper question")).unwrap();
        log.record_interrupt(Interrupt::objection(CourtRole::Defense, 1, "leading", None));

        let updated = log.replace_content(1, "proper question").unwrap();
        assert_eq!(updated.sequence, 1);
        assert_eq!(updated.revision, 1);
        assert!(!updated.renarrate);
        assert_eq!(log.interrupts_for(1).count(), 1);
    }

    #[test]
    fn test_replace_after_narration_flags_renarrate() {
        let mut log = TranscriptLog::new();
        log.append(turn(1, "text")).unwrap();
        let t = log.turn_mut(1).unwrap();
        t.advance_narration(NarrationStatus::Playing).unwrap();
        t.advance_narration(NarrationStatus::Complete).unwrap();

        let updated = log.replace_content(1, "new text").unwrap();
        assert_eq!(updated.narration, NarrationStatus::Complete);
        assert!(updated.renarrate);
        assert!(log.awaiting_narration().is_some());
    }

    #[test]
    fn test_redact_excerpt() {
        let mut log = TranscriptLog::new();
        log.append(turn(1, "He told me the defendant did it, I saw him.")).unwrap();
        let t = log
            .redact(1, Some("He told me the defendant did it, "))
            .unwrap();
        assert_eq!(t.content, "[stricken]I saw him.");
        assert!(t.stricken);

        log.append(turn(2, "Something else")).unwrap();
        let t = log.redact(2, Some("not present")).unwrap();
        assert_eq!(t.content, STRICKEN_MARKER);
    }

    #[test]
    fn test_seal_rejects_appends_and_settles_narration() {
        let mut log = TranscriptLog::new();
        log.append(turn(1, "a")).unwrap();
        log.seal();
        assert!(matches!(
            log.append(turn(2, "b")),
            Err(TrialError::TranscriptSealed { sequence: 2 })
        ));
        let t = log.get(1).unwrap();
        assert_eq!(t.narration, NarrationStatus::Skipped);
        assert!(t.text_fallback);
    }

    #[test]
    fn test_missing_turn() {
        let mut log = TranscriptLog::new();
        assert!(matches!(
            log.replace_content(9, "x"),
            Err(TrialError::TurnNotFound { sequence: 9 })
        ));
        assert!(log.get(9).is_none());
    }
}
