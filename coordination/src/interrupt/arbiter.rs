//! Interrupt arbiter: admits interrupts and keeps the objection queue.
//!
//! Objections are blocking and live in a bounded FIFO. Only the head is
//! `Pending`; the rest wait as `Queued` and are ruled on strictly in raise
//! order. Coaching cues and rulings never block and are granted on arrival.

use tracing::{debug, info};

use crate::error::{TrialError, TrialResult};
use crate::roles::CourtRole;
use crate::session::Session;
use crate::transcript::CueAnnotation;

use super::types::{Interrupt, Resolution, RulingKind, Verdict};

/// Arbiter for a single session's interrupts.
#[derive(Debug, Clone)]
pub struct InterruptArbiter {
    capacity: usize,
}

impl InterruptArbiter {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Admit an objection against the most recent turn.
    ///
    /// Only counsel may object, and never to their own side's turn.
    pub fn raise_objection(
        &self,
        session: &mut Session,
        raised_by: CourtRole,
        grounds: &str,
        excerpt: Option<String>,
    ) -> TrialResult<Interrupt> {
        if !raised_by.is_counsel() {
            return Err(TrialError::invalid_interrupt(format!(
                "{} cannot raise objections",
                raised_by
            )));
        }
        if grounds.trim().is_empty() {
            return Err(TrialError::invalid_interrupt("objection needs grounds"));
        }
        let target = session
            .transcript
            .latest()
            .ok_or_else(|| TrialError::invalid_interrupt("no turn to object to"))?;

        let target_role = target.speaker_role;
        let objectionable =
            target_role == CourtRole::Witness || raised_by.opposing_counsel() == Some(target_role);
        if !objectionable {
            return Err(TrialError::invalid_interrupt(format!(
                "{} cannot object to a {} turn",
                raised_by, target_role
            )));
        }

        let target_sequence = target.sequence;
        let duplicate = session
            .transcript
            .interrupts_for(target_sequence)
            .any(|i| i.raised_by == raised_by && i.is_outstanding());
        if duplicate {
            return Err(TrialError::invalid_interrupt(format!(
                "{} already has an objection outstanding on turn {}",
                raised_by, target_sequence
            )));
        }

        if session.objection_queue.len() >= self.capacity {
            return Err(TrialError::ObjectionQueueOverflow {
                capacity: self.capacity,
            });
        }

        let mut objection =
            Interrupt::objection(raised_by, target_sequence, grounds.trim(), excerpt);
        objection.resolution = if session.objection_queue.is_empty() {
            Resolution::Pending
        } else {
            Resolution::Queued
        };

        self.attach(session, &objection)?;
        session.objection_queue.push_back(objection.id.clone());
        session.transcript.record_interrupt(objection.clone());
        session.hold_speaker();

        info!(
            session_id = %session.id,
            interrupt_id = %objection.id,
            target = target_sequence,
            queued = session.objection_queue.len(),
            "Objection raised"
        );
        Ok(objection)
    }

    /// Admit a coaching cue. Always granted immediately.
    pub fn coaching_cue(&self, session: &mut Session, text: &str) -> TrialResult<Interrupt> {
        if text.trim().is_empty() {
            return Err(TrialError::invalid_interrupt("coaching cue is empty"));
        }
        let target = session.transcript.latest().map(|t| t.sequence);
        let mut cue = Interrupt::coaching_cue(target, text.trim());
        cue.resolve(Resolution::Granted);
        self.attach(session, &cue)?;
        session.transcript.record_interrupt(cue.clone());
        debug!(session_id = %session.id, interrupt_id = %cue.id, "Coaching cue granted");
        Ok(cue)
    }

    /// Admit a judge-initiated ruling. Non-blocking, higher display priority.
    pub fn issue_ruling(
        &self,
        session: &mut Session,
        kind: RulingKind,
        text: &str,
    ) -> TrialResult<Interrupt> {
        if text.trim().is_empty() {
            return Err(TrialError::invalid_interrupt("ruling is empty"));
        }
        let target = session.transcript.latest().map(|t| t.sequence);
        let mut ruling = Interrupt::ruling(kind, target, text.trim());
        ruling.resolve(Resolution::Granted);
        self.attach(session, &ruling)?;
        session.transcript.record_interrupt(ruling.clone());
        debug!(session_id = %session.id, interrupt_id = %ruling.id, ?kind, "Ruling issued");
        Ok(ruling)
    }

    /// The objection currently being arbitrated.
    pub fn pending<'a>(&self, session: &'a Session) -> Option<&'a Interrupt> {
        session
            .objection_queue
            .front()
            .and_then(|id| session.transcript.interrupt(id))
    }

    /// Rule on the head objection and promote the next one.
    pub fn resolve_pending(
        &self,
        session: &mut Session,
        verdict: Verdict,
        ruling_text: &str,
    ) -> TrialResult<Interrupt> {
        let id = session
            .objection_queue
            .pop_front()
            .ok_or_else(|| TrialError::invalid_interrupt("no objection is pending"))?;
        let resolved = {
            let objection = session
                .transcript
                .interrupt_mut(&id)
                .ok_or_else(|| TrialError::invalid_interrupt(format!("unknown interrupt {id}")))?;
            objection.ruling_text = Some(ruling_text.to_string());
            objection.resolve(verdict.resolution());
            objection.clone()
        };
        self.promote_head(session);
        info!(
            session_id = %session.id,
            interrupt_id = %id,
            %verdict,
            remaining = session.objection_queue.len(),
            "Objection ruled"
        );
        Ok(resolved)
    }

    /// Dismiss every outstanding objection, in raise order.
    pub fn dismiss_outstanding(&self, session: &mut Session) -> Vec<Interrupt> {
        let mut dismissed = Vec::new();
        while let Some(id) = session.objection_queue.pop_front() {
            if let Some(objection) = session.transcript.interrupt_mut(&id) {
                objection.resolve(Resolution::Dismissed);
                dismissed.push(objection.clone());
            }
        }
        dismissed
    }

    fn promote_head(&self, session: &mut Session) {
        if let Some(next) = session.objection_queue.front().cloned() {
            if let Some(objection) = session.transcript.interrupt_mut(&next) {
                objection.resolution = Resolution::Pending;
            }
        }
    }

    fn attach(&self, session: &mut Session, interrupt: &Interrupt) -> TrialResult<()> {
        let Some(sequence) = interrupt.target_sequence else {
            return Ok(());
        };
        let turn = session.transcript.turn_mut(sequence)?;
        turn.attach_cue(CueAnnotation {
            interrupt_id: interrupt.id.clone(),
            kind: interrupt.kind.cue_kind(),
            priority: interrupt.kind.display_priority(),
            text: interrupt.payload.text.clone(),
            attached_at: interrupt.raised_at,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TrialPhase;
    use crate::transcript::Turn;

    fn session_with(roles: &[CourtRole]) -> Session {
        let mut session = Session::for_tests();
        for role in roles {
            let seq = session.allocate_sequence();
            session
                .transcript
                .append(Turn::new(
                    seq,
                    TrialPhase::DirectExamination,
                    *role,
                    role.to_string(),
                    role.title(),
                    "text",
                ))
                .unwrap();
        }
        session
    }

    #[test]
    fn test_defense_objects_to_prosecutor() {
        let arbiter = InterruptArbiter::new(4);
        let mut session = session_with(&[CourtRole::Prosecutor]);
        let obj = arbiter
            .raise_objection(&mut session, CourtRole::Defense, "leading", None)
            .unwrap();
        assert_eq!(obj.resolution, Resolution::Pending);
        assert_eq!(arbiter.pending(&session).unwrap().id, obj.id);
        assert_eq!(session.transcript.get(1).unwrap().cues.len(), 1);
    }

    #[test]
    fn test_objection_to_witness_allowed() {
        let arbiter = InterruptArbiter::new(4);
        let mut session = session_with(&[CourtRole::Witness]);
        assert!(arbiter
            .raise_objection(&mut session, CourtRole::Prosecutor, "hearsay", None)
            .is_ok());
    }

    #[test]
    fn test_cannot_object_to_own_side() {
        let arbiter = InterruptArbiter::new(4);
        let mut session = session_with(&[CourtRole::Defense]);
        let err = arbiter
            .raise_objection(&mut session, CourtRole::Defense, "leading", None)
            .unwrap_err();
        assert!(matches!(err, TrialError::InvalidInterrupt { .. }));
    }

    #[test]
    fn test_only_counsel_may_object() {
        let arbiter = InterruptArbiter::new(4);
        let mut session = session_with(&[CourtRole::Prosecutor]);
        for role in [CourtRole::Judge, CourtRole::Coach, CourtRole::Witness] {
            assert!(arbiter
                .raise_objection(&mut session, role, "relevance", None)
                .is_err());
        }
        let mut empty = session_with(&[]);
        assert!(arbiter
            .raise_objection(&mut empty, CourtRole::Defense, "relevance", None)
            .is_err());
    }

    #[test]
    fn test_fifo_queue_and_promotion() {
        let arbiter = InterruptArbiter::new(4);
        let mut session = session_with(&[CourtRole::Witness]);
        let first = arbiter
            .raise_objection(&mut session, CourtRole::Defense, "hearsay", None)
            .unwrap();
        let second = arbiter
            .raise_objection(&mut session, CourtRole::Prosecutor, "narrative", None)
            .unwrap();
        assert_eq!(second.resolution, Resolution::Queued);

        let ruled = arbiter
            .resolve_pending(&mut session, Verdict::Overruled, "Overruled.")
            .unwrap();
        assert_eq!(ruled.id, first.id);
        assert_eq!(ruled.resolution, Resolution::Denied);

        let head = arbiter.pending(&session).unwrap();
        assert_eq!(head.id, second.id);
        assert_eq!(head.resolution, Resolution::Pending);

        let pending_count = session
            .transcript
            .interrupts()
            .iter()
            .filter(|i| i.resolution == Resolution::Pending)
            .count();
        assert_eq!(pending_count, 1);
    }

    #[test]
    fn test_overflow_rejects_newest() {
        let arbiter = InterruptArbiter::new(1);
        let mut session = session_with(&[CourtRole::Witness]);
        arbiter
            .raise_objection(&mut session, CourtRole::Defense, "hearsay", None)
            .unwrap();
        let err = arbiter
            .raise_objection(&mut session, CourtRole::Prosecutor, "speculation", None)
            .unwrap_err();
        assert!(matches!(err, TrialError::ObjectionQueueOverflow { capacity: 1 }));
        assert_eq!(session.objection_queue.len(), 1);
    }

    #[test]
    fn test_cues_and_rulings_never_block() {
        let arbiter = InterruptArbiter::new(4);
        let mut session = session_with(&[CourtRole::Defense]);
        let cue = arbiter.coaching_cue(&mut session, "Slow down.").unwrap();
        let ruling = arbiter
            .issue_ruling(&mut session, RulingKind::DecorumNotice, "Counsel, lower your voice.")
            .unwrap();
        assert_eq!(cue.resolution, Resolution::Granted);
        assert_eq!(ruling.resolution, Resolution::Granted);
        assert!(session.objection_queue.is_empty());

        let turn = session.transcript.get(1).unwrap();
        assert_eq!(turn.cues[0].interrupt_id, ruling.id);
        assert_eq!(turn.cues[1].interrupt_id, cue.id);
    }

    #[test]
    fn test_dismiss_outstanding() {
        let arbiter = InterruptArbiter::new(4);
        let mut session = session_with(&[CourtRole::Witness]);
        arbiter
            .raise_objection(&mut session, CourtRole::Defense, "hearsay", None)
            .unwrap();
        arbiter
            .raise_objection(&mut session, CourtRole::Prosecutor, "narrative", None)
            .unwrap();
        let dismissed = arbiter.dismiss_outstanding(&mut session);
        assert_eq!(dismissed.len(), 2);
        assert!(dismissed.iter().all(|i| i.resolution == Resolution::Dismissed));
        assert!(arbiter.pending(&session).is_none());
    }
}
