//! Session aggregate: phase, participants, transcript, evaluation, cursor.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TrialError, TrialResult};
use crate::evaluation::{EvaluationRecord, EvaluationReport};
use crate::roles::{AgentProfile, AgentStatus, Cast, CourtRole, Participant};
use crate::scenario::ScenarioBlueprint;
use crate::scheduler::Cursor;
use crate::transcript::TranscriptLog;

use super::phase::TrialPhase;

/// A phase transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: TrialPhase,
    pub to: TrialPhase,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// One rehearsal session. Owns its transcript, interrupts and evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: String,
    pub scenario_id: String,
    /// Catalog revision the session was built from.
    pub scenario_revision: u64,
    pub phase: TrialPhase,
    pub paused: bool,
    /// Participants in the order judge, prosecutor, defense, coach, witnesses.
    pub participants: Vec<Participant>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    pub transcript: TranscriptLog,
    pub evaluation: EvaluationRecord,
    /// Frozen report, set on entering evaluation or closing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<EvaluationReport>,
    /// Outstanding objection ids, head is the pending one.
    pub objection_queue: VecDeque<String>,
    /// Rotation position within the current phase.
    pub cursor: Cursor,
    /// Next sequence number to hand out.
    pub next_sequence: u64,
    /// Phases with at least one failed generation.
    pub degraded_phases: Vec<TrialPhase>,
    pub transitions: Vec<PhaseTransition>,
    /// User-typed text for the next defense turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_user_utterance: Option<String>,
}

impl Session {
    /// Create a session in `Lobby` from a validated scenario.
    pub fn new(scenario: &ScenarioBlueprint, cast: &Cast) -> Self {
        let participants = cast
            .profiles()
            .into_iter()
            .cloned()
            .chain(scenario.witnesses.iter().map(|w| w.agent_profile()))
            .map(Participant::new)
            .collect();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            scenario_id: scenario.id.clone(),
            scenario_revision: scenario.revision,
            phase: TrialPhase::Lobby,
            paused: false,
            participants,
            created_at: Utc::now(),
            paused_at: None,
            resumed_at: None,
            closed_at: None,
            close_reason: None,
            transcript: TranscriptLog::new(),
            evaluation: EvaluationRecord::new(),
            report: None,
            objection_queue: VecDeque::new(),
            cursor: Cursor::default(),
            next_sequence: 1,
            degraded_phases: Vec::new(),
            transitions: Vec::new(),
            pending_user_utterance: None,
        }
    }

    /// Transition to a new phase with a reason.
    pub fn transition(&mut self, to: TrialPhase, reason: &str) -> TrialResult<()> {
        if !self.phase.valid_transitions().contains(&to) {
            return Err(TrialError::InvalidTransition {
                from: self.phase,
                to,
                reason: format!(
                    "not a valid transition (allowed: {:?})",
                    self.phase.valid_transitions()
                ),
            });
        }
        self.transitions.push(PhaseTransition {
            from: self.phase,
            to,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        self.phase = to;
        self.cursor = Cursor::default();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Hand out the next sequence number. Called only when a turn is appended.
    pub fn allocate_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    pub fn participant(&self, agent_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.agent_id() == agent_id)
    }

    /// First participant playing a role.
    pub fn participant_for_role(&self, role: CourtRole) -> Option<&Participant> {
        self.participants.iter().find(|p| p.role() == role)
    }

    pub fn profile(&self, agent_id: &str) -> Option<&AgentProfile> {
        self.participant(agent_id).map(|p| &p.profile)
    }

    /// The agent currently holding the floor.
    pub fn speaking(&self) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.status == AgentStatus::Speaking)
    }

    /// Give the floor to an agent. Anyone else speaking or on hold goes back
    /// to active. While paused or arbitrating, the new speaker starts on hold.
    pub fn set_speaker(&mut self, agent_id: &str) {
        let hold = self.paused || !self.objection_queue.is_empty();
        for p in &mut self.participants {
            if p.status == AgentStatus::Finished {
                continue;
            }
            p.status = if p.profile.agent_id == agent_id {
                if hold {
                    AgentStatus::OnHold
                } else {
                    AgentStatus::Speaking
                }
            } else {
                AgentStatus::Active
            };
        }
    }

    /// Suspend the current speaker.
    pub fn hold_speaker(&mut self) {
        for p in &mut self.participants {
            if p.status == AgentStatus::Speaking {
                p.status = AgentStatus::OnHold;
            }
        }
    }

    /// Restore the held speaker, unless still paused or arbitrating.
    pub fn release_speaker(&mut self) {
        if self.paused || !self.objection_queue.is_empty() {
            return;
        }
        for p in &mut self.participants {
            if p.status == AgentStatus::OnHold {
                p.status = AgentStatus::Speaking;
            }
        }
    }

    /// Nobody holds the floor.
    pub fn clear_speaker(&mut self) {
        for p in &mut self.participants {
            if matches!(p.status, AgentStatus::Speaking | AgentStatus::OnHold) {
                p.status = AgentStatus::Active;
            }
        }
    }

    pub fn finish_all(&mut self) {
        for p in &mut self.participants {
            p.status = AgentStatus::Finished;
        }
    }

    pub fn is_degraded(&self, phase: TrialPhase) -> bool {
        self.degraded_phases.contains(&phase)
    }

    pub fn mark_degraded(&mut self) {
        if !self.is_degraded(self.phase) {
            self.degraded_phases.push(self.phase);
        }
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "[{}{}] {} turns | {} objection(s) outstanding | scenario={}",
            self.phase,
            if self.paused { ", paused" } else { "" },
            self.transcript.len(),
            self.objection_queue.len(),
            self.scenario_id
        )
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new(&ScenarioBlueprint::for_tests(), &Cast::default())
    }
}
