//! Turn scheduler: picks the next speaker and obtains their utterance.
//!
//! The scheduler never mutates the session. It reads the rotation cursor
//! and transcript, asks the reasoning service for text, and hands a ready
//! `Turn` back to the engine, which assigns the sequence on append.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{TrialError, TrialResult};
use crate::interrupt::Interrupt;
use crate::roles::{AgentProfile, CourtRole};
use crate::scenario::ScenarioBlueprint;
use crate::services::{GenerationRequest, ReasoningService, ServiceError};
use crate::session::Session;
use crate::transcript::Turn;

use super::context::ContextWindow;
use super::rotation::{PhasePlan, ScheduledSlot};

/// Attempts per utterance: the original request plus one reduced-context retry.
const MAX_ATTEMPTS: u32 = 2;

/// What the scheduler produced.
#[derive(Debug, Clone, PartialEq)]
pub enum NextTurn {
    /// A turn ready to append. Its sequence is provisional.
    Turn(Turn),
    /// The rotation for the current phase is used up.
    PhaseExhausted,
}

/// Schedules turns for one session.
#[derive(Debug, Clone)]
pub struct TurnScheduler {
    window: ContextWindow,
    timeout: Duration,
    max_utterance_chars: usize,
}

impl TurnScheduler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            window: ContextWindow::new(config.context_turns, config.context_chars),
            timeout: config.reasoning_timeout(),
            max_utterance_chars: config.max_utterance_chars.max(1),
        }
    }

    pub fn window(&self) -> ContextWindow {
        self.window
    }

    /// Plan for the session's current phase.
    pub fn plan(&self, session: &Session, scenario: &ScenarioBlueprint) -> PhasePlan {
        PhasePlan::for_phase(session.phase, scenario)
    }

    /// Scheduled turns left in the current phase.
    pub fn remaining(&self, session: &Session, scenario: &ScenarioBlueprint) -> u32 {
        self.plan(session, scenario).remaining(session.cursor)
    }

    /// Produce the next turn in rotation.
    ///
    /// Refuses while an objection is outstanding or the latest turn has not
    /// finished narrating.
    pub async fn next_turn(
        &self,
        session: &Session,
        scenario: &ScenarioBlueprint,
        reasoning: &dyn ReasoningService,
    ) -> TrialResult<NextTurn> {
        if !session.objection_queue.is_empty() {
            return Err(TrialError::blocked("an objection is awaiting a ruling"));
        }
        if let Some(turn) = session.transcript.awaiting_narration() {
            return Err(TrialError::blocked(format!(
                "turn {} has not finished narrating",
                turn.sequence
            )));
        }

        let plan = self.plan(session, scenario);
        let Some(slot) = plan.slot_at(session.cursor) else {
            debug!(session_id = %session.id, phase = %session.phase, "Rotation exhausted");
            return Ok(NextTurn::PhaseExhausted);
        };

        let speaker = self.speaker_for(session, scenario, &slot)?;
        let sequence = session.next_sequence;

        if slot.speaker == CourtRole::Defense {
            if let Some(text) = &session.pending_user_utterance {
                let mut turn = self.build_turn(session, &slot, &speaker, sequence, text.clone());
                turn.user_authored = true;
                debug!(session_id = %session.id, sequence, "Using user-authored defense turn");
                return Ok(NextTurn::Turn(turn));
            }
        }

        let witness = slot.witness_id.as_deref().and_then(|id| scenario.witness(id));
        let mut constraints = Vec::new();
        if slot.speaker.is_counsel() {
            if let Some(w) = witness {
                constraints.push(format!(
                    "You are examining {}. Ask one question at a time.",
                    w.name
                ));
            }
        }
        let fact_context = if slot.speaker == CourtRole::Witness {
            scenario.fact_context(witness)
        } else {
            scenario.fact_context(None)
        };

        let request = GenerationRequest {
            session_id: session.id.clone(),
            phase: session.phase,
            role: slot.speaker,
            speaker_id: speaker.agent_id.clone(),
            speaker_name: speaker.display_name.clone(),
            persona: speaker.persona.clone(),
            addressee: slot.addressee,
            fact_context,
            history: Vec::new(),
            constraints,
        };

        let text = self
            .generate_checked(reasoning, session, request, None, None)
            .await?;
        Ok(NextTurn::Turn(
            self.build_turn(session, &slot, &speaker, sequence, text),
        ))
    }

    /// Replacement content for a turn whose objection was sustained.
    ///
    /// The request repeats the original speaker's context but only sees
    /// history before the target turn, and is told what to leave out.
    pub async fn regenerate(
        &self,
        session: &Session,
        scenario: &ScenarioBlueprint,
        reasoning: &dyn ReasoningService,
        sequence: u64,
        objection: &Interrupt,
    ) -> TrialResult<String> {
        let target = session
            .transcript
            .get(sequence)
            .ok_or(TrialError::TurnNotFound { sequence })?;
        let speaker = session
            .profile(&target.speaker_id)
            .ok_or_else(|| {
                TrialError::scenario_invalid(
                    &session.scenario_id,
                    format!("no participant with id '{}'", target.speaker_id),
                )
            })?
            .clone();

        let witness = match target.speaker_role {
            CourtRole::Witness => scenario.witness(&target.speaker_id),
            _ => None,
        };
        let grounds = objection.payload.grounds.as_deref().unwrap_or("unspecified");
        let excluded = objection
            .payload
            .excerpt
            .clone()
            .unwrap_or_else(|| target.content.clone());
        let constraints = vec![
            format!(
                "Your previous statement drew a sustained objection on the grounds of {}: \"{}\"",
                grounds, target.content
            ),
            format!(
                "Restate your point without this material: \"{}\"",
                excluded
            ),
        ];

        let request = GenerationRequest {
            session_id: session.id.clone(),
            phase: target.phase,
            role: target.speaker_role,
            speaker_id: speaker.agent_id.clone(),
            speaker_name: speaker.display_name.clone(),
            persona: speaker.persona.clone(),
            addressee: target.addressee,
            fact_context: scenario.fact_context(witness),
            history: Vec::new(),
            constraints,
        };

        let text = self
            .generate_checked(reasoning, session, request, Some(sequence), Some(&excluded))
            .await?;
        Ok(text)
    }

    /// Call the reasoning service, retrying once with a halved context
    /// window when the call fails or the text is unusable.
    async fn generate_checked(
        &self,
        reasoning: &dyn ReasoningService,
        session: &Session,
        mut request: GenerationRequest,
        before: Option<u64>,
        excluded: Option<&str>,
    ) -> TrialResult<String> {
        let mut window = self.window;
        let mut last_problem = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            request.history = window.collect_before(&session.transcript, before);
            let result = match tokio::time::timeout(self.timeout, reasoning.generate(&request)).await
            {
                Ok(result) => result,
                Err(_) => Err(ServiceError::Timeout {
                    after_ms: self.timeout.as_millis() as u64,
                }),
            };
            let checked = result
                .map_err(|e| e.to_string())
                .and_then(|u| validate_utterance(&u.text, self.max_utterance_chars, excluded));
            match checked {
                Ok(text) => {
                    debug!(
                        session_id = %session.id,
                        role = %request.role,
                        attempt,
                        history = request.history.len(),
                        "Utterance generated"
                    );
                    return Ok(text);
                }
                Err(problem) => {
                    warn!(
                        session_id = %session.id,
                        role = %request.role,
                        attempt,
                        problem = %problem,
                        "Generation attempt failed"
                    );
                    last_problem = problem;
                    window = window.reduced();
                }
            }
        }
        Err(TrialError::GenerationFailed {
            phase: request.phase,
            role: request.role,
            attempts: MAX_ATTEMPTS,
            reason: last_problem,
        })
    }

    fn speaker_for(
        &self,
        session: &Session,
        scenario: &ScenarioBlueprint,
        slot: &ScheduledSlot,
    ) -> TrialResult<AgentProfile> {
        let participant = match (slot.speaker, slot.witness_id.as_deref()) {
            (CourtRole::Witness, Some(id)) => session.participant(id),
            (CourtRole::Witness, None) => None,
            (role, _) => session.participant_for_role(role),
        };
        participant.map(|p| p.profile.clone()).ok_or_else(|| {
            TrialError::scenario_invalid(
                &scenario.id,
                format!("no participant can speak as {}", slot.speaker),
            )
        })
    }

    fn build_turn(
        &self,
        session: &Session,
        slot: &ScheduledSlot,
        speaker: &AgentProfile,
        sequence: u64,
        content: String,
    ) -> Turn {
        Turn::new(
            sequence,
            session.phase,
            slot.speaker,
            speaker.agent_id.clone(),
            speaker.display_name.clone(),
            content,
        )
        .addressing(slot.addressee)
        .examining(slot.witness_id.clone())
    }
}


/// Trimmed utterance text, or why it is unusable.
fn validate_utterance(text: &str, max_chars: usize, excluded: Option<&str>) -> Result<String, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("empty utterance".to_string());
    }
    if !text.chars().any(char::is_alphanumeric) {
        return Err("utterance has no words".to_string());
    }
    let len = text.chars().count();
    if len > max_chars {
        return Err(format!("utterance is {len} chars, limit is {max_chars}"));
    }
    if let Some(excluded) = excluded.map(str::trim).filter(|e| !e.is_empty()) {
        if text.to_lowercase().contains(&excluded.to_lowercase()) {
            return Err("utterance repeats the objected material".to_string());
        }
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::ScriptedReasoning;
    use crate::services::Utterance;
    use crate::session::TrialPhase;
    use crate::transcript::NarrationStatus;

    fn setup() -> (TurnScheduler, Session, ScenarioBlueprint) {
        (
            TurnScheduler::new(&EngineConfig::default()),
            Session::for_tests(),
            ScenarioBlueprint::for_tests(),
        )
    }

    fn append(session: &mut Session, turn: Turn) {
        let mut turn = turn;
        turn.sequence = session.allocate_sequence();
        turn.advance_narration(NarrationStatus::Skipped).unwrap();
        session.transcript.append(turn).unwrap();
    }

    #[tokio::test]
    async fn test_opening_starts_with_prosecutor() {
        let (scheduler, mut session, scenario) = setup();
        session.transition(TrialPhase::Opening, "start").unwrap();
        let reasoning = ScriptedReasoning::default();

        let NextTurn::Turn(turn) = scheduler
            .next_turn(&session, &scenario, &reasoning)
            .await
            .unwrap()
        else {
            panic!("expected a turn");
        };
        assert_eq!(turn.speaker_role, CourtRole::Prosecutor);
        assert_eq!(turn.sequence, 1);
        assert_eq!(turn.content, "prosecutor line 1");
    }

    #[tokio::test]
    async fn test_blocked_while_narration_pending() {
        let (scheduler, mut session, scenario) = setup();
        session.transition(TrialPhase::Opening, "start").unwrap();
        let seq = session.allocate_sequence();
        session
            .transcript
            .append(Turn::new(seq, TrialPhase::Opening, CourtRole::Prosecutor, "prosecutor", "P", "x"))
            .unwrap();

        let err = scheduler
            .next_turn(&session, &scenario, &ScriptedReasoning::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TrialError::TurnBlocked { .. }));
    }

    #[tokio::test]
    async fn test_retry_uses_reduced_window() {
        let (scheduler, mut session, scenario) = setup();
        session.transition(TrialPhase::Opening, "start").unwrap();
        for i in 0..8 {
            append(
                &mut session,
                Turn::new(0, TrialPhase::Opening, CourtRole::Prosecutor, "prosecutor", "P", format!("line {i}")),
            );
        }
        session.cursor = Default::default();
        let reasoning = ScriptedReasoning::with_replies(vec![
            Err(ServiceError::Malformed("bad json".into())),
            Ok(Utterance::new("  Ladies and gentlemen.  ")),
        ]);

        let NextTurn::Turn(turn) = scheduler
            .next_turn(&session, &scenario, &reasoning)
            .await
            .unwrap()
        else {
            panic!("expected a turn");
        };
        assert_eq!(turn.content, "Ladies and gentlemen.");
        let requests = reasoning.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].history.len(), 8);
        assert_eq!(requests[1].history.len(), 6);
    }

    #[tokio::test]
    async fn test_two_bad_replies_fail_generation() {
        let (scheduler, mut session, scenario) = setup();
        session.transition(TrialPhase::Opening, "start").unwrap();
        let reasoning = ScriptedReasoning::with_replies(vec![
            Ok(Utterance::new("   ")),
            Ok(Utterance::new("...")),
        ]);

        let err = scheduler
            .next_turn(&session, &scenario, &reasoning)
            .await
            .unwrap_err();
        match err {
            TrialError::GenerationFailed { role, attempts, .. } => {
                assert_eq!(role, CourtRole::Prosecutor);
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_user_utterance_fills_defense_slot() {
        let (scheduler, mut session, scenario) = setup();
        session.transition(TrialPhase::Opening, "start").unwrap();
        session.cursor.slot = 1;
        session.pending_user_utterance = Some("My client is innocent.".into());
        let reasoning = ScriptedReasoning::default();

        let NextTurn::Turn(turn) = scheduler
            .next_turn(&session, &scenario, &reasoning)
            .await
            .unwrap()
        else {
            panic!("expected a turn");
        };
        assert!(turn.user_authored);
        assert_eq!(turn.speaker_role, CourtRole::Defense);
        assert_eq!(reasoning.calls(), 0);
    }

    #[tokio::test]
    async fn test_witness_sees_own_statement() {
        let (scheduler, mut session, scenario) = setup();
        session.transition(TrialPhase::Opening, "start").unwrap();
        session.transition(TrialPhase::DirectExamination, "next").unwrap();
        session.cursor.slot = 1;
        let reasoning = ScriptedReasoning::default();

        let NextTurn::Turn(turn) = scheduler
            .next_turn(&session, &scenario, &reasoning)
            .await
            .unwrap()
        else {
            panic!("expected a turn");
        };
        assert_eq!(turn.speaker_id, "witness");
        assert_eq!(turn.witness_id.as_deref(), Some("witness"));
        let requests = reasoning.requests.lock().unwrap();
        assert!(requests[0]
            .fact_context
            .iter()
            .any(|c| c.contains("I saw a red car.")));
    }

    #[tokio::test]
    async fn test_regenerate_excludes_objected_material() {
        let (scheduler, mut session, scenario) = setup();
        session.transition(TrialPhase::Opening, "start").unwrap();
        append(
            &mut session,
            Turn::new(0, TrialPhase::Opening, CourtRole::Prosecutor, "prosecutor", "P", "He is a known liar."),
        );
        let objection = Interrupt::objection(
            CourtRole::Defense,
            1,
            "argumentative",
            Some("known liar".into()),
        );
        let reasoning = ScriptedReasoning::with_replies(vec![
            Ok(Utterance::new("He is still a KNOWN LIAR.")),
            Ok(Utterance::new("The evidence will speak for itself.")),
        ]);

        let text = scheduler
            .regenerate(&session, &scenario, &reasoning, 1, &objection)
            .await
            .unwrap();
        assert_eq!(text, "The evidence will speak for itself.");
        let requests = reasoning.requests.lock().unwrap();
        assert!(requests[0].history.is_empty());
        assert!(requests[0].constraints[1].contains("known liar"));
    }

    #[test]
    fn test_validate_utterance() {
        assert!(validate_utterance("", 10, None).is_err());
        assert!(validate_utterance("?!", 10, None).is_err());
        assert!(validate_utterance("far too long for it", 5, None).is_err());
        assert_eq!(validate_utterance(" Yes. ", 10, None).unwrap(), "Yes.");
    }
}
