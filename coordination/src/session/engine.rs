//! Trial engine: the session state machine and its cooperative control loop.
//!
//! One engine drives one session. All mutation happens on `&mut self`; the
//! only suspension points are the reasoning call, the narration call and the
//! judge ruling. Commands from [`SessionHandle`]s are applied before each
//! tick and again after every suspension point, so a result computed for a
//! session that has since been aborted is dropped instead of applied.
//!
//! ```text
//!             ┌──────────── tick() ─────────────┐
//!             │ 1. drain handle commands        │
//!             │ 2. closed? paused?              │
//!             │ 3. objection pending ──▶ judge  │──▶ Arbitrated
//!             │ 4. turn unnarrated  ──▶ voice   │──▶ Narrated
//!             │ 5. timing reminder (non-block)  │
//!             │ 6. scheduler.next_turn()        │──▶ TurnScheduled
//!             │                                 │──▶ PhaseExhausted / PhaseAdvanced
//!             │                                 │──▶ GenerationFailed
//!             └─────────────────────────────────┘
//! ```

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{TrialError, TrialResult};
use crate::evaluation::{CoachPolicy, MetricUpdate};
use crate::events::{CloseReason, EventBus, SharedEventBus, TrialEvent};
use crate::interrupt::{
    obtain_ruling, ruling_request, Interrupt, InterruptArbiter, RulingKind, Verdict,
};
use crate::roles::CourtRole;
use crate::scenario::{CatalogError, ObjectionRemedy, ScenarioBlueprint};
use crate::scheduler::{rotation_for, NextTurn, TurnScheduler};
use crate::services::{TrialServices, VoicePersona};
use crate::transcript::{NarrationStatus, Turn};
use crate::voice::VoiceSyncCoordinator;

use super::handle::{Command, SessionHandle};
use super::phase::TrialPhase;
use super::state::Session;
use super::summary::SessionSummary;

/// What one [`TrialEngine::tick`] accomplished.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The session is paused; nothing was done.
    Paused,
    /// The head objection was ruled on.
    Arbitrated {
        interrupt_id: String,
        verdict: Verdict,
    },
    /// A turn's narration settled.
    Narrated {
        sequence: u64,
        status: NarrationStatus,
    },
    /// A new turn was appended.
    TurnScheduled { sequence: u64 },
    /// The rotation is used up and auto-advance is off.
    PhaseExhausted { phase: TrialPhase },
    /// The rotation was used up and the engine moved on.
    PhaseAdvanced { from: TrialPhase, to: TrialPhase },
    /// Generation failed twice; the phase is now degraded.
    GenerationFailed { phase: TrialPhase, reason: String },
    /// A result arrived after the phase it was computed for had ended.
    Discarded,
    /// The session is closed.
    Closed,
}

/// Drives one rehearsal session.
pub struct TrialEngine {
    session: Session,
    scenario: ScenarioBlueprint,
    config: EngineConfig,
    services: TrialServices,
    scheduler: TurnScheduler,
    arbiter: InterruptArbiter,
    voice: VoiceSyncCoordinator,
    coach: CoachPolicy,
    bus: SharedEventBus,
    command_tx: mpsc::UnboundedSender<Command>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
    phase_clock: Instant,
    timing_reminded: bool,
}

impl TrialEngine {
    /// Load a scenario and create a session in `Lobby`.
    pub async fn start(
        scenario_id: &str,
        services: TrialServices,
        config: EngineConfig,
    ) -> TrialResult<Self> {
        let scenario = services
            .catalog
            .load(scenario_id)
            .await
            .map_err(|e| match e {
                CatalogError::NotFound { .. } => TrialError::ScenarioNotFound {
                    scenario_id: scenario_id.to_string(),
                },
                CatalogError::Unreadable { reason, .. } => {
                    TrialError::scenario_invalid(scenario_id, reason)
                }
            })?;
        scenario.validate()?;
        if let Some(clash) = scenario
            .witnesses
            .iter()
            .find(|w| config.cast.uses_id(&w.id))
        {
            return Err(TrialError::scenario_invalid(
                &scenario.id,
                format!("witness id '{}' clashes with a cast member", clash.id),
            ));
        }

        let session = Session::new(&scenario, &config.cast);
        let bus = EventBus::new(config.event_journal_capacity).shared();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        info!(
            session_id = %session.id,
            scenario = %scenario.id,
            revision = scenario.revision,
            witnesses = scenario.witnesses.len(),
            "Session created"
        );

        Ok(Self {
            scheduler: TurnScheduler::new(&config),
            arbiter: InterruptArbiter::new(config.objection_queue_capacity),
            voice: VoiceSyncCoordinator::new(config.narration_timeout()),
            coach: CoachPolicy::new(config.coach.clone()),
            session,
            scenario,
            config,
            services,
            bus,
            command_tx,
            command_rx,
            cancel: CancellationToken::new(),
            phase_clock: Instant::now(),
            timing_reminded: false,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn scenario(&self) -> &ScenarioBlueprint {
        &self.scenario
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The session's event bus.
    pub fn events(&self) -> SharedEventBus {
        Arc::clone(&self.bus)
    }

    /// A new handle for queuing commands from other tasks.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(
            self.session.id.clone(),
            self.command_tx.clone(),
            self.cancel.clone(),
        )
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary::from_session(
            &self.session,
            &self.scenario.title,
            self.config.coach.max_pacing_wpm,
        )
    }

    /// Move to the next phase once the current one is exhausted.
    pub fn advance_phase(&mut self) -> TrialResult<TrialPhase> {
        self.ensure_open()?;
        let remaining_turns = self.scheduler.remaining(&self.session, &self.scenario);
        let outstanding_objections = self.session.objection_queue.len();
        let narration_pending = self.session.transcript.awaiting_narration().is_some();
        if remaining_turns > 0 || outstanding_objections > 0 || narration_pending {
            return Err(TrialError::PhaseNotExhausted {
                phase: self.session.phase,
                remaining_turns,
                outstanding_objections,
                narration_pending,
            });
        }
        self.enter_next_phase("rotation complete")
    }

    /// Leave a degraded phase even though turns remain.
    pub fn skip_degraded_phase(&mut self) -> TrialResult<TrialPhase> {
        self.ensure_open()?;
        let phase = self.session.phase;
        if !self.session.is_degraded(phase) {
            return Err(TrialError::PhaseNotDegraded { phase });
        }
        self.dismiss_outstanding();
        warn!(session_id = %self.session.id, %phase, "Skipping degraded phase");
        self.enter_next_phase("degraded phase skipped")
    }

    pub fn pause(&mut self) -> TrialResult<()> {
        self.ensure_open()?;
        if self.session.paused {
            return Ok(());
        }
        self.session.paused = true;
        self.session.paused_at = Some(Utc::now());
        self.session.hold_speaker();
        info!(session_id = %self.session.id, phase = %self.session.phase, "Session paused");
        self.emit(TrialEvent::SessionPaused {
            session_id: self.session.id.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Resume from the saved cursor after checking the scenario is unchanged.
    pub async fn resume(&mut self) -> TrialResult<()> {
        self.ensure_open()?;
        if !self.session.paused {
            return Ok(());
        }
        let expected = self.session.scenario_revision;
        match self.services.catalog.revision(&self.session.scenario_id).await {
            Ok(revision) if revision == expected => {}
            Ok(revision) => {
                return Err(TrialError::stale(
                    &self.session.id,
                    format!("scenario revision changed from {expected} to {revision}"),
                ))
            }
            Err(CatalogError::NotFound { .. }) => {
                return Err(TrialError::stale(
                    &self.session.id,
                    "scenario is no longer in the catalog",
                ))
            }
            Err(e) => return Err(TrialError::stale(&self.session.id, e.to_string())),
        }

        self.session.paused = false;
        self.session.resumed_at = Some(Utc::now());
        self.session.release_speaker();
        info!(session_id = %self.session.id, phase = %self.session.phase, "Session resumed");
        self.emit(TrialEvent::SessionResumed {
            session_id: self.session.id.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Close the session from any phase. Idempotent once closed.
    pub fn abort(&mut self, reason: &str) -> TrialResult<()> {
        if self.session.is_closed() {
            debug!(session_id = %self.session.id, "Abort on closed session ignored");
            return Ok(());
        }
        self.close(CloseReason::Aborted(reason.to_string()))
    }

    /// Raise an objection against the latest turn.
    pub fn raise_objection(
        &mut self,
        raised_by: CourtRole,
        grounds: &str,
        excerpt: Option<String>,
    ) -> TrialResult<Interrupt> {
        self.ensure_open()?;
        let objection = self
            .arbiter
            .raise_objection(&mut self.session, raised_by, grounds, excerpt)?;
        let before_narration = objection
            .target_sequence
            .and_then(|seq| self.session.transcript.get(seq))
            .is_some_and(|t| !t.narration.is_settled());
        self.emit_raised(&objection);
        let updates = self
            .session
            .evaluation
            .ingest_objection_timing(&objection, before_narration);
        self.publish_updates(&updates);
        Ok(objection)
    }

    /// Grant a coaching cue on the latest turn.
    pub fn coaching_cue(&mut self, text: &str) -> TrialResult<Interrupt> {
        self.ensure_open()?;
        let cue = self.arbiter.coaching_cue(&mut self.session, text)?;
        self.emit_raised(&cue);
        let updates = self.session.evaluation.ingest_cue(&cue);
        self.publish_updates(&updates);
        Ok(cue)
    }

    /// Issue a non-blocking judge ruling.
    pub fn issue_ruling(&mut self, kind: RulingKind, text: &str) -> TrialResult<Interrupt> {
        self.ensure_open()?;
        let ruling = self.arbiter.issue_ruling(&mut self.session, kind, text)?;
        self.emit_raised(&ruling);
        Ok(ruling)
    }

    /// Use the user's own words for the next defense turn.
    pub fn submit_user_utterance(&mut self, text: &str) -> TrialResult<()> {
        self.ensure_open()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(TrialError::InvalidUtterance {
                reason: "utterance is empty".to_string(),
            });
        }
        if text.chars().count() > self.config.max_utterance_chars {
            return Err(TrialError::InvalidUtterance {
                reason: format!(
                    "utterance exceeds {} characters",
                    self.config.max_utterance_chars
                ),
            });
        }
        self.session.pending_user_utterance = Some(text.to_string());
        debug!(session_id = %self.session.id, "User utterance queued for next defense turn");
        Ok(())
    }

    /// Run one step of the control loop.
    pub async fn tick(&mut self) -> TrialResult<TickOutcome> {
        self.drain_commands().await;
        self.ensure_open()?;
        if self.session.paused {
            return Ok(TickOutcome::Paused);
        }

        if !self.session.objection_queue.is_empty() {
            return self.arbitrate().await;
        }

        if let Some(sequence) = self
            .session
            .transcript
            .awaiting_narration()
            .map(|t| t.sequence)
        {
            return self.narrate(sequence).await;
        }

        self.check_timing()?;
        self.schedule().await
    }

    /// Tick until `stop` says so, the session pauses or closes, or
    /// `max_ticks` is reached.
    pub async fn run_until<P>(&mut self, mut stop: P, max_ticks: usize) -> TrialResult<Vec<TickOutcome>>
    where
        P: FnMut(&TickOutcome, &Session) -> bool,
    {
        let mut outcomes = Vec::new();
        for _ in 0..max_ticks {
            let outcome = self.tick().await?;
            let done = stop(&outcome, &self.session)
                || matches!(outcome, TickOutcome::Closed | TickOutcome::Paused);
            outcomes.push(outcome);
            if done {
                break;
            }
        }
        Ok(outcomes)
    }

    /// Drive the whole trial, advancing exhausted phases, until it closes.
    pub async fn run_to_close(&mut self, max_ticks: usize) -> TrialResult<Vec<TickOutcome>> {
        let mut outcomes = Vec::new();
        for _ in 0..max_ticks {
            if self.session.is_closed() {
                break;
            }
            let outcome = self.tick().await?;
            match &outcome {
                TickOutcome::PhaseExhausted { .. } => {
                    self.advance_phase()?;
                }
                TickOutcome::Paused => {
                    outcomes.push(outcome);
                    break;
                }
                _ => {}
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    // ── control loop steps ──────────────────────────────────────────────

    async fn arbitrate(&mut self) -> TrialResult<TickOutcome> {
        let Some(objection) = self.arbiter.pending(&self.session).cloned() else {
            return Err(TrialError::invalid_interrupt("objection queue out of sync"));
        };
        let sequence = objection
            .target_sequence
            .ok_or_else(|| TrialError::invalid_interrupt("objection has no target turn"))?;
        let target = self
            .session
            .transcript
            .get(sequence)
            .cloned()
            .ok_or(TrialError::TurnNotFound { sequence })?;

        let history = self
            .scheduler
            .window()
            .collect_before(&self.session.transcript, Some(sequence + 1));
        let request = ruling_request(
            &self.session.id,
            &self.config.cast.judge,
            self.session.phase,
            &objection,
            &target,
            self.scenario.fact_context(None),
            history,
        );
        let reasoning = Arc::clone(&self.services.reasoning);
        let cancel = self.cancel.clone();
        let ruling = cancellable(
            &cancel,
            obtain_ruling(reasoning.as_ref(), &request, self.config.judge_timeout()),
        )
        .await;
        let Some(ruling) = self.settle_suspension(ruling).await? else {
            return Ok(TickOutcome::Closed);
        };
        if self.arbiter.pending(&self.session).map(|i| i.id.as_str()) != Some(objection.id.as_str())
        {
            return Ok(TickOutcome::Discarded);
        }

        if ruling.defaulted {
            self.emit_warning(
                "ruling_defaulted",
                format!("No usable ruling on {}; treated as overruled", objection.id),
                Some(sequence),
            );
        }
        let resolved = self
            .arbiter
            .resolve_pending(&mut self.session, ruling.verdict, &ruling.text)?;
        self.emit(TrialEvent::InterruptResolved {
            session_id: self.session.id.clone(),
            interrupt_id: resolved.id.clone(),
            kind: resolved.kind,
            resolution: resolved.resolution,
            ruling: resolved.ruling_text.clone(),
            timestamp: Utc::now(),
        });
        let updates = self
            .session
            .evaluation
            .ingest_verdict(&resolved, ruling.verdict);
        self.publish_updates(&updates);

        if ruling.verdict == Verdict::Sustained && !self.apply_remedy(&resolved, sequence).await? {
            return Ok(TickOutcome::Closed);
        }

        self.session.release_speaker();
        Ok(TickOutcome::Arbitrated {
            interrupt_id: resolved.id,
            verdict: ruling.verdict,
        })
    }

    /// Regenerate or redact a turn after a sustained objection.
    /// Returns `false` when the session closed while regenerating.
    async fn apply_remedy(&mut self, objection: &Interrupt, sequence: u64) -> TrialResult<bool> {
        if self.scenario.objection_remedy == ObjectionRemedy::Redact {
            let turn = self
                .session
                .transcript
                .redact(sequence, objection.payload.excerpt.as_deref())?
                .clone();
            self.emit_regenerated(&turn);
            return Ok(true);
        }

        let reasoning = Arc::clone(&self.services.reasoning);
        let cancel = self.cancel.clone();
        let result = cancellable(
            &cancel,
            self.scheduler.regenerate(
                &self.session,
                &self.scenario,
                reasoning.as_ref(),
                sequence,
                objection,
            ),
        )
        .await;
        let Some(result) = self.settle_suspension(result).await? else {
            return Ok(false);
        };

        match result {
            Ok(content) => {
                let turn = self
                    .session
                    .transcript
                    .replace_content(sequence, content)?
                    .clone();
                info!(
                    session_id = %self.session.id,
                    sequence,
                    revision = turn.revision,
                    "Turn regenerated after sustained objection"
                );
                self.emit_regenerated(&turn);
            }
            Err(e) => {
                let turn = {
                    let turn = self.session.transcript.turn_mut(sequence)?;
                    turn.stricken = true;
                    turn.clone()
                };
                self.session.mark_degraded();
                warn!(session_id = %self.session.id, sequence, error = %e, "Regeneration failed, turn stricken");
                self.emit_warning(e.code(), e.to_string(), Some(sequence));
                self.emit_regenerated(&turn);
            }
        }
        Ok(true)
    }

    async fn narrate(&mut self, sequence: u64) -> TrialResult<TickOutcome> {
        let voice = {
            let turn = self
                .session
                .transcript
                .get(sequence)
                .ok_or(TrialError::TurnNotFound { sequence })?;
            let profile = self.session.profile(&turn.speaker_id);
            VoicePersona {
                role: turn.speaker_role,
                display_name: turn.speaker_name.clone(),
                voice_id: profile.and_then(|p| p.voice_id.clone()),
            }
        };
        let request =
            self.voice
                .begin(&self.session.id, &mut self.session.transcript, sequence, voice)?;

        let narration = Arc::clone(&self.services.narration);
        let cancel = self.cancel.clone();
        let signal = cancellable(
            &cancel,
            self.voice.await_completion(narration.as_ref(), &request),
        )
        .await;
        let Some(signal) = self.settle_suspension(signal).await? else {
            return Ok(TickOutcome::Closed);
        };

        let outcome = self
            .voice
            .settle(&mut self.session.transcript, sequence, signal)?;
        self.emit(TrialEvent::TurnNarrated {
            session_id: self.session.id.clone(),
            sequence,
            status: outcome.status,
            text_fallback: outcome.text_fallback,
            duration_ms: outcome.duration_ms,
            timestamp: Utc::now(),
        });
        if let Some(warning) = &outcome.warning {
            self.emit_warning(warning.code(), warning.to_string(), Some(sequence));
        }

        if let Some(turn) = self.session.transcript.get(sequence).cloned() {
            let updates = self.session.evaluation.ingest_narration(&turn);
            self.publish_updates(&updates);
            self.coach_on(&updates, sequence)?;
        }
        Ok(TickOutcome::Narrated {
            sequence,
            status: outcome.status,
        })
    }

    fn check_timing(&mut self) -> TrialResult<()> {
        let phase = self.session.phase;
        if self.timing_reminded || rotation_for(phase).is_empty() {
            return Ok(());
        }
        if let Some(text) = self
            .config
            .judge
            .timing_reminder(phase, self.phase_clock.elapsed())
        {
            self.timing_reminded = true;
            self.issue_ruling(RulingKind::TimingReminder, &text)?;
        }
        Ok(())
    }

    async fn schedule(&mut self) -> TrialResult<TickOutcome> {
        let phase = self.session.phase;
        let reasoning = Arc::clone(&self.services.reasoning);
        let cancel = self.cancel.clone();
        let result = cancellable(
            &cancel,
            self.scheduler
                .next_turn(&self.session, &self.scenario, reasoning.as_ref()),
        )
        .await;
        let Some(result) = self.settle_suspension(result).await? else {
            return Ok(TickOutcome::Closed);
        };
        if self.session.phase != phase {
            debug!(session_id = %self.session.id, %phase, "Phase changed mid-generation, result dropped");
            return Ok(TickOutcome::Discarded);
        }
        // An objection raised mid-generation is ruled on before the turn it interrupted.
        if !self.session.objection_queue.is_empty() {
            debug!(session_id = %self.session.id, %phase, "Objection pending, generated turn dropped");
            return Ok(TickOutcome::Discarded);
        }

        match result {
            Ok(NextTurn::Turn(turn)) => self.append_turn(turn),
            Ok(NextTurn::PhaseExhausted) => {
                if !self.config.auto_advance {
                    return Ok(TickOutcome::PhaseExhausted { phase });
                }
                let to = self.advance_phase()?;
                if to == TrialPhase::Closed {
                    Ok(TickOutcome::Closed)
                } else {
                    Ok(TickOutcome::PhaseAdvanced { from: phase, to })
                }
            }
            Err(e @ TrialError::GenerationFailed { .. }) => {
                self.session.mark_degraded();
                warn!(session_id = %self.session.id, %phase, error = %e, "Phase degraded");
                self.emit_warning(e.code(), e.to_string(), None);
                if self.config.auto_skip_degraded {
                    self.skip_degraded_phase()?;
                }
                Ok(TickOutcome::GenerationFailed {
                    phase,
                    reason: e.to_string(),
                })
            }
            Err(TrialError::TurnBlocked { reason }) => {
                debug!(session_id = %self.session.id, reason = %reason, "Scheduling blocked");
                Ok(TickOutcome::Discarded)
            }
            Err(e) => Err(e),
        }
    }

    fn append_turn(&mut self, mut turn: Turn) -> TrialResult<TickOutcome> {
        let plan = self.scheduler.plan(&self.session, &self.scenario);
        turn.sequence = self.session.allocate_sequence();
        let sequence = turn.sequence;
        self.session.transcript.append(turn.clone())?;
        self.session.cursor = plan.advance(self.session.cursor);
        self.session.set_speaker(&turn.speaker_id);
        if turn.user_authored {
            self.session.pending_user_utterance = None;
        }

        info!(
            session_id = %self.session.id,
            sequence,
            phase = %turn.phase,
            speaker = %turn.speaker_id,
            "Turn appended"
        );
        self.emit(TrialEvent::TurnAppended {
            session_id: self.session.id.clone(),
            sequence,
            phase: turn.phase,
            speaker_role: turn.speaker_role,
            speaker_id: turn.speaker_id.clone(),
            content: turn.content.clone(),
            user_authored: turn.user_authored,
            timestamp: Utc::now(),
        });

        let updates = self.session.evaluation.ingest_turn(&turn);
        self.publish_updates(&updates);
        self.coach_on(&updates, sequence)?;

        if let Some(notice) = self.config.judge.decorum_notice(&turn) {
            self.issue_ruling(RulingKind::DecorumNotice, &notice)?;
        }
        Ok(TickOutcome::TurnScheduled { sequence })
    }

    // ── helpers ─────────────────────────────────────────────────────────

    fn ensure_open(&self) -> TrialResult<()> {
        if self.session.is_closed() {
            return Err(TrialError::closed(&self.session.id));
        }
        Ok(())
    }

    fn enter_next_phase(&mut self, reason: &str) -> TrialResult<TrialPhase> {
        let from = self.session.phase;
        if from == TrialPhase::Evaluation {
            self.close(CloseReason::Completed)?;
            return Ok(TrialPhase::Closed);
        }
        let to = from.next().ok_or_else(|| TrialError::closed(&self.session.id))?;
        self.session.transition(to, reason)?;
        self.session.clear_speaker();
        self.phase_clock = Instant::now();
        self.timing_reminded = false;
        if to == TrialPhase::Evaluation {
            self.session.report = Some(
                self.session
                    .evaluation
                    .finalize(self.config.coach.max_pacing_wpm),
            );
        }

        info!(session_id = %self.session.id, %from, %to, reason, "Phase changed");
        self.emit(TrialEvent::PhaseChanged {
            session_id: self.session.id.clone(),
            from,
            to,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
        Ok(to)
    }

    fn close(&mut self, reason: CloseReason) -> TrialResult<()> {
        self.dismiss_outstanding();
        self.session.transcript.seal();
        self.session.report = Some(
            self.session
                .evaluation
                .finalize(self.config.coach.max_pacing_wpm),
        );

        let from = self.session.phase;
        let reason_text = reason.to_string();
        self.session.transition(TrialPhase::Closed, &reason_text)?;
        self.session.paused = false;
        self.session.closed_at = Some(Utc::now());
        self.session.close_reason = Some(reason_text.clone());
        self.session.pending_user_utterance = None;
        self.session.finish_all();
        self.cancel.cancel();

        info!(
            session_id = %self.session.id,
            %from,
            reason = %reason_text,
            turns = self.session.transcript.len(),
            "Session closed"
        );
        self.emit(TrialEvent::PhaseChanged {
            session_id: self.session.id.clone(),
            from,
            to: TrialPhase::Closed,
            reason: reason_text,
            timestamp: Utc::now(),
        });
        self.emit(TrialEvent::SessionClosed {
            session_id: self.session.id.clone(),
            reason,
            turns: self.session.transcript.len(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn dismiss_outstanding(&mut self) {
        for dismissed in self.arbiter.dismiss_outstanding(&mut self.session) {
            self.emit(TrialEvent::InterruptResolved {
                session_id: self.session.id.clone(),
                interrupt_id: dismissed.id,
                kind: dismissed.kind,
                resolution: dismissed.resolution,
                ruling: None,
                timestamp: Utc::now(),
            });
        }
    }

    fn coach_on(&mut self, updates: &[MetricUpdate], sequence: u64) -> TrialResult<()> {
        if let Some(text) = self.coach.assess(updates, sequence) {
            self.coaching_cue(&text)?;
        }
        Ok(())
    }

    /// Apply commands queued while suspended. Returns `None` once the
    /// session is closed, so the caller drops its result.
    async fn settle_suspension<T>(&mut self, result: Option<T>) -> TrialResult<Option<T>> {
        self.drain_commands().await;
        if self.session.is_closed() {
            debug!(session_id = %self.session.id, "Session closed mid-flight, result dropped");
            return Ok(None);
        }
        match result {
            Some(result) => Ok(Some(result)),
            None => {
                self.abort("cancelled")?;
                Ok(None)
            }
        }
    }

    async fn drain_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            let name = command.name();
            if let Err(e) = self.apply(command).await {
                warn!(session_id = %self.session.id, command = name, error = %e, "Command rejected");
                self.emit_warning(e.code(), format!("{name}: {e}"), None);
            }
        }
    }

    async fn apply(&mut self, command: Command) -> TrialResult<()> {
        match command {
            Command::RaiseObjection {
                raised_by,
                grounds,
                excerpt,
            } => self.raise_objection(raised_by, &grounds, excerpt).map(|_| ()),
            Command::CoachingCue { text } => self.coaching_cue(&text).map(|_| ()),
            Command::IssueRuling { kind, text } => self.issue_ruling(kind, &text).map(|_| ()),
            Command::SubmitUtterance { text } => self.submit_user_utterance(&text),
            Command::Pause => self.pause(),
            Command::Resume => self.resume().await,
            Command::Abort { reason } => self.abort(&reason),
            Command::AdvancePhase => self.advance_phase().map(|_| ()),
            Command::SkipDegradedPhase => self.skip_degraded_phase().map(|_| ()),
        }
    }

    fn emit(&self, event: TrialEvent) {
        self.bus.publish(event);
    }

    fn emit_raised(&self, interrupt: &Interrupt) {
        self.emit(TrialEvent::InterruptRaised {
            session_id: self.session.id.clone(),
            interrupt_id: interrupt.id.clone(),
            kind: interrupt.kind,
            raised_by: interrupt.raised_by,
            target_sequence: interrupt.target_sequence,
            resolution: interrupt.resolution,
            text: interrupt.payload.text.clone(),
            timestamp: Utc::now(),
        });
    }

    fn emit_regenerated(&self, turn: &Turn) {
        self.emit(TrialEvent::TurnRegenerated {
            session_id: self.session.id.clone(),
            sequence: turn.sequence,
            revision: turn.revision,
            content: turn.content.clone(),
            stricken: turn.stricken,
            timestamp: Utc::now(),
        });
    }

    fn emit_warning(&self, code: &str, message: String, sequence: Option<u64>) {
        self.emit(TrialEvent::Warning {
            session_id: self.session.id.clone(),
            code: code.to_string(),
            message,
            sequence,
            timestamp: Utc::now(),
        });
    }

    fn publish_updates(&self, updates: &[MetricUpdate]) {
        for update in updates {
            self.emit(TrialEvent::EvaluationUpdated {
                session_id: self.session.id.clone(),
                metric: update.metric.clone(),
                value: update.value,
                mean: update.mean,
                count: update.count,
                sequence: update.sequence,
                timestamp: Utc::now(),
            });
        }
    }
}

/// Race `fut` against cancellation. `None` means the token fired first.
async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}
