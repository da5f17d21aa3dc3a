//! Exportable session summary: transcript, interrupts and scoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::evaluation::EvaluationReport;
use crate::interrupt::Interrupt;
use crate::transcript::Turn;

use super::phase::TrialPhase;
use super::state::{PhaseTransition, Session};

/// Serializable snapshot of a session for export or review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub scenario_id: String,
    pub scenario_title: String,
    pub phase: TrialPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    pub turns: Vec<Turn>,
    pub interrupts: Vec<Interrupt>,
    /// Final report when frozen, otherwise a live snapshot.
    pub report: EvaluationReport,
    pub degraded_phases: Vec<TrialPhase>,
    pub transitions: Vec<PhaseTransition>,
}

impl SessionSummary {
    pub fn from_session(session: &Session, scenario_title: &str, max_pacing_wpm: f64) -> Self {
        let report = session
            .report
            .clone()
            .unwrap_or_else(|| session.evaluation.snapshot(max_pacing_wpm));
        Self {
            session_id: session.id.clone(),
            scenario_id: session.scenario_id.clone(),
            scenario_title: scenario_title.to_string(),
            phase: session.phase,
            close_reason: session.close_reason.clone(),
            created_at: session.created_at,
            closed_at: session.closed_at,
            turns: session.transcript.turns().to_vec(),
            interrupts: session.transcript.interrupts().to_vec(),
            report,
            degraded_phases: session.degraded_phases.clone(),
            transitions: session.transitions.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Compact summary line.
    pub fn summary_line(&self) -> String {
        let score = self
            .report
            .overall_score
            .map(|s| format!("{:.2}", s))
            .unwrap_or_else(|| "n/a".to_string());
        format!(
            "[{}] {} turns | {} interrupts | score={} | scenario={}",
            self.phase,
            self.turns.len(),
            self.interrupts.len(),
            score,
            self.scenario_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_fresh_session() {
        let session = Session::for_tests();
        let summary = SessionSummary::from_session(&session, "Unit", 180.0);
        assert!(summary.turns.is_empty());
        assert!(summary.report.overall_score.is_none());
        assert!(summary.summary_line().contains("score=n/a"));

        let json = summary.to_json_pretty().unwrap();
        assert!(json.contains("\"phase\": \"lobby\""));
    }
}
