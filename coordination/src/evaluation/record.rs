//! Streaming evaluation record: running mean and count per metric.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::interrupt::{Interrupt, InterruptKind, Verdict};
use crate::roles::CourtRole;
use crate::transcript::Turn;

use super::signals;

/// Metric names.
pub mod metrics {
    pub const CLARITY: &str = "clarity";
    pub const TONE: &str = "tone";
    pub const PACING: &str = "pacing";
    pub const OBJECTION_TIMING: &str = "objection_timing";
    pub const OBJECTIONS_SUSTAINED: &str = "objections_sustained";
    pub const OBJECTIONS_OVERRULED: &str = "objections_overruled";
    pub const COACHING_CUES: &str = "coaching_cues";
}

/// Why a signal was not aggregated
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvaluationError {
    #[error("Metric {metric} received non-finite value {value}")]
    NonFinite { metric: String, value: f64 },

    #[error("Evaluation is finalized; {metric} ignored")]
    Finalized { metric: String },
}

/// Running aggregate for one metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricAggregate {
    pub count: u64,
    pub mean: f64,
    pub last: f64,
    /// Turns that contributed, in observation order.
    pub supporting_turns: Vec<u64>,
}

impl MetricAggregate {
    fn observe(&mut self, value: f64, turn: Option<u64>) {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
        self.last = value;
        if let Some(seq) = turn {
            if self.supporting_turns.last() != Some(&seq) {
                self.supporting_turns.push(seq);
            }
        }
    }
}

/// One successful aggregation, reported on the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricUpdate {
    pub metric: String,
    pub value: f64,
    pub mean: f64,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

/// Final scoring snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics: BTreeMap<String, MetricAggregate>,
    /// Mean of the normalized clarity, tone, pacing and timing scores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,
    pub skipped_signals: u32,
    pub finalized_at: DateTime<Utc>,
}

/// Aggregated scoring signals for a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationRecord {
    metrics: BTreeMap<String, MetricAggregate>,
    skipped: u32,
    finalized: bool,
}

impl EvaluationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one value into a metric.
    pub fn record(
        &mut self,
        metric: &str,
        value: f64,
        turn: Option<u64>,
    ) -> Result<MetricUpdate, EvaluationError> {
        if self.finalized {
            return Err(EvaluationError::Finalized {
                metric: metric.to_string(),
            });
        }
        if !value.is_finite() {
            return Err(EvaluationError::NonFinite {
                metric: metric.to_string(),
                value,
            });
        }
        let aggregate = self.metrics.entry(metric.to_string()).or_default();
        aggregate.observe(value, turn);
        debug!(metric, value, mean = aggregate.mean, "Metric updated");
        Ok(MetricUpdate {
            metric: metric.to_string(),
            value,
            mean: aggregate.mean,
            count: aggregate.count,
            sequence: turn,
        })
    }

    /// Record and swallow failures. Aggregation never blocks the trial.
    fn record_lenient(&mut self, metric: &str, value: f64, turn: Option<u64>) -> Option<MetricUpdate> {
        match self.record(metric, value, turn) {
            Ok(update) => Some(update),
            Err(e) => {
                self.skipped += 1;
                warn!(metric, error = %e, "Evaluation signal skipped");
                None
            }
        }
    }

    /// Score a freshly appended turn. Only the user's (defense) turns count.
    pub fn ingest_turn(&mut self, turn: &Turn) -> Vec<MetricUpdate> {
        if turn.speaker_role != CourtRole::Defense {
            return Vec::new();
        }
        let seq = Some(turn.sequence);
        let mut updates = Vec::new();
        if let Some(clarity) = signals::clarity_score(&turn.content) {
            updates.extend(self.record_lenient(metrics::CLARITY, clarity, seq));
        }
        if let Some(tone) = signals::tone_score(&turn.content) {
            updates.extend(self.record_lenient(metrics::TONE, tone, seq));
        }
        updates
    }

    /// Score pacing once a defense turn has actually been spoken.
    pub fn ingest_narration(&mut self, turn: &Turn) -> Vec<MetricUpdate> {
        if turn.speaker_role != CourtRole::Defense || turn.text_fallback {
            return Vec::new();
        }
        let Some(duration_ms) = turn.narration_ms else {
            return Vec::new();
        };
        match signals::pacing_wpm(turn.word_count(), duration_ms) {
            Some(wpm) => self
                .record_lenient(metrics::PACING, wpm, Some(turn.sequence))
                .into_iter()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Count a granted coaching cue.
    pub fn ingest_cue(&mut self, cue: &Interrupt) -> Vec<MetricUpdate> {
        if cue.kind != InterruptKind::CoachingCue {
            return Vec::new();
        }
        self.record_lenient(metrics::COACHING_CUES, 1.0, cue.target_sequence)
            .into_iter()
            .collect()
    }

    /// Score how promptly a defense objection was raised.
    ///
    /// Objecting before the target turn was narrated scores full marks.
    pub fn ingest_objection_timing(
        &mut self,
        objection: &Interrupt,
        before_narration: bool,
    ) -> Vec<MetricUpdate> {
        if objection.raised_by != CourtRole::Defense {
            return Vec::new();
        }
        let value = if before_narration { 1.0 } else { 0.5 };
        self.record_lenient(metrics::OBJECTION_TIMING, value, objection.target_sequence)
            .into_iter()
            .collect()
    }

    /// Count a ruled objection.
    pub fn ingest_verdict(&mut self, objection: &Interrupt, verdict: Verdict) -> Vec<MetricUpdate> {
        let metric = match verdict {
            Verdict::Sustained => metrics::OBJECTIONS_SUSTAINED,
            Verdict::Overruled => metrics::OBJECTIONS_OVERRULED,
        };
        self.record_lenient(metric, 1.0, objection.target_sequence)
            .into_iter()
            .collect()
    }

    pub fn get(&self, metric: &str) -> Option<&MetricAggregate> {
        self.metrics.get(metric)
    }

    pub fn count(&self, metric: &str) -> u64 {
        self.get(metric).map(|m| m.count).unwrap_or(0)
    }

    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Current snapshot without freezing the record.
    pub fn snapshot(&self, max_pacing_wpm: f64) -> EvaluationReport {
        let normalized: Vec<f64> = [
            self.get(metrics::CLARITY).map(|m| m.mean),
            self.get(metrics::TONE).map(|m| m.mean),
            self.get(metrics::PACING)
                .map(|m| signals::pacing_score(m.mean, max_pacing_wpm)),
            self.get(metrics::OBJECTION_TIMING).map(|m| m.mean),
        ]
        .into_iter()
        .flatten()
        .collect();
        let overall_score = if normalized.is_empty() {
            None
        } else {
            Some(normalized.iter().sum::<f64>() / normalized.len() as f64)
        };
        EvaluationReport {
            metrics: self.metrics.clone(),
            overall_score,
            skipped_signals: self.skipped,
            finalized_at: Utc::now(),
        }
    }

    /// Freeze the record and produce the final report. Idempotent.
    pub fn finalize(&mut self, max_pacing_wpm: f64) -> EvaluationReport {
        self.finalized = true;
        self.snapshot(max_pacing_wpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TrialPhase;

    fn defense_turn(seq: u64, text: &str) -> Turn {
        Turn::new(seq, TrialPhase::Opening, CourtRole::Defense, "defense", "Defense", text)
    }

    #[test]
    fn test_running_mean() {
        let mut record = EvaluationRecord::new();
        record.record("m", 1.0, Some(1)).unwrap();
        record.record("m", 0.0, Some(2)).unwrap();
        let update = record.record("m", 0.5, Some(3)).unwrap();
        assert_eq!(update.count, 3);
        assert!((update.mean - 0.5).abs() < 1e-9);
        assert_eq!(record.get("m").unwrap().supporting_turns, vec![1, 2, 3]);
    }

    #[test]
    fn test_non_finite_is_skipped() {
        let mut record = EvaluationRecord::new();
        assert!(record.record_lenient("m", f64::NAN, None).is_none());
        assert!(record.record_lenient("m", f64::INFINITY, None).is_none());
        assert_eq!(record.skipped(), 2);
        assert!(record.get("m").is_none());
    }

    #[test]
    fn test_only_defense_turns_scored() {
        let mut record = EvaluationRecord::new();
        let mut prosecution = defense_turn(1, "Clear question?");
        prosecution.speaker_role = CourtRole::Prosecutor;
        assert!(record.ingest_turn(&prosecution).is_empty());

        let updates = record.ingest_turn(&defense_turn(2, "Where were you at nine?"));
        let names: Vec<_> = updates.iter().map(|u| u.metric.as_str()).collect();
        assert_eq!(names, vec![metrics::CLARITY, metrics::TONE]);
    }

    #[test]
    fn test_pacing_requires_audio() {
        let mut record = EvaluationRecord::new();
        let mut turn = defense_turn(1, &"word ".repeat(30));
        turn.narration_ms = Some(6_000);
        let updates = record.ingest_narration(&turn);
        assert_eq!(updates[0].value, 300.0);

        turn.text_fallback = true;
        assert!(record.ingest_narration(&turn).is_empty());
    }

    #[test]
    fn test_verdict_counts() {
        let mut record = EvaluationRecord::new();
        let obj = Interrupt::objection(CourtRole::Defense, 5, "leading", None);
        record.ingest_verdict(&obj, Verdict::Sustained);
        record.ingest_verdict(&obj, Verdict::Overruled);
        record.ingest_verdict(&obj, Verdict::Sustained);
        assert_eq!(record.count(metrics::OBJECTIONS_SUSTAINED), 2);
        assert_eq!(record.count(metrics::OBJECTIONS_OVERRULED), 1);
    }

    #[test]
    fn test_objection_timing_only_for_defense() {
        let mut record = EvaluationRecord::new();
        let prosecution = Interrupt::objection(CourtRole::Prosecutor, 2, "relevance", None);
        assert!(record.ingest_objection_timing(&prosecution, true).is_empty());
        let defense = Interrupt::objection(CourtRole::Defense, 3, "hearsay", None);
        assert_eq!(record.ingest_objection_timing(&defense, false)[0].value, 0.5);
    }

    #[test]
    fn test_finalize_freezes_record() {
        let mut record = EvaluationRecord::new();
        record.record(metrics::CLARITY, 0.8, Some(1)).unwrap();
        record.record(metrics::TONE, 0.6, Some(1)).unwrap();
        let report = record.finalize(180.0);
        assert!((report.overall_score.unwrap() - 0.7).abs() < 1e-9);
        assert!(matches!(
            record.record(metrics::CLARITY, 1.0, None),
            Err(EvaluationError::Finalized { .. })
        ));
    }
}
