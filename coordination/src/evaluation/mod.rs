//! Evaluation: streaming scoring of the user's performance.
//!
//! ```text
//! turn appended ──▶ clarity, tone ─┐
//! narration done ──▶ pacing ───────┤
//! objection ruled ──▶ counts ──────┼──▶ EvaluationRecord ──▶ CoachPolicy ──▶ cue
//! cue granted ──▶ coaching_cues ───┘          │
//!                                             ▼
//!                                     EvaluationReport
//! ```
//!
//! The scheduler never reads this record. Failures are logged and skipped.

pub mod coach;
pub mod record;
pub mod signals;

pub use coach::{CoachPolicy, CoachThresholds};
pub use record::{
    metrics, EvaluationError, EvaluationRecord, EvaluationReport, MetricAggregate, MetricUpdate,
};
