//! Engine configuration.
//!
//! Every external call timeout is mandatory and comes from here. Values can
//! be loaded from a file via serde, or overridden through `TRIAL_*`
//! environment variables with [`EngineConfig::from_env`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::evaluation::CoachThresholds;
use crate::interrupt::JudgePolicy;
use crate::roles::Cast;

/// Configuration for a trial engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout for a single reasoning call (milliseconds).
    pub reasoning_timeout_ms: u64,
    /// Timeout for a single narration call (milliseconds).
    pub narration_timeout_ms: u64,
    /// Timeout for a judge ruling (milliseconds).
    pub judge_timeout_ms: u64,
    /// Maximum number of history lines handed to the reasoning service.
    pub context_turns: usize,
    /// Maximum total characters of history handed to the reasoning service.
    pub context_chars: usize,
    /// Utterances longer than this are treated as malformed.
    pub max_utterance_chars: usize,
    /// Bound on outstanding objections (pending + queued).
    pub objection_queue_capacity: usize,
    /// Move to the next phase automatically when the rotation is exhausted.
    pub auto_advance: bool,
    /// Skip a phase automatically once it is degraded.
    pub auto_skip_degraded: bool,
    /// Number of events retained in the in-memory journal.
    pub event_journal_capacity: usize,
    /// Coach thresholds.
    pub coach: CoachThresholds,
    /// Judge timing and decorum policy.
    pub judge: JudgePolicy,
    /// Standing cast (judge, counsel, coach).
    pub cast: Cast,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reasoning_timeout_ms: 20_000,
            narration_timeout_ms: 30_000,
            judge_timeout_ms: 15_000,
            context_turns: 12,
            context_chars: 4_000,
            max_utterance_chars: 1_200,
            objection_queue_capacity: 4,
            auto_advance: false,
            auto_skip_degraded: false,
            event_journal_capacity: 1_024,
            coach: CoachThresholds::default(),
            judge: JudgePolicy::default(),
            cast: Cast::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults with `TRIAL_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `TRIAL_*` environment overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Self {
        self.reasoning_timeout_ms = env_or("TRIAL_REASONING_TIMEOUT_MS", self.reasoning_timeout_ms);
        self.narration_timeout_ms = env_or("TRIAL_NARRATION_TIMEOUT_MS", self.narration_timeout_ms);
        self.judge_timeout_ms = env_or("TRIAL_JUDGE_TIMEOUT_MS", self.judge_timeout_ms);
        self.context_turns = env_or("TRIAL_CONTEXT_TURNS", self.context_turns);
        self.context_chars = env_or("TRIAL_CONTEXT_CHARS", self.context_chars);
        self.objection_queue_capacity =
            env_or("TRIAL_OBJECTION_QUEUE_CAPACITY", self.objection_queue_capacity);
        self.auto_advance = env_or("TRIAL_AUTO_ADVANCE", self.auto_advance);
        self.auto_skip_degraded = env_or("TRIAL_AUTO_SKIP_DEGRADED", self.auto_skip_degraded);
        self
    }

    pub fn reasoning_timeout(&self) -> Duration {
        Duration::from_millis(self.reasoning_timeout_ms)
    }

    pub fn narration_timeout(&self) -> Duration {
        Duration::from_millis(self.narration_timeout_ms)
    }

    pub fn judge_timeout(&self) -> Duration {
        Duration::from_millis(self.judge_timeout_ms)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
