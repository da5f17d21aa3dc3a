//! Coach policy: turns metric updates into coaching cues.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::record::{metrics, MetricUpdate};

/// Thresholds that trigger a coaching cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachThresholds {
    /// Speaking faster than this raises a pacing cue.
    pub max_pacing_wpm: f64,
    /// Clarity below this raises a clarity cue.
    pub min_clarity: f64,
    /// Tone below this raises a tone cue.
    pub min_tone: f64,
    /// Minimum turn distance between two cues on the same metric.
    pub cue_cooldown_turns: u64,
}

impl Default for CoachThresholds {
    fn default() -> Self {
        Self {
            max_pacing_wpm: 180.0,
            min_clarity: 0.5,
            min_tone: 0.5,
            cue_cooldown_turns: 3,
        }
    }
}

/// Watches metric updates and decides when the coach speaks up.
#[derive(Debug, Clone, Default)]
pub struct CoachPolicy {
    thresholds: CoachThresholds,
    last_cue_at: HashMap<&'static str, u64>,
}

impl CoachPolicy {
    pub fn new(thresholds: CoachThresholds) -> Self {
        Self {
            thresholds,
            last_cue_at: HashMap::new(),
        }
    }

    pub fn thresholds(&self) -> &CoachThresholds {
        &self.thresholds
    }

    /// Cue text for the first threshold breach not in cooldown.
    pub fn assess(&mut self, updates: &[MetricUpdate], sequence: u64) -> Option<String> {
        for update in updates {
            let Some((metric, text)) = self.breach(update) else {
                continue;
            };
            let cooling = self
                .last_cue_at
                .get(metric)
                .is_some_and(|&last| sequence < last + self.thresholds.cue_cooldown_turns);
            if cooling {
                continue;
            }
            self.last_cue_at.insert(metric, sequence);
            return Some(text);
        }
        None
    }

    fn breach(&self, update: &MetricUpdate) -> Option<(&'static str, String)> {
        let t = &self.thresholds;
        match update.metric.as_str() {
            metrics::PACING if update.value > t.max_pacing_wpm => Some((
                metrics::PACING,
                format!(
                    "Slow down: about {:.0} words per minute, aim for under {:.0}.",
                    update.value, t.max_pacing_wpm
                ),
            )),
            metrics::CLARITY if update.value < t.min_clarity => Some((
                metrics::CLARITY,
                "Shorten your questions. One fact per question keeps the witness pinned down."
                    .to_string(),
            )),
            metrics::TONE if update.value < t.min_tone => Some((
                metrics::TONE,
                "Watch your tone: drop the hedging and keep it respectful.".to_string(),
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(metric: &str, value: f64) -> MetricUpdate {
        MetricUpdate {
            metric: metric.to_string(),
            value,
            mean: value,
            count: 1,
            sequence: None,
        }
    }

    #[test]
    fn test_pacing_breach() {
        let mut coach = CoachPolicy::new(CoachThresholds::default());
        let cue = coach.assess(&[update(metrics::PACING, 240.0)], 2).unwrap();
        assert!(cue.contains("240"));
    }

    #[test]
    fn test_no_cue_within_thresholds() {
        let mut coach = CoachPolicy::new(CoachThresholds::default());
        let updates = [update(metrics::CLARITY, 0.9), update(metrics::TONE, 0.8)];
        assert!(coach.assess(&updates, 2).is_none());
    }

    #[test]
    fn test_cooldown_per_metric() {
        let mut coach = CoachPolicy::new(CoachThresholds::default());
        let low_tone = [update(metrics::TONE, 0.1)];
        assert!(coach.assess(&low_tone, 2).is_some());
        assert!(coach.assess(&low_tone, 4).is_none());
        // A different metric is not affected by the tone cooldown
        assert!(coach.assess(&[update(metrics::CLARITY, 0.1)], 4).is_some());
        assert!(coach.assess(&low_tone, 5).is_some());
    }
}
