//! Judge bench: objection rulings plus timing and decorum policy.
//!
//! The judge sits outside the rotation. For a blocking objection it is
//! invoked through the reasoning service with a strict response format;
//! anything that cannot be parsed after one retry is treated as overruled
//! so the trial keeps moving.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::evaluation::signals;
use crate::roles::{AgentProfile, CourtRole};
use crate::services::{GenerationRequest, ReasoningService, ServiceError};
use crate::session::TrialPhase;
use crate::transcript::Turn;

use super::types::{Interrupt, Verdict};

static VERDICT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\W*(sustained|overruled)\b").expect("valid verdict regex")
});

/// Judge timing and decorum policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgePolicy {
    /// Issue a timing reminder once a phase runs longer than this.
    pub phase_time_budget_secs: Option<u64>,
    /// Uppercase share at which a turn counts as shouting.
    pub decorum_caps_ratio: f64,
    /// Ignore short utterances when checking decorum.
    pub decorum_min_letters: usize,
}

impl Default for JudgePolicy {
    fn default() -> Self {
        Self {
            phase_time_budget_secs: None,
            decorum_caps_ratio: 0.7,
            decorum_min_letters: 12,
        }
    }
}

impl JudgePolicy {
    pub fn phase_time_budget(&self) -> Option<Duration> {
        self.phase_time_budget_secs.map(Duration::from_secs)
    }

    /// Timing reminder text once the phase has overrun its budget.
    pub fn timing_reminder(&self, phase: TrialPhase, elapsed: Duration) -> Option<String> {
        let budget = self.phase_time_budget()?;
        (elapsed > budget).then(|| {
            format!(
                "Counsel, the {} has run past its allotted {} minute(s). Please move along.",
                phase.title().to_lowercase(),
                budget.as_secs().div_ceil(60)
            )
        })
    }

    /// Decorum notice for a shouted utterance.
    pub fn decorum_notice(&self, turn: &Turn) -> Option<String> {
        if turn.speaker_role == CourtRole::Judge {
            return None;
        }
        let (ratio, letters) = signals::uppercase_ratio(&turn.content);
        (letters >= self.decorum_min_letters && ratio >= self.decorum_caps_ratio).then(|| {
            format!(
                "{}, you will maintain decorum in this courtroom. Lower your voice.",
                turn.speaker_name
            )
        })
    }
}

/// Outcome of asking the judge to rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Ruling {
    pub verdict: Verdict,
    pub text: String,
    /// No usable ruling was obtained; overruled was assumed.
    pub defaulted: bool,
}

/// Build the judge's ruling request for an objection.
pub fn ruling_request(
    session_id: &str,
    judge: &AgentProfile,
    phase: TrialPhase,
    objection: &Interrupt,
    target: &Turn,
    fact_context: Vec<String>,
    history: Vec<String>,
) -> GenerationRequest {
    let grounds = objection.payload.grounds.as_deref().unwrap_or("unspecified");
    let mut constraints = vec![
        format!(
            "The {} objects on the grounds of {} to this statement by {}: \"{}\"",
            objection.raised_by.title(),
            grounds,
            target.speaker_name,
            target.content
        ),
        "Rule on the objection. Begin your reply with exactly SUSTAINED or OVERRULED, \
         then give at most one sentence of explanation."
            .to_string(),
    ];
    if let Some(excerpt) = &objection.payload.excerpt {
        constraints.push(format!("The objection targets: \"{}\"", excerpt));
    }
    GenerationRequest {
        session_id: session_id.to_string(),
        phase,
        role: CourtRole::Judge,
        speaker_id: judge.agent_id.clone(),
        speaker_name: judge.display_name.clone(),
        persona: judge.persona.clone(),
        addressee: Some(objection.raised_by),
        fact_context,
        history,
        constraints,
    }
}

/// The SUSTAINED/OVERRULED keyword the reply opens with.
pub fn parse_verdict(text: &str) -> Option<Verdict> {
    let found = VERDICT_PATTERN.captures(text)?;
    match found[1].to_ascii_lowercase().as_str() {
        "sustained" => Some(Verdict::Sustained),
        "overruled" => Some(Verdict::Overruled),
        _ => None,
    }
}

/// Ask for a ruling, retrying once on timeout, error, or unparseable output.
pub async fn obtain_ruling(
    reasoning: &dyn ReasoningService,
    request: &GenerationRequest,
    timeout: Duration,
) -> Ruling {
    let mut last_problem = String::new();
    for attempt in 1..=2u32 {
        let result = match tokio::time::timeout(timeout, reasoning.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout {
                after_ms: timeout.as_millis() as u64,
            }),
        };
        match result {
            Ok(utterance) => match parse_verdict(&utterance.text) {
                Some(verdict) => {
                    debug!(attempt, %verdict, "Judge ruled");
                    return Ruling {
                        verdict,
                        text: utterance.text.trim().to_string(),
                        defaulted: false,
                    };
                }
                None => last_problem = format!("ambiguous ruling: {}", utterance.text.trim()),
            },
            Err(e) => last_problem = e.to_string(),
        }
        debug!(attempt, problem = %last_problem, "Judge ruling unusable");
    }
    warn!(problem = %last_problem, "No usable ruling, objection overruled by default");
    Ruling {
        verdict: Verdict::Overruled,
        text: "Overruled. Counsel may continue.".to_string(),
        defaulted: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Cast;
    use crate::services::testing::ScriptedReasoning;
    use crate::services::Utterance;

    fn target() -> Turn {
        Turn::new(
            5,
            TrialPhase::DirectExamination,
            CourtRole::Prosecutor,
            "prosecutor",
            "Prosecutor Lane",
            "Isn't it true you were drunk?",
        )
    }

    fn request() -> GenerationRequest {
        let objection = Interrupt::objection(CourtRole::Defense, 5, "leading", None);
        ruling_request(
            "s",
            &Cast::default().judge,
            TrialPhase::DirectExamination,
            &objection,
            &target(),
            vec![],
            vec![],
        )
    }

    #[test]
    fn test_parse_verdict() {
        assert_eq!(parse_verdict("SUSTAINED. Rephrase."), Some(Verdict::Sustained));
        assert_eq!(parse_verdict("  **Overruled.**"), Some(Verdict::Overruled));
        assert_eq!(parse_verdict("I'll allow it."), None);
        assert_eq!(
            parse_verdict("Overruled, though it is nearly sustained"),
            Some(Verdict::Overruled)
        );
    }

    #[test]
    fn test_verdict_must_open_the_reply() {
        assert_eq!(parse_verdict("Not sustained; overruled."), None);
        assert_eq!(parse_verdict("The objection is overruled."), None);
        assert_eq!(parse_verdict("Sustainedly speaking, no."), None);
    }

    #[tokio::test]
    async fn test_negated_verdict_is_retried() {
        let reasoning = ScriptedReasoning::with_replies(vec![
            Ok(Utterance::new("Not sustained; overruled.")),
            Ok(Utterance::new("Overruled. The witness may answer.")),
        ]);
        let ruling = obtain_ruling(&reasoning, &request(), Duration::from_secs(1)).await;
        assert_eq!(ruling.verdict, Verdict::Overruled);
        assert!(!ruling.defaulted);
        assert_eq!(reasoning.calls(), 2);
    }

    #[test]
    fn test_request_shape() {
        let req = request();
        assert_eq!(req.role, CourtRole::Judge);
        assert_eq!(req.addressee, Some(CourtRole::Defense));
        assert!(req.constraints[0].contains("leading"));
        assert!(req.constraints[1].contains("SUSTAINED or OVERRULED"));
    }

    #[tokio::test]
    async fn test_retry_after_ambiguous_reply() {
        let reasoning = ScriptedReasoning::with_replies(vec![
            Ok(Utterance::new("Hmm, let me think.")),
            Ok(Utterance::new("Sustained. Counsel will rephrase.")),
        ]);
        let ruling = obtain_ruling(&reasoning, &request(), Duration::from_secs(1)).await;
        assert_eq!(ruling.verdict, Verdict::Sustained);
        assert!(!ruling.defaulted);
        assert_eq!(reasoning.calls(), 2);
    }

    #[tokio::test]
    async fn test_defaults_to_overruled() {
        let reasoning = ScriptedReasoning::with_replies(vec![
            Err(ServiceError::Unavailable("down".into())),
            Ok(Utterance::new("No comment.")),
        ]);
        let ruling = obtain_ruling(&reasoning, &request(), Duration::from_secs(1)).await;
        assert_eq!(ruling.verdict, Verdict::Overruled);
        assert!(ruling.defaulted);
        assert_eq!(reasoning.calls(), 2);
    }

    #[test]
    fn test_decorum_notice() {
        let policy = JudgePolicy::default();
        let mut turn = target();
        assert!(policy.decorum_notice(&turn).is_none());
        turn.content = "THIS IS AN OUTRAGE, YOUR HONOR!".into();
        assert!(policy.decorum_notice(&turn).unwrap().contains("Prosecutor Lane"));
        turn.content = "NO!".into();
        assert!(policy.decorum_notice(&turn).is_none());
    }

    #[test]
    fn test_timing_reminder() {
        let policy = JudgePolicy {
            phase_time_budget_secs: Some(120),
            ..Default::default()
        };
        assert!(policy
            .timing_reminder(TrialPhase::Opening, Duration::from_secs(60))
            .is_none());
        let text = policy
            .timing_reminder(TrialPhase::Opening, Duration::from_secs(121))
            .unwrap();
        assert!(text.contains("2 minute(s)"));
        assert!(JudgePolicy::default()
            .timing_reminder(TrialPhase::Opening, Duration::from_secs(9999))
            .is_none());
    }
}
