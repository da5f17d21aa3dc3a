//! Console transport: renders trial events and parses typed input.

use std::sync::LazyLock;

use regex::Regex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use trial_coordination::{
    Command, CourtRole, InterruptKind, Resolution, RulingKind, SequencedEvent, TrialEvent,
};

static SLASH_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([a-z]+)(?:\s+(.*))?$").expect("valid slash command regex")
});

pub const HELP: &str = "\
Type a line to speak it as defense counsel on your next turn.
  /object <grounds> [:: excerpt]   object to the latest turn
  /pause  /resume                  pause or resume the trial
  /next                            advance once the phase is exhausted
  /skip                            skip a degraded phase
  /note <text>                     record a ruling from the bench
  /abort [reason]                  end the session
  /help                            show this help";

/// One parsed line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Command(Command),
    Help,
    Empty,
    /// Unrecognised slash command, with an explanation.
    Invalid(String),
}

pub fn parse_input(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Empty;
    }
    if !line.starts_with('/') {
        return ConsoleInput::Command(Command::SubmitUtterance {
            text: line.to_string(),
        });
    }

    let Some(caps) = SLASH_COMMAND.captures(line) else {
        return ConsoleInput::Invalid(format!("cannot parse '{}'", line));
    };
    let arg = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
    let command = match &caps[1] {
        "object" => {
            if arg.is_empty() {
                return ConsoleInput::Invalid("/object needs grounds".to_string());
            }
            let (grounds, excerpt) = match arg.split_once("::") {
                Some((grounds, excerpt)) => (
                    grounds.trim().to_string(),
                    Some(excerpt.trim().to_string()).filter(|e| !e.is_empty()),
                ),
                None => (arg.to_string(), None),
            };
            Command::RaiseObjection {
                raised_by: CourtRole::Defense,
                grounds,
                excerpt,
            }
        }
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "next" => Command::AdvancePhase,
        "skip" => Command::SkipDegradedPhase,
        "note" if !arg.is_empty() => Command::IssueRuling {
            kind: RulingKind::General,
            text: arg.to_string(),
        },
        "abort" => Command::Abort {
            reason: if arg.is_empty() {
                "aborted by user".to_string()
            } else {
                arg.to_string()
            },
        },
        "help" => return ConsoleInput::Help,
        other => return ConsoleInput::Invalid(format!("unknown command /{}", other)),
    };
    ConsoleInput::Command(command)
}

/// Console line for an event, or `None` for events not worth showing.
pub fn render(event: &TrialEvent) -> Option<String> {
    let body = match event {
        TrialEvent::PhaseChanged { to, reason, .. } => {
            format!("── {} ── ({})", to.title(), reason)
        }
        TrialEvent::TurnAppended {
            sequence,
            speaker_role,
            content,
            user_authored,
            ..
        } => {
            let who = if *user_authored {
                "You".to_string()
            } else {
                speaker_role.title().to_string()
            };
            format!("[#{}] {}: {}", sequence, who, content)
        }
        TrialEvent::TurnRegenerated {
            sequence,
            content,
            stricken,
            ..
        } => {
            if *stricken {
                format!("[#{}] (stricken) {}", sequence, content)
            } else {
                format!("[#{}] (restated) {}", sequence, content)
            }
        }
        TrialEvent::InterruptRaised {
            kind,
            raised_by,
            text,
            ..
        } => match kind {
            InterruptKind::Objection => format!("OBJECTION by {}: {}", raised_by.title(), text),
            InterruptKind::CoachingCue => format!("Coach: {}", text),
            InterruptKind::Ruling => format!("THE COURT: {}", text),
        },
        TrialEvent::InterruptResolved {
            kind: InterruptKind::Objection,
            resolution,
            ruling,
            ..
        } => {
            let verdict = match resolution {
                Resolution::Granted => "Sustained",
                Resolution::Denied => "Overruled",
                Resolution::Dismissed => "Objection dismissed",
                _ => return None,
            };
            match ruling.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                Some(text) => format!("THE COURT: {}", text),
                None => format!("THE COURT: {}.", verdict),
            }
        }
        TrialEvent::Warning { code, message, .. } => format!("! {}: {}", code, message),
        TrialEvent::SessionPaused { .. } => "(paused)".to_string(),
        TrialEvent::SessionResumed { .. } => "(resumed)".to_string(),
        TrialEvent::SessionClosed { reason, turns, .. } => {
            format!("Session closed: {} after {} turn(s)", reason, turns)
        }
        _ => return None,
    };
    Some(format!("{} {}", event.timestamp().format("%H:%M:%S"), body))
}

/// Print events until the session closes or `cancel` fires.
pub async fn follow(mut events: broadcast::Receiver<SequencedEvent>, cancel: CancellationToken) {
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = events.recv() => received,
        };
        match received {
            Ok(sequenced) => {
                if let Some(line) = render(&sequenced.event) {
                    println!("{}", line);
                }
                if matches!(sequenced.event, TrialEvent::SessionClosed { .. }) {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Console fell behind the event stream");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Cancel the printer task and wait for it. Returns `false` when the task
/// panicked or was aborted; the failure is logged, not propagated.
pub async fn stop(printer: JoinHandle<()>, cancel: &CancellationToken) -> bool {
    cancel.cancel();
    match printer.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Console printer failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use trial_coordination::{CloseReason, TrialPhase};

    #[test]
    fn test_plain_text_is_an_utterance() {
        assert_eq!(
            parse_input("  Isn't it true you wear glasses?  "),
            ConsoleInput::Command(Command::SubmitUtterance {
                text: "Isn't it true you wear glasses?".into()
            })
        );
        assert_eq!(parse_input("   "), ConsoleInput::Empty);
    }

    #[test]
    fn test_object_with_excerpt() {
        let input = parse_input("/object hearsay :: the officer told me");
        assert_eq!(
            input,
            ConsoleInput::Command(Command::RaiseObjection {
                raised_by: CourtRole::Defense,
                grounds: "hearsay".into(),
                excerpt: Some("the officer told me".into()),
            })
        );
        assert!(matches!(parse_input("/object"), ConsoleInput::Invalid(_)));
    }

    #[test]
    fn test_control_commands() {
        assert_eq!(parse_input("/pause"), ConsoleInput::Command(Command::Pause));
        assert_eq!(
            parse_input("/skip"),
            ConsoleInput::Command(Command::SkipDegradedPhase)
        );
        assert_eq!(
            parse_input("/abort"),
            ConsoleInput::Command(Command::Abort {
                reason: "aborted by user".into()
            })
        );
        assert_eq!(parse_input("/help"), ConsoleInput::Help);
        assert!(matches!(parse_input("/dance"), ConsoleInput::Invalid(_)));
    }

    #[test]
    fn test_render_turn_and_close() {
        let turn = TrialEvent::TurnAppended {
            session_id: "s".into(),
            sequence: 4,
            phase: TrialPhase::CrossExamination,
            speaker_role: CourtRole::Defense,
            speaker_id: "defense".into(),
            content: "You didn't see a face, did you?".into(),
            user_authored: true,
            timestamp: Utc::now(),
        };
        assert!(render(&turn)
            .unwrap()
            .ends_with("[#4] You: You didn't see a face, did you?"));

        let closed = TrialEvent::SessionClosed {
            session_id: "s".into(),
            reason: CloseReason::Completed,
            turns: 12,
            timestamp: Utc::now(),
        };
        assert!(render(&closed).unwrap().contains("completed after 12 turn(s)"));
    }

    #[test]
    fn test_render_skips_metric_updates() {
        let update = TrialEvent::EvaluationUpdated {
            session_id: "s".into(),
            metric: "clarity".into(),
            value: 0.9,
            mean: 0.9,
            count: 1,
            sequence: Some(2),
            timestamp: Utc::now(),
        };
        assert!(render(&update).is_none());
    }

    #[tokio::test]
    async fn test_stop_ends_follower() {
        let (tx, rx) = broadcast::channel(8);
        let cancel = CancellationToken::new();
        let printer = tokio::spawn(follow(rx, cancel.clone()));
        assert!(stop(printer, &cancel).await);
        assert!(cancel.is_cancelled());
        drop(tx);
    }

    #[tokio::test]
    async fn test_stop_reports_failed_printer() {
        let cancel = CancellationToken::new();
        let printer = tokio::spawn(async { panic!("stdout closed") });
        assert!(!stop(printer, &cancel).await);
    }
}
