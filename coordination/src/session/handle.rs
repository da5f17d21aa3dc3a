//! Cloneable handle for driving a session from other tasks.
//!
//! Calls are queued on an unbounded channel and applied by the engine at its
//! next suspension boundary, so a handle never races the control loop.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{TrialError, TrialResult};
use crate::interrupt::RulingKind;
use crate::roles::CourtRole;

/// A queued request for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    RaiseObjection {
        raised_by: CourtRole,
        grounds: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        excerpt: Option<String>,
    },
    CoachingCue {
        text: String,
    },
    IssueRuling {
        kind: RulingKind,
        text: String,
    },
    SubmitUtterance {
        text: String,
    },
    Pause,
    Resume,
    Abort {
        reason: String,
    },
    AdvancePhase,
    SkipDegradedPhase,
}

impl Command {
    /// Short name used in logs and warnings.
    pub fn name(&self) -> &'static str {
        match self {
            Command::RaiseObjection { .. } => "raise_objection",
            Command::CoachingCue { .. } => "coaching_cue",
            Command::IssueRuling { .. } => "issue_ruling",
            Command::SubmitUtterance { .. } => "submit_utterance",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Abort { .. } => "abort",
            Command::AdvancePhase => "advance_phase",
            Command::SkipDegradedPhase => "skip_degraded_phase",
        }
    }
}

/// Send-able, cloneable handle to one session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: String,
    sender: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub(crate) fn new(
        session_id: String,
        sender: mpsc::UnboundedSender<Command>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            sender,
            cancel,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether the session has been aborted or closed.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Queue a raw command.
    pub fn send(&self, command: Command) -> TrialResult<()> {
        self.sender
            .send(command)
            .map_err(|_| TrialError::closed(&self.session_id))
    }

    pub fn raise_objection(
        &self,
        raised_by: CourtRole,
        grounds: impl Into<String>,
        excerpt: Option<String>,
    ) -> TrialResult<()> {
        self.send(Command::RaiseObjection {
            raised_by,
            grounds: grounds.into(),
            excerpt,
        })
    }

    pub fn coaching_cue(&self, text: impl Into<String>) -> TrialResult<()> {
        self.send(Command::CoachingCue { text: text.into() })
    }

    pub fn issue_ruling(&self, kind: RulingKind, text: impl Into<String>) -> TrialResult<()> {
        self.send(Command::IssueRuling {
            kind,
            text: text.into(),
        })
    }

    pub fn submit_user_utterance(&self, text: impl Into<String>) -> TrialResult<()> {
        self.send(Command::SubmitUtterance { text: text.into() })
    }

    pub fn pause(&self) -> TrialResult<()> {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> TrialResult<()> {
        self.send(Command::Resume)
    }

    pub fn advance_phase(&self) -> TrialResult<()> {
        self.send(Command::AdvancePhase)
    }

    pub fn skip_degraded_phase(&self) -> TrialResult<()> {
        self.send(Command::SkipDegradedPhase)
    }

    /// Abort the session. Any in-flight external call is abandoned and its
    /// result discarded.
    pub fn abort(&self, reason: impl Into<String>) -> TrialResult<()> {
        self.cancel.cancel();
        self.send(Command::Abort {
            reason: reason.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_are_queued_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = SessionHandle::new("s-1".into(), tx, CancellationToken::new());

        handle.pause().unwrap();
        handle
            .raise_objection(CourtRole::Defense, "hearsay", None)
            .unwrap();

        assert_eq!(rx.try_recv().unwrap(), Command::Pause);
        assert_eq!(rx.try_recv().unwrap().name(), "raise_objection");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_abort_cancels_token() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = SessionHandle::new("s-1".into(), tx, cancel.clone());

        handle.abort("user quit").unwrap();
        assert!(cancel.is_cancelled());
        assert!(handle.clone().is_cancelled());
    }

    #[test]
    fn test_send_after_engine_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle::new("s-1".into(), tx, CancellationToken::new());
        drop(rx);

        let err = handle.pause().unwrap_err();
        assert!(matches!(err, TrialError::SessionClosed { .. }));
    }

    #[test]
    fn test_command_serialization() {
        let json = serde_json::to_value(Command::IssueRuling {
            kind: RulingKind::General,
            text: "Approach the bench.".into(),
        })
        .unwrap();
        assert_eq!(json["command"], "issue_ruling");
    }
}
