//! Courtroom roles, agent profiles, and per-participant runtime status.
//!
//! Every role shares one capability (produce an utterance through the
//! reasoning service). Roles differ only in persona data and rotation
//! membership, so a profile is plain configuration.

use serde::{Deserialize, Serialize};

/// Role an agent plays in the courtroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourtRole {
    /// Presides, rules on objections, issues timing and decorum notices.
    Judge,
    /// Counsel for the state.
    Prosecutor,
    /// Counsel for the defendant. Played by the human user.
    Defense,
    /// Testifies under direct and cross examination.
    Witness,
    /// Watches the user's performance and raises cues.
    Coach,
}

impl CourtRole {
    /// All roles in display order.
    pub const ALL: [CourtRole; 5] = [
        Self::Judge,
        Self::Prosecutor,
        Self::Defense,
        Self::Witness,
        Self::Coach,
    ];

    /// Whether this role is counsel (may raise objections).
    pub fn is_counsel(self) -> bool {
        matches!(self, Self::Prosecutor | Self::Defense)
    }

    /// The other side's counsel.
    pub fn opposing_counsel(self) -> Option<CourtRole> {
        match self {
            Self::Prosecutor => Some(Self::Defense),
            Self::Defense => Some(Self::Prosecutor),
            _ => None,
        }
    }

    /// Human-facing title.
    pub fn title(self) -> &'static str {
        match self {
            Self::Judge => "Judge",
            Self::Prosecutor => "Prosecutor",
            Self::Defense => "Defense Attorney",
            Self::Witness => "Witness",
            Self::Coach => "Coach",
        }
    }
}

impl std::fmt::Display for CourtRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Judge => write!(f, "judge"),
            Self::Prosecutor => write!(f, "prosecutor"),
            Self::Defense => write!(f, "defense"),
            Self::Witness => write!(f, "witness"),
            Self::Coach => write!(f, "coach"),
        }
    }
}

/// Runtime status of a participant within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Speaking,
    /// Was speaking when the session paused or an objection went pending.
    OnHold,
    Finished,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Speaking => write!(f, "speaking"),
            Self::OnHold => write!(f, "on_hold"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Configured identity of one courtroom agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Stable agent identifier, unique within a session.
    pub agent_id: String,
    /// Role this agent plays.
    pub role: CourtRole,
    /// Name shown in the transcript.
    pub display_name: String,
    /// Persona text handed to the reasoning service.
    pub persona: String,
    /// Voice used by the narration service, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

impl AgentProfile {
    /// Create a profile without a voice.
    pub fn new(
        agent_id: impl Into<String>,
        role: CourtRole,
        display_name: impl Into<String>,
        persona: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            role,
            display_name: display_name.into(),
            persona: persona.into(),
            voice_id: None,
        }
    }

    /// Attach a narration voice.
    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }
}

/// Standing cast for the non-witness roles.
///
/// Witnesses come from the scenario; everyone else is configured here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cast {
    pub judge: AgentProfile,
    pub prosecutor: AgentProfile,
    pub defense: AgentProfile,
    pub coach: AgentProfile,
}

impl Cast {
    /// Profiles in participant order.
    pub fn profiles(&self) -> [&AgentProfile; 4] {
        [&self.judge, &self.prosecutor, &self.defense, &self.coach]
    }

    /// Whether any standing agent uses this id.
    pub fn uses_id(&self, agent_id: &str) -> bool {
        self.profiles().iter().any(|p| p.agent_id == agent_id)
    }
}

impl Default for Cast {
    fn default() -> Self {
        Self {
            judge: AgentProfile::new(
                "judge",
                CourtRole::Judge,
                "Judge Harper",
                "You are a presiding judge, maintaining order and ensuring proper legal procedure.",
            ),
            prosecutor: AgentProfile::new(
                "prosecutor",
                CourtRole::Prosecutor,
                "Prosecutor Lane",
                "You are a prosecutor presenting the case against the defendant. \
                 Present evidence clearly and persuasively.",
            ),
            defense: AgentProfile::new(
                "defense",
                CourtRole::Defense,
                "Defense Counsel",
                "You are a defense attorney representing the defendant. \
                 Present a strong, logical defense.",
            ),
            coach: AgentProfile::new(
                "coach",
                CourtRole::Coach,
                "Trial Coach",
                "You are a trial advocacy coach. Give brief, specific feedback on tone, \
                 clarity, objection timing and pacing.",
            ),
        }
    }
}

/// A session participant: profile plus runtime status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub profile: AgentProfile,
    pub status: AgentStatus,
}

impl Participant {
    pub fn new(profile: AgentProfile) -> Self {
        Self {
            profile,
            status: AgentStatus::Active,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.profile.agent_id
    }

    pub fn role(&self) -> CourtRole {
        self.profile.role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counsel_roles() {
        assert!(CourtRole::Prosecutor.is_counsel());
        assert!(CourtRole::Defense.is_counsel());
        assert!(!CourtRole::Witness.is_counsel());
        assert!(!CourtRole::Judge.is_counsel());
        assert_eq!(
            CourtRole::Defense.opposing_counsel(),
            Some(CourtRole::Prosecutor)
        );
        assert_eq!(CourtRole::Coach.opposing_counsel(), None);
    }

    #[test]
    fn test_default_cast_ids_are_distinct() {
        let cast = Cast::default();
        let mut ids: Vec<_> = cast.profiles().iter().map(|p| p.agent_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        assert!(cast.uses_id("judge"));
        assert!(!cast.uses_id("w-1"));
    }

    #[test]
    fn test_role_serde_snake_case() {
        let json = serde_json::to_string(&CourtRole::Prosecutor).unwrap();
        assert_eq!(json, "\"prosecutor\"");
        let status: AgentStatus = serde_json::from_str("\"on_hold\"").unwrap();
        assert_eq!(status, AgentStatus::OnHold);
    }
}
