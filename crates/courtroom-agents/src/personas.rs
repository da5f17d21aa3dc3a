//! Prompt assembly and default voices for the courtroom cast.
//!
//! The core hands adapters a [`GenerationRequest`]; this module turns it
//! into the system/user message pair a chat-completions model expects.

use trial_coordination::{Cast, CourtRole, GenerationRequest};

/// Stock ElevenLabs voice ids.
pub mod voices {
    /// "Adam": deep and authoritative.
    pub const ADAM: &str = "pNInz6obpgDQGcFmaJgB";
    /// "Rachel": calm and professional.
    pub const RACHEL: &str = "21m00Tcm4TlvDq8ikWAM";
    /// "Domi": neutral.
    pub const DOMI: &str = "AZnzlk1XvdvUeBnXmlld";
}

/// Default voice for a role. The user's own counsel role has none.
pub fn default_voice(role: CourtRole) -> Option<&'static str> {
    match role {
        CourtRole::Judge => Some(voices::ADAM),
        CourtRole::Prosecutor | CourtRole::Coach => Some(voices::RACHEL),
        CourtRole::Witness => Some(voices::DOMI),
        CourtRole::Defense => None,
    }
}

/// Fill in default voices for cast members that have none configured.
pub fn voiced_cast(mut cast: Cast) -> Cast {
    for profile in [
        &mut cast.judge,
        &mut cast.prosecutor,
        &mut cast.defense,
        &mut cast.coach,
    ] {
        if profile.voice_id.is_none() {
            profile.voice_id = default_voice(profile.role).map(str::to_string);
        }
    }
    cast
}

/// System prompt: who the model is and how it must behave.
pub fn system_prompt(request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "You are {}, the {} in a courtroom rehearsal.\nYour persona: {}\n\
         Maintain courtroom decorum and professionalism.\n\
         Respond concisely and stay in character. Speak only for yourself.",
        request.speaker_name,
        request.role.title().to_lowercase(),
        request.persona.trim()
    );
    if let Some(addressee) = request.addressee {
        prompt.push_str(&format!(
            "\nYou are addressing the {}.",
            addressee.title().to_lowercase()
        ));
    }
    prompt
}

/// User message: case context, recent dialogue and any constraints.
pub fn user_prompt(request: &GenerationRequest) -> String {
    let mut sections = Vec::new();
    if !request.fact_context.is_empty() {
        sections.push(request.fact_context.join("\n"));
    }
    if !request.constraints.is_empty() {
        sections.push(
            request
                .constraints
                .iter()
                .map(|c| format!("- {}", c))
                .collect::<Vec<_>>()
                .join("\n"),
        );
    }
    if request.history.is_empty() {
        sections.push(format!(
            "The {} is about to begin. Begin your statement:",
            request.phase.title().to_lowercase()
        ));
    } else {
        sections.push(format!(
            "Previous dialogue:\n{}\n\nYour response:",
            request.history.join("\n")
        ));
    }
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use trial_coordination::TrialPhase;

    fn request() -> GenerationRequest {
        GenerationRequest {
            session_id: "s-1".into(),
            phase: TrialPhase::CrossExamination,
            role: CourtRole::Prosecutor,
            speaker_id: "prosecutor".into(),
            speaker_name: "Prosecutor Lane".into(),
            persona: "Sharp and methodical.".into(),
            addressee: Some(CourtRole::Witness),
            fact_context: vec!["Fact: The alarm sounded at 9:05pm.".into()],
            history: vec![],
            constraints: vec![],
        }
    }

    #[test]
    fn test_system_prompt_names_role_and_addressee() {
        let prompt = system_prompt(&request());
        assert!(prompt.starts_with("You are Prosecutor Lane, the prosecutor"));
        assert!(prompt.contains("Sharp and methodical."));
        assert!(prompt.ends_with("You are addressing the witness."));
    }

    #[test]
    fn test_user_prompt_without_history_opens_phase() {
        let prompt = user_prompt(&request());
        assert!(prompt.starts_with("Fact: The alarm"));
        assert!(prompt.ends_with("Begin your statement:"));
    }

    #[test]
    fn test_user_prompt_lists_constraints_and_history() {
        let mut req = request();
        req.history = vec!["Witness Kim: I was at the counter.".into()];
        req.constraints = vec!["Ask one question at a time.".into()];
        let prompt = user_prompt(&req);
        assert!(prompt.contains("- Ask one question at a time."));
        assert!(prompt.contains("Previous dialogue:\nWitness Kim: I was at the counter."));
        assert!(prompt.ends_with("Your response:"));
    }

    #[test]
    fn test_voiced_cast_keeps_configured_voices() {
        let mut cast = Cast::default();
        cast.judge.voice_id = Some("custom".into());
        let cast = voiced_cast(cast);
        assert_eq!(cast.judge.voice_id.as_deref(), Some("custom"));
        assert_eq!(cast.prosecutor.voice_id.as_deref(), Some(voices::RACHEL));
        assert!(cast.defense.voice_id.is_none());
    }
}
