//! Scenario blueprint: facts, witnesses, evidence and pacing parameters.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{TrialError, TrialResult};
use crate::roles::{AgentProfile, CourtRole};
use crate::session::TrialPhase;

/// Which side called a witness or offered an exhibit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Prosecution,
    Defense,
}

impl Side {
    /// Counsel role that represents this side.
    pub fn counsel(self) -> CourtRole {
        match self {
            Self::Prosecution => CourtRole::Prosecutor,
            Self::Defense => CourtRole::Defense,
        }
    }
}

/// A witness available for examination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WitnessProfile {
    /// Identifier, also used as the witness agent id.
    pub id: String,
    pub name: String,
    /// Side that calls this witness on direct.
    pub called_by: Side,
    /// Persona text for the reasoning service.
    #[serde(default)]
    pub persona: String,
    /// What the witness knows. Bounds the facts a witness may testify to.
    #[serde(default)]
    pub statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

impl WitnessProfile {
    /// Agent profile for this witness.
    pub fn agent_profile(&self) -> AgentProfile {
        let persona = if self.persona.trim().is_empty() {
            "You are a witness testifying in court. Answer questions truthfully and clearly."
                .to_string()
        } else {
            self.persona.clone()
        };
        let profile = AgentProfile::new(&self.id, CourtRole::Witness, &self.name, persona);
        match &self.voice_id {
            Some(voice) => profile.with_voice(voice),
            None => profile,
        }
    }
}

/// An exhibit in the case file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offered_by: Option<Side>,
}

/// Upper bound on exchanges for any single phase.
pub const MAX_EXCHANGES: u32 = 50;

/// Number of exchanges (full rotation passes) per phase.
///
/// For examination phases the count applies per witness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseExchanges {
    pub opening: u32,
    pub direct: u32,
    pub cross: u32,
    pub closing: u32,
}

impl Default for PhaseExchanges {
    fn default() -> Self {
        Self {
            opening: 1,
            direct: 2,
            cross: 2,
            closing: 1,
        }
    }
}

impl PhaseExchanges {
    /// Exchange count for a phase. Phases without a rotation have none.
    pub fn for_phase(&self, phase: TrialPhase) -> u32 {
        match phase {
            TrialPhase::Opening => self.opening,
            TrialPhase::DirectExamination => self.direct,
            TrialPhase::CrossExamination => self.cross,
            TrialPhase::Closing => self.closing,
            TrialPhase::Lobby | TrialPhase::Evaluation | TrialPhase::Closed => 0,
        }
    }

    /// Largest count across the four phases.
    pub fn max(&self) -> u32 {
        self.opening
            .max(self.direct)
            .max(self.cross)
            .max(self.closing)
    }
}

/// What happens to a turn when an objection against it is sustained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectionRemedy {
    /// Request a fresh utterance that avoids the objected material.
    #[default]
    Regenerate,
    /// Strike the objected excerpt (or the whole turn) in place.
    Redact,
}

/// Immutable scenario data loaded from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioBlueprint {
    pub id: String,
    /// Catalog revision. A session is stale once this changes.
    #[serde(default)]
    pub revision: u64,
    pub title: String,
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub facts: Vec<String>,
    #[serde(default)]
    pub witnesses: Vec<WitnessProfile>,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    #[serde(default)]
    pub legal_issues: Vec<String>,
    #[serde(default)]
    pub learning_outcomes: Vec<String>,
    #[serde(default)]
    pub exchanges: PhaseExchanges,
    #[serde(default)]
    pub objection_remedy: ObjectionRemedy,
    /// Free-form jury parameterization (e.g. "skeptical").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jury_temperament: Option<String>,
}

impl ScenarioBlueprint {
    /// Check required fields: a fact set and a witness list with unique ids.
    pub fn validate(&self) -> TrialResult<()> {
        let invalid = |reason: &str| Err(TrialError::scenario_invalid(&self.id, reason));

        if self.id.trim().is_empty() {
            return invalid("scenario id is blank");
        }
        if self.facts.iter().all(|f| f.trim().is_empty()) {
            return invalid("fact set is empty");
        }
        if self.witnesses.is_empty() {
            return invalid("witness list is empty");
        }
        if self.exchanges.max() > MAX_EXCHANGES {
            return Err(TrialError::scenario_invalid(
                &self.id,
                format!(
                    "exchange count {} exceeds the limit of {}",
                    self.exchanges.max(),
                    MAX_EXCHANGES
                ),
            ));
        }

        let mut seen = HashSet::new();
        for witness in &self.witnesses {
            if witness.id.trim().is_empty() || witness.name.trim().is_empty() {
                return invalid("witness with blank id or name");
            }
            if !seen.insert(witness.id.as_str()) {
                return Err(TrialError::scenario_invalid(
                    &self.id,
                    format!("duplicate witness id '{}'", witness.id),
                ));
            }
        }
        Ok(())
    }

    /// Look up a witness by id.
    pub fn witness(&self, witness_id: &str) -> Option<&WitnessProfile> {
        self.witnesses.iter().find(|w| w.id == witness_id)
    }

    /// Witnesses examined during a phase, in scenario order.
    ///
    /// Direct examines defense witnesses and cross examines prosecution
    /// witnesses. When a side called nobody, every witness is used.
    pub fn witness_pool(&self, phase: TrialPhase) -> Vec<&WitnessProfile> {
        let side = match phase {
            TrialPhase::DirectExamination => Side::Defense,
            TrialPhase::CrossExamination => Side::Prosecution,
            _ => return Vec::new(),
        };
        let pool: Vec<_> = self
            .witnesses
            .iter()
            .filter(|w| w.called_by == side)
            .collect();
        if pool.is_empty() {
            self.witnesses.iter().collect()
        } else {
            pool
        }
    }

    /// Fact context handed to the reasoning service.
    ///
    /// A witness only sees the case facts plus their own statement; counsel
    /// and the judge also see evidence and legal issues.
    pub fn fact_context(&self, witness: Option<&WitnessProfile>) -> Vec<String> {
        let mut context = Vec::new();
        if !self.narrative.trim().is_empty() {
            context.push(format!("Case: {}", self.narrative.trim()));
        }
        context.extend(self.facts.iter().map(|f| format!("Fact: {}", f.trim())));

        match witness {
            Some(w) => {
                if !w.statement.trim().is_empty() {
                    context.push(format!("Your statement: {}", w.statement.trim()));
                }
            }
            None => {
                context.extend(
                    self.evidence
                        .iter()
                        .map(|e| format!("Exhibit {}: {}", e.id, e.description)),
                );
                context.extend(self.legal_issues.iter().map(|i| format!("Issue: {}", i)));
                if let Some(temperament) = &self.jury_temperament {
                    context.push(format!("Jury temperament: {}", temperament));
                }
            }
        }
        context
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            id: "unit".into(),
            revision: 0,
            title: "Unit".into(),
            narrative: String::new(),
            facts: vec!["fact".into()],
            witnesses: vec![WitnessProfile {
                id: "witness".into(),
                name: "Witness".into(),
                called_by: Side::Defense,
                persona: String::new(),
                statement: "I saw a red car.".into(),
                voice_id: None,
            }],
            evidence: vec![],
            legal_issues: vec![],
            learning_outcomes: vec![],
            exchanges: PhaseExchanges::default(),
            objection_remedy: ObjectionRemedy::Regenerate,
            jury_temperament: None,
        }
    }
}
