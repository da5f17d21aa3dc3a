//! Role rotation policy and the per-phase scheduling plan.

use serde::{Deserialize, Serialize};

use crate::roles::CourtRole;
use crate::scenario::ScenarioBlueprint;
use crate::session::TrialPhase;

use CourtRole::{Defense, Prosecutor, Witness};

/// One position in a phase's rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationSlot {
    pub speaker: CourtRole,
    pub addressee: Option<CourtRole>,
}

const fn slot(speaker: CourtRole, addressee: Option<CourtRole>) -> RotationSlot {
    RotationSlot { speaker, addressee }
}

const SPEECHES: &[RotationSlot] = &[slot(Prosecutor, None), slot(Defense, None)];

/// Defense calls the witness, prosecutor crosses.
const DIRECT: &[RotationSlot] = &[
    slot(Defense, Some(Witness)),
    slot(Witness, Some(Defense)),
    slot(Prosecutor, Some(Witness)),
    slot(Witness, Some(Prosecutor)),
];

/// Prosecutor calls the witness, defense crosses.
const CROSS: &[RotationSlot] = &[
    slot(Prosecutor, Some(Witness)),
    slot(Witness, Some(Prosecutor)),
    slot(Defense, Some(Witness)),
    slot(Witness, Some(Defense)),
];

/// Fixed rotation for a phase. Judge and coach never appear.
pub fn rotation_for(phase: TrialPhase) -> &'static [RotationSlot] {
    match phase {
        TrialPhase::Opening | TrialPhase::Closing => SPEECHES,
        TrialPhase::DirectExamination => DIRECT,
        TrialPhase::CrossExamination => CROSS,
        TrialPhase::Lobby | TrialPhase::Evaluation | TrialPhase::Closed => &[],
    }
}

/// Position within the current phase's rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Completed passes through the rotation.
    pub pass: u32,
    /// Index of the next slot in the rotation.
    pub slot: usize,
}

/// The slot the scheduler will fill next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledSlot {
    pub speaker: CourtRole,
    pub addressee: Option<CourtRole>,
    /// Witness under examination, for examination phases.
    pub witness_id: Option<String>,
}

/// Everything needed to walk one phase.
#[derive(Debug, Clone)]
pub struct PhasePlan {
    pub phase: TrialPhase,
    pub rotation: &'static [RotationSlot],
    /// Exchanges per witness (examination) or per phase (speeches).
    pub exchanges: u32,
    /// Witness ids examined in order. Empty for speech phases.
    pub witnesses: Vec<String>,
}

impl PhasePlan {
    pub fn for_phase(phase: TrialPhase, scenario: &ScenarioBlueprint) -> Self {
        Self {
            phase,
            rotation: rotation_for(phase),
            exchanges: scenario.exchanges.for_phase(phase),
            witnesses: scenario
                .witness_pool(phase)
                .into_iter()
                .map(|w| w.id.clone())
                .collect(),
        }
    }

    /// Total passes through the rotation.
    pub fn passes(&self) -> u32 {
        if self.phase.is_examination() {
            let witnesses = u32::try_from(self.witnesses.len()).unwrap_or(u32::MAX);
            self.exchanges.saturating_mul(witnesses)
        } else {
            self.exchanges
        }
    }

    pub fn total_turns(&self) -> u32 {
        self.passes().saturating_mul(self.rotation_len())
    }

    /// Scheduled turns left from the cursor.
    pub fn remaining(&self, cursor: Cursor) -> u32 {
        let slot = u32::try_from(cursor.slot).unwrap_or(u32::MAX);
        let done = cursor
            .pass
            .saturating_mul(self.rotation_len())
            .saturating_add(slot);
        self.total_turns().saturating_sub(done)
    }

    fn rotation_len(&self) -> u32 {
        self.rotation.len() as u32
    }

    pub fn is_exhausted(&self, cursor: Cursor) -> bool {
        self.remaining(cursor) == 0
    }

    /// Slot at the cursor, or `None` once the phase is exhausted.
    pub fn slot_at(&self, cursor: Cursor) -> Option<ScheduledSlot> {
        if self.is_exhausted(cursor) {
            return None;
        }
        let entry = self.rotation.get(cursor.slot)?;
        let witness_id = if self.phase.is_examination() && self.exchanges > 0 {
            self.witnesses
                .get((cursor.pass / self.exchanges) as usize)
                .cloned()
        } else {
            None
        };
        Some(ScheduledSlot {
            speaker: entry.speaker,
            addressee: entry.addressee,
            witness_id,
        })
    }

    /// Cursor after filling the slot at `cursor`.
    pub fn advance(&self, cursor: Cursor) -> Cursor {
        if cursor.slot + 1 >= self.rotation.len() {
            Cursor {
                pass: cursor.pass + 1,
                slot: 0,
            }
        } else {
            Cursor {
                pass: cursor.pass,
                slot: cursor.slot + 1,
            }
        }
    }
}
