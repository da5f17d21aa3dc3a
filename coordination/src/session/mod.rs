//! Session state machine
//!
//! ```text
//!  Lobby ─▶ Opening ─▶ DirectExamination ─▶ CrossExamination ─▶ Closing ─▶ Evaluation ─▶ Closed
//!    │         │               │                    │               │            ▲
//!    └─────────┴───────────────┴────── abort ───────┴───────────────┴────────────┘
//! ```
//!
//! Pausing is a flag on the session, not a phase. [`TrialEngine`] owns the
//! session and is the only place phases change.

pub mod engine;
pub mod handle;
pub mod phase;
pub mod state;
pub mod summary;

pub use engine::{TickOutcome, TrialEngine};
pub use handle::{Command, SessionHandle};
pub use phase::TrialPhase;
pub use state::{PhaseTransition, Session};
pub use summary::SessionSummary;
