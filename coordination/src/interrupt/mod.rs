//! Interrupt arbitration: objections, coaching cues and judge rulings.
//!
//! # Resolution Flow
//!
//! ```text
//! objection ──▶ queue (bounded FIFO) ──▶ head Pending ──▶ judge ruling
//!                                                           │
//!                              ┌────────────────────────────┤
//!                              ▼                            ▼
//!                    Sustained → Granted           Overruled → Denied
//!                    (regenerate or redact)        (narration resumes)
//!
//! coaching cue / ruling ──▶ Granted immediately, attached to latest turn
//! ```

pub mod arbiter;
pub mod judge;
pub mod types;

pub use arbiter::InterruptArbiter;
pub use judge::{obtain_ruling, parse_verdict, ruling_request, JudgePolicy, Ruling};
pub use types::{Interrupt, InterruptKind, InterruptPayload, Resolution, RulingKind, Verdict};
