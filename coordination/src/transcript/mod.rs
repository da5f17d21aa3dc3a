//! Transcript: the append-only record of turns and attached interrupts.
//!
//! Content is frozen once narrated, with one exception: a sustained
//! objection replaces the target turn's content in place, keeping its
//! sequence number and interrupt history.

pub mod log;
pub mod turn;

pub use log::{TranscriptLog, STRICKEN_MARKER};
pub use turn::{CueAnnotation, CueKind, NarrationStatus, Turn};
