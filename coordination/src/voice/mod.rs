//! Voice sync: narration of each turn before the scheduler may move on.

pub mod coordinator;

pub use coordinator::{NarrationOutcome, NarrationSignal, VoiceSyncCoordinator};
