//! Turn scheduling
//!
//! Decides who speaks next and obtains what they say.
//!
//! ```text
//!   cursor ──▶ PhasePlan::slot_at ──▶ speaker profile
//!                                         │
//!            transcript ──▶ ContextWindow │
//!                                 │       ▼
//!                                 └──▶ GenerationRequest ──▶ ReasoningService
//!                                                                  │
//!                                     validate (retry once, halved window)
//!                                                                  │
//!                                                                  ▼
//!                                                        NextTurn::Turn(turn)
//! ```
//!
//! Rotations are fixed per phase (see [`rotation`]); judge and coach never
//! occupy a slot.

pub mod context;
pub mod rotation;
pub mod turn_scheduler;

pub use context::ContextWindow;
pub use rotation::{rotation_for, Cursor, PhasePlan, RotationSlot, ScheduledSlot};
pub use turn_scheduler::{NextTurn, TurnScheduler};
