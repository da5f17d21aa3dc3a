//! Session event stream
//!
//! Every observable change a session makes (phase moves, turns, narration,
//! interrupts, evaluation deltas, warnings) is published here for the
//! presentation layer.
//!
//! # Architecture
//!
//! 1. **Event Types** (`types.rs`): the `TrialEvent` enum and its
//!    sequenced envelope.
//!
//! 2. **Event Bus** (`bus.rs`): Tokio broadcast-based pub/sub with a
//!    bounded in-memory journal for replay.
//!
//! # Event Flow
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ TrialEngine  │────▶│  Event Bus   │────▶│  Subscribers │
//! │  (publish)   │     │  (broadcast) │     │   (recv)     │
//! └──────────────┘     └──────┬───────┘     └──────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐
//!                      │   Journal    │
//!                      │  (bounded)   │
//!                      └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use trial_coordination::events::{EventBus, EventBusExt, EventFilter};
//!
//! let bus = EventBus::default().shared();
//! let mut warnings = bus.subscribe_filtered(EventFilter::new().types(vec!["warning"]));
//!
//! while let Ok(event) = warnings.recv().await {
//!     println!("#{} {:?}", event.id, event.event);
//! }
//! ```

pub mod bus;
pub mod types;

// Re-export core types
pub use bus::{
    EventBus, EventBusError, EventBusExt, EventBusResult, EventFilter, FilteredReceiver,
    SharedEventBus,
};
pub use types::{CloseReason, SequencedEvent, TrialEvent};
