//! Trial Coordination Library
//!
//! The orchestration core of a courtroom cross-examination rehearsal. One
//! human plays defense counsel; the judge, prosecutor, witnesses and coach
//! are driven through external reasoning and narration services.
//!
//! This library provides:
//! - A session state machine that walks the trial phases in fixed order
//! - A turn scheduler with per-phase role rotation and bounded context
//! - An interrupt arbiter for objections, coaching cues and judge rulings
//! - A transcript with streaming evaluation and a coach policy
//! - A voice sync coordinator that never lets audio stall the rehearsal
//!
//! # Data Flow
//!
//! ```text
//!   ScenarioCatalog ──▶ TrialEngine::start ──▶ Session (Lobby)
//!                              │
//!          SessionHandle ──mpsc──▶ tick()
//!                              │
//!        ┌─────────────────────┼──────────────────────┐
//!        ▼                     ▼                      ▼
//!  InterruptArbiter      TurnScheduler        VoiceSyncCoordinator
//!   (judge ruling)     (ReasoningService)     (NarrationService)
//!        │                     │                      │
//!        └──────────▶ TranscriptLog + EvaluationRecord ◀┘
//!                              │
//!                              ▼
//!                     EventBus (TrialEvent)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use trial_coordination::{EngineConfig, TrialEngine, TrialServices};
//!
//! let mut engine = TrialEngine::start("state-v-doe", services, EngineConfig::from_env()).await?;
//! let mut events = engine.events().subscribe();
//! engine.run_to_close(500).await?;
//! println!("{}", engine.summary().to_json_pretty()?);
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod error;
pub mod evaluation;
pub mod events;
pub mod interrupt;
pub mod roles;
pub mod scenario;
pub mod scheduler;
pub mod services;
pub mod session;
pub mod transcript;
pub mod voice;

pub use config::EngineConfig;
pub use error::{TrialError, TrialResult};

// Re-export key session types
pub use session::{
    Command, PhaseTransition, Session, SessionHandle, SessionSummary, TickOutcome, TrialEngine,
    TrialPhase,
};

// Re-export key service types
pub use services::{
    Completion, CompletionStatus, GenerationRequest, NarrationRequest, NarrationService,
    ReasoningService, ServiceError, TrialServices, Utterance, VoicePersona,
};

// Re-export key scenario types
pub use scenario::{
    CatalogError, InMemoryCatalog, ObjectionRemedy, ScenarioBlueprint, ScenarioCatalog, Side,
    WitnessProfile,
};

// Re-export key role types
pub use roles::{AgentProfile, AgentStatus, Cast, CourtRole};

// Re-export key event types
pub use events::{CloseReason, EventBus, SequencedEvent, SharedEventBus, TrialEvent};

// Re-export interrupt and transcript types
pub use interrupt::{Interrupt, InterruptKind, Resolution, RulingKind, Verdict};
pub use transcript::{NarrationStatus, TranscriptLog, Turn};

// Re-export evaluation types
pub use evaluation::{CoachThresholds, EvaluationReport};
