//! Scenario data: the immutable case file a session is built from.
//!
//! The catalog is an external collaborator. The engine only loads a
//! blueprint at start and re-checks its revision on resume.

pub mod blueprint;
pub mod catalog;

pub use blueprint::{
    EvidenceItem, ObjectionRemedy, PhaseExchanges, ScenarioBlueprint, Side, WitnessProfile,
    MAX_EXCHANGES,
};
pub use catalog::{CatalogError, InMemoryCatalog, ScenarioCatalog};
