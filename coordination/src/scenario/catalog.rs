//! Scenario catalog contract and an in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use super::blueprint::ScenarioBlueprint;

/// Errors from a scenario catalog
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Scenario not found: {scenario_id}")]
    NotFound { scenario_id: String },

    #[error("Scenario '{scenario_id}' could not be read: {reason}")]
    Unreadable { scenario_id: String, reason: String },
}

impl CatalogError {
    pub fn not_found(scenario_id: impl Into<String>) -> Self {
        Self::NotFound {
            scenario_id: scenario_id.into(),
        }
    }
}

/// Read-only source of scenario blueprints.
#[async_trait]
pub trait ScenarioCatalog: Send + Sync {
    /// Load a scenario by id.
    async fn load(&self, scenario_id: &str) -> Result<ScenarioBlueprint, CatalogError>;

    /// Current revision of a scenario. Used to detect stale sessions.
    async fn revision(&self, scenario_id: &str) -> Result<u64, CatalogError> {
        Ok(self.load(scenario_id).await?.revision)
    }

    /// Ids of every scenario the catalog can load.
    async fn list(&self) -> Result<Vec<String>, CatalogError>;
}

/// Catalog held in memory. Re-inserting or invalidating bumps the revision.
#[derive(Default)]
pub struct InMemoryCatalog {
    scenarios: RwLock<HashMap<String, ScenarioBlueprint>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a set of blueprints.
    pub fn with_scenarios(scenarios: impl IntoIterator<Item = ScenarioBlueprint>) -> Self {
        let catalog = Self::new();
        for scenario in scenarios {
            catalog.insert(scenario);
        }
        catalog
    }

    /// Insert or replace a scenario. Replacing assigns a newer revision.
    pub fn insert(&self, mut scenario: ScenarioBlueprint) -> u64 {
        let mut scenarios = self.scenarios.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = scenarios.get(&scenario.id) {
            scenario.revision = scenario.revision.max(existing.revision + 1);
        }
        let revision = scenario.revision;
        scenarios.insert(scenario.id.clone(), scenario);
        revision
    }

    /// Mark a scenario as changed without altering its content.
    pub fn invalidate(&self, scenario_id: &str) -> Option<u64> {
        let mut scenarios = self.scenarios.write().unwrap_or_else(|e| e.into_inner());
        scenarios.get_mut(scenario_id).map(|s| {
            s.revision += 1;
            s.revision
        })
    }

    /// Remove a scenario entirely.
    pub fn remove(&self, scenario_id: &str) -> Option<ScenarioBlueprint> {
        self.scenarios
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(scenario_id)
    }
}

#[async_trait]
impl ScenarioCatalog for InMemoryCatalog {
    async fn load(&self, scenario_id: &str) -> Result<ScenarioBlueprint, CatalogError> {
        self.scenarios
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(scenario_id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found(scenario_id))
    }

    async fn list(&self) -> Result<Vec<String>, CatalogError> {
        let mut ids: Vec<_> = self
            .scenarios
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{PhaseExchanges, ObjectionRemedy};

    fn scenario(id: &str) -> ScenarioBlueprint {
        ScenarioBlueprint {
            id: id.into(),
            revision: 0,
            title: "Test".into(),
            narrative: String::new(),
            facts: vec!["fact".into()],
            witnesses: vec![],
            evidence: vec![],
            legal_issues: vec![],
            learning_outcomes: vec![],
            exchanges: PhaseExchanges::default(),
            objection_remedy: ObjectionRemedy::default(),
            jury_temperament: None,
        }
    }

    #[tokio::test]
    async fn test_load_and_not_found() {
        let catalog = InMemoryCatalog::with_scenarios([scenario("a")]);
        assert_eq!(catalog.load("a").await.unwrap().id, "a");
        assert_eq!(
            catalog.load("missing").await.unwrap_err(),
            CatalogError::not_found("missing")
        );
    }

    #[tokio::test]
    async fn test_invalidate_bumps_revision() {
        let catalog = InMemoryCatalog::with_scenarios([scenario("a")]);
        assert_eq!(catalog.revision("a").await.unwrap(), 0);
        assert_eq!(catalog.invalidate("a"), Some(1));
        assert_eq!(catalog.revision("a").await.unwrap(), 1);
        assert_eq!(catalog.invalidate("nope"), None);
    }

    #[tokio::test]
    async fn test_reinsert_assigns_newer_revision() {
        let catalog = InMemoryCatalog::new();
        assert_eq!(catalog.insert(scenario("a")), 0);
        assert_eq!(catalog.insert(scenario("a")), 1);
        catalog.insert(scenario("b"));
        assert_eq!(catalog.list().await.unwrap(), vec!["a", "b"]);
        catalog.remove("a");
        assert!(catalog.revision("a").await.is_err());
    }
}
