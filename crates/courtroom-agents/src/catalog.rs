//! Scenario catalog backed by a directory of TOML files.
//!
//! Each `<id>.toml` holds one [`ScenarioBlueprint`]. The revision is derived
//! from a blake3 hash of the file contents, so any edit makes running
//! sessions stale on their next resume.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};
use trial_coordination::{CatalogError, CourtRole, ScenarioBlueprint, ScenarioCatalog};

use crate::personas;

/// Id of the scenario compiled into the binary.
pub const DEMO_SCENARIO_ID: &str = "state-v-morgan";

const DEMO_SCENARIO: &str = include_str!("../scenarios/state-v-morgan.toml");

/// Revision for a scenario file's contents.
pub fn content_revision(content: &str) -> u64 {
    let hash = blake3::hash(content.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Parse and validate a scenario, stamping its content revision.
///
/// Witnesses without a voice get the stock witness voice.
pub fn parse_scenario(content: &str) -> Result<ScenarioBlueprint, String> {
    let mut scenario: ScenarioBlueprint = toml::from_str(content).map_err(|e| e.to_string())?;
    scenario.revision = content_revision(content);
    scenario.validate().map_err(|e| e.to_string())?;
    for witness in &mut scenario.witnesses {
        if witness.voice_id.is_none() {
            witness.voice_id = personas::default_voice(CourtRole::Witness).map(str::to_string);
        }
    }
    Ok(scenario)
}

/// The built-in demo scenario.
pub fn demo_scenario() -> Result<ScenarioBlueprint, CatalogError> {
    parse_scenario(DEMO_SCENARIO).map_err(|reason| CatalogError::Unreadable {
        scenario_id: DEMO_SCENARIO_ID.to_string(),
        reason,
    })
}

/// Reads `<dir>/<id>.toml` on every load. Always includes the demo.
#[derive(Debug, Clone, Default)]
pub struct DirectoryCatalog {
    dir: Option<PathBuf>,
}

impl DirectoryCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Catalog with only the built-in demo.
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn path_for(&self, scenario_id: &str) -> Option<PathBuf> {
        let valid_id = !scenario_id.is_empty()
            && scenario_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid_id {
            return None;
        }
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.toml", scenario_id)))
    }
}

#[async_trait]
impl ScenarioCatalog for DirectoryCatalog {
    async fn load(&self, scenario_id: &str) -> Result<ScenarioBlueprint, CatalogError> {
        let Some(path) = self.path_for(scenario_id) else {
            return if scenario_id == DEMO_SCENARIO_ID {
                demo_scenario()
            } else {
                Err(CatalogError::not_found(scenario_id))
            };
        };

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if scenario_id == DEMO_SCENARIO_ID {
                    return demo_scenario();
                }
                return Err(CatalogError::not_found(scenario_id));
            }
            Err(e) => {
                return Err(CatalogError::Unreadable {
                    scenario_id: scenario_id.to_string(),
                    reason: format!("{}: {}", path.display(), e),
                })
            }
        };

        let scenario = parse_scenario(&content).map_err(|reason| CatalogError::Unreadable {
            scenario_id: scenario_id.to_string(),
            reason,
        })?;
        if scenario.id != scenario_id {
            return Err(CatalogError::Unreadable {
                scenario_id: scenario_id.to_string(),
                reason: format!(
                    "{} declares id '{}', expected '{}'",
                    path.display(),
                    scenario.id,
                    scenario_id
                ),
            });
        }
        debug!(scenario = scenario_id, revision = scenario.revision, "Scenario loaded");
        Ok(scenario)
    }

    async fn list(&self) -> Result<Vec<String>, CatalogError> {
        let mut ids = vec![DEMO_SCENARIO_ID.to_string()];
        let Some(dir) = &self.dir else {
            return Ok(ids);
        };

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Scenario directory unreadable");
                return Ok(ids);
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !ids.iter().any(|id| id == stem) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
