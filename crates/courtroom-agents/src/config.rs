//! Layered rehearsal configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Command-line flags (applied by the binary)
//! 2. Environment variables (`OPENAI_API_KEY`, `ELEVENLABS_API_KEY`, `REHEARSAL_*`, `TRIAL_*`)
//! 3. TOML config file
//! 4. Built-in defaults
//!
//! | Variable                       | Field                          |
//! |--------------------------------|--------------------------------|
//! | `OPENAI_API_KEY`               | `reasoning.api_key`            |
//! | `REHEARSAL_REASONING_URL`      | `reasoning.base_url`           |
//! | `REHEARSAL_REASONING_MODEL`    | `reasoning.model`              |
//! | `ELEVENLABS_API_KEY`           | `narration.api_key`            |
//! | `REHEARSAL_NARRATION_URL`      | `narration.base_url`           |
//! | `REHEARSAL_REALTIME_PLAYBACK`  | `narration.realtime_playback`  |
//! | `REHEARSAL_SCENARIO_DIR`       | `scenario_dir`                 |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trial_coordination::EngineConfig;

use crate::personas;

const DEFAULT_REASONING_URL: &str = "https://api.openai.com/v1";
const DEFAULT_REASONING_MODEL: &str = "gpt-4";
const DEFAULT_NARRATION_URL: &str = "https://api.elevenlabs.io/v1";
const DEFAULT_NARRATION_MODEL: &str = "eleven_monolingual_v1";

/// Placeholder values shipped in sample env files. Treated as unset.
const PLACEHOLDER_KEYS: &[&str] = &["your_openai_api_key_here", "your_elevenlabs_api_key_here"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub base_url: String,
    /// Without a key the scripted fallback is used.
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// HTTP client timeout. The engine's own timeout still applies.
    pub request_timeout_secs: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REASONING_URL.to_string(),
            api_key: None,
            model: DEFAULT_REASONING_MODEL.to_string(),
            max_tokens: 150,
            temperature: 0.7,
            request_timeout_secs: 60,
        }
    }
}

/// ElevenLabs-compatible text-to-speech endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    pub base_url: String,
    /// Without a key every turn is shown as text.
    pub api_key: Option<String>,
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    /// Speaking rate used to estimate clip duration.
    pub words_per_minute: f64,
    /// Hold each turn for its estimated duration, as a listener would.
    pub realtime_playback: bool,
    pub request_timeout_secs: u64,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_NARRATION_URL.to_string(),
            api_key: None,
            model_id: DEFAULT_NARRATION_MODEL.to_string(),
            stability: 0.5,
            similarity_boost: 0.5,
            words_per_minute: 150.0,
            realtime_playback: false,
            request_timeout_secs: 30,
        }
    }
}

/// Top-level rehearsal configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RehearsalConfig {
    pub engine: EngineConfig,
    pub reasoning: ReasoningConfig,
    pub narration: NarrationConfig,
    /// Directory of `*.toml` scenarios. The built-in demo is always listed.
    pub scenario_dir: Option<PathBuf>,
}

impl RehearsalConfig {
    /// Defaults, then the optional file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = var("OPENAI_API_KEY") {
            self.reasoning.api_key = Some(key);
        }
        if let Some(url) = var("REHEARSAL_REASONING_URL") {
            self.reasoning.base_url = url;
        }
        if let Some(model) = var("REHEARSAL_REASONING_MODEL") {
            self.reasoning.model = model;
        }
        if let Some(key) = var("ELEVENLABS_API_KEY") {
            self.narration.api_key = Some(key);
        }
        if let Some(url) = var("REHEARSAL_NARRATION_URL") {
            self.narration.base_url = url;
        }
        if let Some(realtime) = var("REHEARSAL_REALTIME_PLAYBACK").and_then(|v| v.parse().ok()) {
            self.narration.realtime_playback = realtime;
        }
        if let Some(dir) = var("REHEARSAL_SCENARIO_DIR") {
            self.scenario_dir = Some(PathBuf::from(dir));
        }

        self.reasoning.api_key = self.reasoning.api_key.filter(|k| usable_key(k));
        self.narration.api_key = self.narration.api_key.filter(|k| usable_key(k));
        self.engine = self.engine.with_env_overrides();
        self
    }

    /// Engine config with default voices filled in for the cast.
    pub fn engine_config(&self) -> EngineConfig {
        let mut engine = self.engine.clone();
        engine.cast = personas::voiced_cast(engine.cast);
        engine
    }
}

fn usable_key(key: &str) -> bool {
    !key.trim().is_empty() && !PLACEHOLDER_KEYS.contains(&key.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_chat_settings() {
        let config = RehearsalConfig::default();
        assert_eq!(config.reasoning.model, "gpt-4");
        assert_eq!(config.reasoning.max_tokens, 150);
        assert_eq!(config.narration.model_id, "eleven_monolingual_v1");
        assert!(config.reasoning.api_key.is_none());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let config = RehearsalConfig::from_toml(
            r#"
            [reasoning]
            model = "gpt-4o-mini"
            api_key = "from-file"
            "#,
        )
        .unwrap()
        .with_env(env(&[
            ("OPENAI_API_KEY", "from-env"),
            ("REHEARSAL_SCENARIO_DIR", "/srv/scenarios"),
        ]));

        assert_eq!(config.reasoning.model, "gpt-4o-mini");
        assert_eq!(config.reasoning.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.scenario_dir, Some(PathBuf::from("/srv/scenarios")));
    }

    #[test]
    fn test_placeholder_keys_are_ignored() {
        let config = RehearsalConfig::default().with_env(env(&[
            ("OPENAI_API_KEY", "your_openai_api_key_here"),
            ("ELEVENLABS_API_KEY", "  "),
        ]));
        assert!(config.reasoning.api_key.is_none());
        assert!(config.narration.api_key.is_none());
    }

    #[test]
    fn test_engine_section_in_toml() {
        let config = RehearsalConfig::from_toml(
            r#"
            [engine]
            objection_queue_capacity = 2
            auto_advance = true
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.objection_queue_capacity, 2);
        assert!(config.engine.auto_advance);
        assert_eq!(config.engine.narration_timeout_ms, 30_000);
    }

    #[test]
    fn test_engine_config_assigns_voices() {
        let engine = RehearsalConfig::default().engine_config();
        assert_eq!(
            engine.cast.judge.voice_id.as_deref(),
            Some(personas::voices::ADAM)
        );
    }
}
