//! Service adapters and console transport for courtroom rehearsal.
//!
//! Wires concrete collaborators into the `trial-coordination` engine:
//! an OpenAI-compatible reasoning client, an ElevenLabs-compatible narration
//! client, a TOML scenario directory, and offline fallbacks for each.

pub mod catalog;
pub mod config;
pub mod console;
pub mod narration;
pub mod personas;
pub mod reasoning;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use trial_coordination::{NarrationService, ReasoningService, TrialServices};

use crate::catalog::DirectoryCatalog;
use crate::config::RehearsalConfig;
use crate::narration::{ElevenLabsNarration, TextOnlyNarration};
use crate::reasoning::{OpenAiReasoning, ScriptedReasoning};

/// Build the engine's collaborators, falling back to offline adapters for
/// any service without credentials.
pub fn build_services(config: &RehearsalConfig) -> Result<TrialServices> {
    let reasoning: Arc<dyn ReasoningService> =
        match OpenAiReasoning::from_config(&config.reasoning)
            .context("Failed to build reasoning client")?
        {
            Some(client) => {
                info!(model = %config.reasoning.model, url = %config.reasoning.base_url, "Using chat completions reasoning");
                Arc::new(client)
            }
            None => {
                info!("No reasoning API key, using scripted lines");
                Arc::new(ScriptedReasoning::new())
            }
        };

    let narration: Arc<dyn NarrationService> =
        match ElevenLabsNarration::from_config(&config.narration)
            .context("Failed to build narration client")?
        {
            Some(client) => {
                info!(url = %config.narration.base_url, "Using text-to-speech narration");
                Arc::new(client)
            }
            None if config.narration.realtime_playback => {
                Arc::new(TextOnlyNarration::realtime(config.narration.words_per_minute))
            }
            None => Arc::new(TextOnlyNarration::new()),
        };

    let catalog = match &config.scenario_dir {
        Some(dir) => DirectoryCatalog::new(dir),
        None => DirectoryCatalog::builtin(),
    };

    Ok(TrialServices::new(reasoning, narration, Arc::new(catalog)))
}
