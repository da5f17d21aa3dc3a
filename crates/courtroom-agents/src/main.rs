//! Courtroom rehearsal CLI.
//!
//! # Usage
//!
//! ```bash
//! # Offline run of the built-in scenario, advancing phases automatically
//! courtroom-rehearsal run --scenario state-v-morgan --auto
//!
//! # Play defense counsel from the terminal and export the summary
//! OPENAI_API_KEY=... courtroom-rehearsal run --scenario state-v-morgan \
//!     --interactive --export summary.json
//!
//! # Check a scenario file before adding it to the catalog
//! courtroom-rehearsal validate scenarios/state-v-doe.toml
//! ```

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use courtroom_agents::catalog::{parse_scenario, DirectoryCatalog};
use courtroom_agents::config::RehearsalConfig;
use courtroom_agents::console::{self, ConsoleInput};
use courtroom_agents::build_services;
use trial_coordination::{
    ScenarioCatalog, SessionHandle, TickOutcome, TrialEngine, TrialError,
};

/// How often a paused session is polled for queued commands.
const PAUSE_POLL: Duration = Duration::from_millis(200);

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of scenario TOML files (overrides REHEARSAL_SCENARIO_DIR)
    #[arg(long, global = true)]
    scenario_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run a rehearsal session
    Run {
        /// Scenario id from the catalog
        #[arg(long, default_value = courtroom_agents::catalog::DEMO_SCENARIO_ID)]
        scenario: String,

        /// Advance phases and skip degraded phases without prompting
        #[arg(long, default_value_t = false)]
        auto: bool,

        /// Read defense lines and slash commands from stdin
        #[arg(long, default_value_t = false)]
        interactive: bool,

        /// Stop after this many engine ticks
        #[arg(long, default_value_t = 500)]
        max_ticks: usize,

        /// Write the session summary JSON here
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// List scenarios in the catalog
    Scenarios,
    /// Parse and validate a scenario file
    Validate {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = RehearsalConfig::load(args.config.as_deref())
        .context("Failed to load rehearsal config")?;
    if let Some(dir) = args.scenario_dir {
        config.scenario_dir = Some(dir);
    }

    match args.command {
        Cmd::Run {
            scenario,
            auto,
            interactive,
            max_ticks,
            export,
        } => {
            if auto {
                config.engine.auto_advance = true;
                config.engine.auto_skip_degraded = true;
            }
            run(&config, &scenario, interactive, max_ticks, export.as_deref()).await
        }
        Cmd::Scenarios => list_scenarios(&config).await,
        Cmd::Validate { file } => validate(&file),
    }
}

async fn run(
    config: &RehearsalConfig,
    scenario_id: &str,
    interactive: bool,
    max_ticks: usize,
    export: Option<&Path>,
) -> Result<()> {
    let services = build_services(config)?;
    let mut engine = TrialEngine::start(scenario_id, services, config.engine_config())
        .await
        .with_context(|| format!("Failed to start scenario '{}'", scenario_id))?;
    info!(
        session_id = %engine.session().id,
        scenario = %engine.scenario().title,
        interactive,
        "Rehearsal starting"
    );

    let shutdown = CancellationToken::new();
    let printer = tokio::spawn(console::follow(engine.events().subscribe(), shutdown.clone()));
    if interactive {
        println!("{}", console::HELP);
        let handle = engine.handle();
        std::thread::Builder::new()
            .name("stdin-reader".into())
            .spawn(move || read_stdin(handle))
            .context("Failed to spawn stdin reader")?;
    }

    let result = drive(&mut engine, max_ticks, interactive).await;

    console::stop(printer, &shutdown).await;
    result?;

    let summary = engine.summary();
    println!("{}", summary.summary_line());
    if let Some(path) = export {
        let json = summary.to_json_pretty().context("Failed to serialize summary")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        info!(path = %path.display(), "Summary exported");
    }
    Ok(())
}

/// Tick the engine until the session closes or the tick budget runs out.
async fn drive(engine: &mut TrialEngine, max_ticks: usize, interactive: bool) -> Result<()> {
    let mut ticks = 0;
    while ticks < max_ticks {
        if engine.session().is_closed() {
            return Ok(());
        }
        match engine.tick().await {
            Ok(TickOutcome::Paused) => {
                tokio::time::sleep(PAUSE_POLL).await;
                continue;
            }
            Ok(TickOutcome::PhaseExhausted { .. }) if !interactive => {
                engine.advance_phase()?;
            }
            Ok(TickOutcome::PhaseExhausted { .. }) => {
                // Wait for /next; typed lines keep flowing in meanwhile.
                tokio::time::sleep(PAUSE_POLL).await;
                continue;
            }
            Ok(TickOutcome::GenerationFailed { phase, .. }) if !interactive => {
                warn!(%phase, "Phase degraded, skipping");
                if engine.session().phase == phase {
                    engine.skip_degraded_phase()?;
                }
            }
            Ok(_) => {}
            Err(TrialError::SessionClosed { .. }) => return Ok(()),
            Err(e) if e.is_structural() => return Err(e.into()),
            Err(e) if e.is_turn_local() => warn!(error = %e, "Turn degraded"),
            Err(e) => warn!(error = %e, "Tick failed"),
        }
        ticks += 1;
    }

    if !engine.session().is_closed() {
        warn!(
            max_ticks,
            status = %engine.session().status_line(),
            "Tick budget exhausted, aborting session"
        );
        engine.abort("tick budget exhausted")?;
    }
    Ok(())
}

/// Forward stdin lines to the engine as commands.
///
/// Runs on a plain thread: a blocking stdin read cannot be cancelled, and
/// parking it on the runtime would hold up shutdown until the next newline.
fn read_stdin(handle: SessionHandle) {
    for line in std::io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to read stdin");
                break;
            }
        };
        match console::parse_input(&line) {
            ConsoleInput::Command(command) => {
                if handle.send(command).is_err() {
                    break;
                }
            }
            ConsoleInput::Help => println!("{}", console::HELP),
            ConsoleInput::Invalid(reason) => println!("? {}", reason),
            ConsoleInput::Empty => {}
        }
    }
}

async fn list_scenarios(config: &RehearsalConfig) -> Result<()> {
    let catalog = match &config.scenario_dir {
        Some(dir) => DirectoryCatalog::new(dir),
        None => DirectoryCatalog::builtin(),
    };
    for id in catalog.list().await.context("Failed to list scenarios")? {
        match catalog.load(&id).await {
            Ok(scenario) => println!(
                "{:<24} {} ({} witness(es))",
                id,
                scenario.title,
                scenario.witnesses.len()
            ),
            Err(e) => println!("{:<24} unreadable: {}", id, e),
        }
    }
    Ok(())
}

fn validate(file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let scenario = match parse_scenario(&content) {
        Ok(scenario) => scenario,
        Err(reason) => bail!("{} is not a valid scenario: {}", file.display(), reason),
    };
    println!(
        "ok: {} \"{}\" ({} fact(s), {} witness(es), revision {:016x})",
        scenario.id,
        scenario.title,
        scenario.facts.len(),
        scenario.witnesses.len(),
        scenario.revision
    );
    Ok(())
}
