//! Impact CLI - command-line front end
//!
//! Loads a graph snapshot and an optional TOML config, runs one use case and
//! returns its JSON output. Logging goes to stderr so stdout stays
//! machine-readable.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use impact_core::{
    AnalysisConfig, AnalysisOptions, BatchRequest, ChangeEvent, ImpactEngine, ImpactError,
};
use impact_graph::{
    ChildrenHierarchy, ChildrenStatus, EntityId, EntityKind, GraphSnapshot, InMemoryGraphStore,
};
use impact_sim::{PoolUtilization, TrialCapBudget};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Change-impact analysis over a dependency graph snapshot
#[derive(Debug, Parser)]
#[command(name = "impact")]
#[command(about = "Change-impact analysis for piping engineering artifacts", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true, env = "IMPACT_LOG_JSON")]
    pub log_json: bool,

    /// Use case to run
    #[command(subcommand)]
    pub command: Command,
}

/// Graph and configuration inputs shared by every command
#[derive(Debug, Args)]
pub struct Inputs {
    /// Graph snapshot (JSON with `nodes` and `edges`)
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Analysis config (TOML)
    #[arg(long, env = "IMPACT_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Use cases
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze one change event
    Analyze {
        /// Snapshot and config
        #[command(flatten)]
        inputs: Inputs,
        /// Change event (JSON)
        #[arg(long)]
        event: PathBuf,
        /// Hop limit below the ceiling
        #[arg(long)]
        depth: Option<u32>,
        /// Allow the extended hop ceiling
        #[arg(long)]
        extended: bool,
        /// Pool utilization (JSON object of pool name to load)
        #[arg(long)]
        resources: Option<PathBuf>,
        /// Print only the workflow decision variables
        #[arg(long)]
        variables: bool,
    },

    /// Batch analysis over lines and ISOs
    Batch {
        /// Snapshot and config
        #[command(flatten)]
        inputs: Inputs,
        /// Line ids
        #[arg(long, value_delimiter = ',')]
        lines: Vec<String>,
        /// ISO ids
        #[arg(long, value_delimiter = ',')]
        isos: Vec<String>,
        /// Do not follow ISO to spool relationships
        #[arg(long)]
        no_spools: bool,
        /// Do not follow part relationships
        #[arg(long)]
        no_parts: bool,
    },

    /// Children tree of an entity
    Children {
        /// Snapshot and config
        #[command(flatten)]
        inputs: Inputs,
        /// Entity id
        #[arg(long)]
        id: String,
        /// Tree depth
        #[arg(long)]
        depth: Option<u32>,
        /// Minimal projection (id and latest status only)
        #[arg(long, requires = "kind")]
        minimal: bool,
        /// Entity kind, e.g. Line or ISO
        #[arg(long)]
        kind: Option<String>,
    },

    /// Run only the timeline simulation for an event
    Simulate {
        /// Snapshot and config
        #[command(flatten)]
        inputs: Inputs,
        /// Change event (JSON)
        #[arg(long)]
        event: PathBuf,
        /// Monte-Carlo trials
        #[arg(long)]
        trials: Option<usize>,
        /// Seed (default: derived from the event id)
        #[arg(long)]
        seed: Option<u64>,
        /// Stop after this many trials
        #[arg(long)]
        max_trials: Option<usize>,
        /// Pool utilization (JSON object of pool name to load)
        #[arg(long)]
        resources: Option<PathBuf>,
    },

    /// Check that the snapshot store answers
    Health {
        /// Snapshot and config
        #[command(flatten)]
        inputs: Inputs,
    },
}

/// Install the tracing subscriber (`RUST_LOG`, default `impact=info`)
pub fn init_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "impact=info,impact_core=info,impact_graph=warn,impact_sim=warn".into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Exit status for an error: 2 for validation failures, 1 otherwise
#[must_use]
pub fn exit_status(err: &anyhow::Error) -> u8 {
    let validation = err
        .chain()
        .any(|cause| cause.downcast_ref::<ImpactError>().is_some_and(ImpactError::is_validation));
    if validation {
        2
    } else {
        1
    }
}

/// Run one command and return its JSON output
///
/// # Errors
/// Unreadable inputs, invalid config, validation failures and store errors.
pub async fn execute(command: Command) -> anyhow::Result<Value> {
    match command {
        Command::Analyze {
            inputs,
            event,
            depth,
            extended,
            resources,
            variables,
        } => {
            let engine = build_engine(&inputs, None)?;
            let event = read_event(&event)?;
            let mut options = AnalysisOptions::new().with_utilization(read_utilization(resources.as_deref())?);
            options.requested_depth = depth;
            options.extended = extended;

            let result = engine.analyze(&event, &options).await?;
            if variables {
                Ok(serde_json::to_value(result.workflow_variables())?)
            } else {
                Ok(serde_json::to_value(&result)?)
            }
        }

        Command::Batch {
            inputs,
            lines,
            isos,
            no_spools,
            no_parts,
        } => {
            let engine = build_engine(&inputs, None)?;
            let mut request = BatchRequest::new(ids(lines), ids(isos));
            request.include_spools = !no_spools;
            request.include_parts = !no_parts;
            let impact = engine.batch(&request).await?;
            Ok(serde_json::to_value(&impact)?)
        }

        Command::Children {
            inputs,
            id,
            depth,
            minimal,
            kind,
        } => {
            let engine = build_engine(&inputs, None)?;
            let id = EntityId::new(id);
            match kind.as_deref().map(EntityKind::from_label) {
                Some(kind) if minimal => {
                    let tree = engine.children_hierarchy(&kind, &id, depth).await?;
                    Ok(serde_json::to_value(ChildrenHierarchy::new(&tree))?)
                }
                Some(kind) => {
                    let tree = engine.children_hierarchy(&kind, &id, depth).await?;
                    Ok(serde_json::to_value(ChildrenStatus::new(&tree))?)
                }
                None => {
                    let tree = engine.children_status(&id, depth).await?;
                    Ok(serde_json::to_value(ChildrenStatus::new(&tree))?)
                }
            }
        }

        Command::Simulate {
            inputs,
            event,
            trials,
            seed,
            max_trials,
            resources,
        } => {
            let engine = build_engine(&inputs, trials)?;
            let event = read_event(&event)?;
            let mut options = AnalysisOptions::new().with_utilization(read_utilization(resources.as_deref())?);
            options.seed = seed;
            if let Some(cap) = max_trials {
                options = options.with_budget(Arc::new(TrialCapBudget(cap)));
            }
            let report = engine.simulate(&event, &options).await?;
            tracing::info!("{}", report.generate_text());
            Ok(serde_json::to_value(&report)?)
        }

        Command::Health { inputs } => {
            let engine = build_engine(&inputs, None)?;
            Ok(serde_json::to_value(engine.health().await)?)
        }
    }
}

fn build_engine(inputs: &Inputs, trials: Option<usize>) -> anyhow::Result<ImpactEngine> {
    let mut config = match &inputs.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(trials) = trials {
        config.simulation = config.simulation.with_trials(trials);
    }

    let snapshot = GraphSnapshot::load(&inputs.snapshot)
        .with_context(|| format!("loading snapshot {}", inputs.snapshot.display()))?;
    let store = InMemoryGraphStore::from_snapshot(snapshot)?;
    tracing::debug!(nodes = store.node_count(), edges = store.edge_count(), "snapshot loaded");

    Ok(ImpactEngine::new(Arc::new(store), config)?)
}

fn read_event(path: &Path) -> anyhow::Result<ChangeEvent> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading event {}", path.display()))?;
    ChangeEvent::from_json_str(&text).with_context(|| format!("parsing event {}", path.display()))
}

fn read_utilization(path: Option<&Path>) -> anyhow::Result<PoolUtilization> {
    let Some(path) = path else {
        return Ok(PoolUtilization::new());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading resources {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing resources {}", path.display()))
}

fn ids(raw: Vec<String>) -> Vec<EntityId> {
    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(EntityId::new)
        .collect()
}
