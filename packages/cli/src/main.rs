use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use deadlock_twin::{Engine, Matrix, ProcessId, Scenario, Units};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Deadlock Twin CLI
/// Runs one operation against a scenario file and prints the outcome
#[derive(Parser)]
#[command(name = "deadlock-twin")]
#[command(version, about = "Banker's-Algorithm and deadlock simulator", long_about = None)]
struct Cli {
    /// Scenario file (.toml or .json)
    scenario: PathBuf,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the loaded state
    Show,
    /// Run the safety algorithm
    Check,
    /// Ask for resources on behalf of a process
    Request {
        /// Process index
        #[arg(short, long)]
        process: usize,
        /// Units per resource type, e.g. "1,0,2"
        #[arg(long, value_parser = parse_vector)]
        vector: ::std::vec::Vec<Units>,
    },
    /// Release everything a process holds
    Release {
        /// Process index
        #[arg(short, long)]
        process: usize,
    },
    /// Install a whole allocation matrix, e.g. "0,1;2,0"
    Batch {
        /// Rows separated by ';', entries by ','
        #[arg(long, value_parser = parse_matrix)]
        matrix: Matrix,
    },
    /// Find deadlocked processes
    Detect,
    /// Detect, then terminate deadlocked processes
    Resolve,
}

fn parse_vector(text: &str) -> Result<Vec<Units>, String> {
    text.split(',')
        .map(str::trim)
        .map(|part| part.parse::<Units>().map_err(|e| format!("bad entry {part:?}: {e}")))
        .collect()
}

fn parse_matrix(text: &str) -> Result<Matrix, String> {
    let rows = text
        .split(';')
        .map(parse_vector)
        .collect::<Result<Vec<_>, _>>()?;
    Matrix::try_from(rows).map_err(|e| e.to_string())
}

fn join_ids<'a>(ids: impl IntoIterator<Item = &'a ProcessId>) -> String {
    ids.into_iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn render_state(engine: &Engine) -> String {
    let state = engine.state();
    let table = state.table();
    let mut out = format!(
        "total {}  available {}\n",
        state.ledger().total(),
        state.available()
    );
    for p in (0..state.process_count()).map(ProcessId) {
        let status = if table.is_live(p) { "" } else { "  (terminated)" };
        out.push_str(&format!(
            "{p}: max {:?} alloc {:?} need {:?} request {:?}{status}\n",
            table.max_claim(p),
            table.allocation(p),
            table.need(p),
            table.request(p),
        ));
    }
    out
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let scenario = Scenario::load(&cli.scenario)
        .with_context(|| format!("loading {}", cli.scenario.display()))?;
    let mut engine = Engine::from_scenario(&scenario)
        .with_context(|| format!("configuring {}", cli.scenario.display()))?;
    info!("Loaded {} ({} processes)", cli.scenario.display(), engine.state().process_count());

    let process = |index: usize| -> Result<ProcessId> {
        if index >= engine.state().process_count() {
            bail!("no process P{index}: the scenario has {}", engine.state().process_count());
        }
        Ok(ProcessId(index))
    };

    match cli.command {
        Commands::Show => emit(cli.json, engine.state(), || render_state(&engine))?,
        Commands::Check => {
            let report = engine.is_safe();
            emit(cli.json, &report, || {
                if report.safe {
                    format!("SAFE  sequence {}", report.sequence)
                } else {
                    format!("UNSAFE  cannot finish: {}", join_ids(&report.stuck))
                }
            })?;
        }
        Commands::Request { process: index, vector } => {
            let p = process(index)?;
            if vector.len() != engine.state().resource_count() {
                bail!(
                    "expected {} entries in --vector, got {}",
                    engine.state().resource_count(),
                    vector.len()
                );
            }
            let outcome = engine.request_resources(p, &vector);
            emit(cli.json, &outcome, || match &outcome {
                Ok(grant) => format!("GRANTED  sequence {}", grant.sequence),
                Err(denial) => format!("DENIED  {denial}"),
            })?;
        }
        Commands::Release { process: index } => {
            let p = process(index)?;
            let released = engine.release_resources(p);
            emit(cli.json, &released, || {
                format!("{p} released {released}, available {}", engine.available())
            })?;
        }
        Commands::Batch { matrix } => {
            let state = engine.state();
            if matrix.rows() != state.process_count() || matrix.cols() != state.resource_count() {
                bail!(
                    "expected a {}x{} matrix, got {}x{}",
                    state.process_count(),
                    state.resource_count(),
                    matrix.rows(),
                    matrix.cols()
                );
            }
            let outcome = engine.request_batch(&matrix);
            emit(cli.json, &outcome, || match &outcome {
                Ok(grant) => format!("GRANTED  sequence {}", grant.sequence),
                Err(denial) => format!("DENIED  {denial}"),
            })?;
        }
        Commands::Detect => {
            let report = engine.detect_deadlock();
            emit(cli.json, &report, || {
                if report.is_deadlocked() {
                    format!("DEADLOCK  {}", join_ids(&report.deadlocked))
                } else {
                    format!("no deadlock, completion order {}", join_ids(&report.completion_order))
                }
            })?;
        }
        Commands::Resolve => {
            let (report, steps) = engine.recover();
            emit(cli.json, &steps, || {
                let mut out = format!("deadlocked {}\n", join_ids(&report.deadlocked));
                for step in &steps {
                    out.push_str(&format!(
                        "terminate {} (holds {}), available -> {}\n",
                        step.victim, step.resources_released, step.available_after
                    ));
                }
                out
            })?;
        }
    }

    Ok(())
}
