#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a terminal crowd scenario and reports a summary.

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use terminal_crowd_system_simulation::{apply, query, Command, Event, ScenarioConfig};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Runs a pedestrian crowd simulation of an airport terminal.
#[derive(Debug, Parser)]
#[command(name = "terminal-crowd", author, version, about)]
struct CliArgs {
    /// Scenario file describing the map, the agents and the engine settings.
    #[arg(long, value_name = "PATH", default_value = "demos/terminal.toml")]
    scenario: PathBuf,

    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Overrides the scenario's tick length in milliseconds.
    #[arg(long, value_name = "MS")]
    time_step_ms: Option<u64>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Entry point for the terminal crowd command-line interface.
fn main() -> Result<()> {
    let args = CliArgs::parse();
    install_tracing(&args.log_level)?;

    let text = fs::read_to_string(&args.scenario)
        .with_context(|| format!("failed to read scenario {}", args.scenario.display()))?;
    let mut scenario = ScenarioConfig::from_toml(&text)
        .with_context(|| format!("invalid scenario {}", args.scenario.display()))?;
    if let Some(time_step_ms) = args.time_step_ms {
        scenario.simulation.time_step_ms = time_step_ms;
    }
    let mut simulation = scenario
        .build()
        .context("failed to build simulation from scenario")?;

    let dt = simulation.time_step();
    info!(
        ticks = args.ticks,
        time_step_ms = dt.as_millis() as u64,
        "running scenario"
    );
    run(&mut simulation, args.ticks, dt);

    println!("{}", query::summary(&simulation));
    Ok(())
}

fn install_tracing(default_level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)
            .with_context(|| format!("invalid log level `{default_level}`"))?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn run(simulation: &mut terminal_crowd_system_simulation::Simulation, ticks: u64, dt: Duration) {
    let mut events = Vec::new();
    for _ in 0..ticks {
        apply(simulation, Command::Tick { dt }, &mut events);
        for event in events.drain(..) {
            match event {
                Event::GoalReached { agent, position } => {
                    debug!(agent = agent.get(), ?position, "goal reached");
                }
                Event::StuckEscalated { agent, escalation } => {
                    info!(agent = agent.get(), ?escalation, "agent escalated");
                }
                Event::AgentSeated { agent, chair } => {
                    debug!(agent = agent.get(), chair = chair.get(), "agent seated");
                }
                _ => {}
            }
        }
    }
}
