//! Walker CLI - run locomotion scenarios headless and inspect the trace

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use walker::config::ControllerConfig;
use walker::scenario::Scenario;
use walker::sim::{SimulationReport, Simulation};

const SAMPLE_SCENARIO: &str = include_str!("../../scenarios/crouch_under_beam.toml");

#[derive(Parser)]
#[command(name = "walker")]
#[command(about = "First-person locomotion controller CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and write the per-frame trace as JSON
    Simulate {
        /// Path to the scenario TOML file
        scenario: PathBuf,
        /// Controller config that replaces the scenario's [controller] table
        #[arg(long, env = "WALKER_CONFIG")]
        config: Option<PathBuf>,
        /// Write the trace here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Override the scenario frame rate
        #[arg(long)]
        fps: Option<f32>,
        /// Print only the final state and position
        #[arg(long)]
        summary: bool,
    },
    /// Validate a controller config file
    CheckConfig {
        /// Path to the config TOML file
        path: PathBuf,
    },
    /// Write a sample scenario to start from
    Init {
        /// Destination file
        #[arg(default_value = "scenario.toml")]
        path: PathBuf,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("walker=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            scenario,
            config,
            output,
            fps,
            summary,
        } => simulate(&scenario, config.as_deref(), output.as_deref(), fps, summary),
        Commands::CheckConfig { path } => check_config(&path),
        Commands::Init { path } => init_scenario(&path),
    }
}

// =============================================================================
// Simulate Command
// =============================================================================

fn simulate(
    path: &Path,
    config: Option<&Path>,
    output: Option<&Path>,
    fps: Option<f32>,
    summary: bool,
) {
    let mut scenario = match Scenario::from_file(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(config_path) = config {
        match ControllerConfig::from_file(config_path) {
            Ok(c) => scenario.controller = c,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
    if let Some(fps) = fps {
        scenario.frame_rate = fps;
    }

    info!(
        scenario = %scenario.name,
        parts = scenario.parts.len(),
        duration = scenario.duration,
        "running scenario"
    );

    let report = match Simulation::from_scenario(&scenario).and_then(|mut sim| sim.run(&scenario)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let json = if summary {
        serde_json::to_string_pretty(&summarize(&report))
    } else {
        serde_json::to_string_pretty(&report)
    };
    let json = match json {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error: Failed to serialize trace: {}", e);
            std::process::exit(1);
        }
    };

    match output {
        Some(out) => {
            if let Err(e) = std::fs::write(out, json) {
                eprintln!("Error: Failed to write {}: {}", out.display(), e);
                std::process::exit(1);
            }
            println!("Wrote {} frames to {}", report.frames.len(), out.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = writeln!(stdout, "{}", json) {
                eprintln!("Error: Failed to write trace: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn summarize(report: &SimulationReport) -> serde_json::Value {
    let events = report.frames.iter().map(|f| f.events.len()).sum::<usize>();
    serde_json::json!({
        "scenario": report.scenario,
        "frames": report.frames.len(),
        "fixed_steps": report.fixed_steps,
        "events": events,
        "final_state": report.final_state,
        "final_position": report.final_position,
    })
}

// =============================================================================
// Config Commands
// =============================================================================

fn check_config(path: &Path) {
    match ControllerConfig::from_file(path) {
        Ok(config) => {
            println!("{} is valid", path.display());
            println!("  crouch mode:     {:?}", config.crouch.mode);
            println!("  standing height: {}", config.body.standing_height);
            println!("  crouched height: {}", config.crouch.crouched_height);
            println!("  ceiling method:  {:?}", config.ceiling.method);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_scenario(path: &Path) {
    if path.exists() {
        eprintln!("Error: '{}' already exists", path.display());
        std::process::exit(1);
    }
    if let Err(e) = std::fs::write(path, SAMPLE_SCENARIO) {
        eprintln!("Error: Failed to write {}: {}", path.display(), e);
        std::process::exit(1);
    }
    println!("Created {}", path.display());
    println!("  walker simulate {}", path.display());
}
