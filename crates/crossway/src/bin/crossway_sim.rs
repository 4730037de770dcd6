//! # CROSSWAY Simulation
//!
//! Headless driver: builds a loop of intersections, releases vehicles onto
//! it and prints a traffic report on exit.
//!
//! ## Usage
//!
//! ```bash
//! crossway_sim --config crossway.toml --vehicles 6 --intersections 3 --duration 30
//! ```

use std::process::ExitCode;
use std::time::Duration;

use crossway::{Simulation, SimulationReport};
use crossway_core::CrosswayConfig;
use tracing::Level;

fn main() -> ExitCode {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         CROSSWAY                                                 ║");
    println!("║         INTERSECTION TRAFFIC SIMULATION                          ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    // Parse command line arguments (simple parsing, no external deps)
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut vehicles: Option<usize> = None;
    let mut intersections: Option<usize> = None;
    let mut duration_secs = 30u64;
    let mut log_level = Level::INFO;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--vehicles" | "-v" => {
                if i + 1 < args.len() {
                    vehicles = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--intersections" | "-n" => {
                if i + 1 < args.len() {
                    intersections = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--duration" | "-d" => {
                if i + 1 < args.len() {
                    duration_secs = args[i + 1].parse().unwrap_or(30);
                    i += 1;
                }
            }
            "--log-level" | "-l" => {
                if i + 1 < args.len() {
                    log_level = args[i + 1].parse().unwrap_or(Level::INFO);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: crossway_sim [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <FILE>          TOML configuration file");
                println!("  -v, --vehicles <NUM>         Number of vehicles (default: 6)");
                println!("  -n, --intersections <NUM>    Number of intersections (default: 3)");
                println!("  -d, --duration <SECS>        Run for N seconds (default: 30)");
                println!("  -l, --log-level <LEVEL>      trace|debug|info|warn|error (default: info)");
                println!("  -h, --help                   Show this help");
                return ExitCode::SUCCESS;
            }
            other => eprintln!("ignoring unknown argument: {other}"),
        }
        i += 1;
    }

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_thread_names(true)
        .with_target(false)
        .init();

    let mut config = match config_path.as_deref() {
        Some(path) => match CrosswayConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => CrosswayConfig::default(),
    };
    if let Some(n) = vehicles {
        config.simulation.vehicles = n;
    }
    if let Some(n) = intersections {
        config.simulation.intersections = n;
    }

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Intersections:      {}", config.simulation.intersections);
    println!("│ Vehicles:           {}", config.simulation.vehicles);
    println!(
        "│ Light Cycle:        {}-{} ms",
        config.light.min_cycle_ms, config.light.max_cycle_ms
    );
    println!("│ Gate Tick:          {} ms", config.gate.tick_interval_ms);
    println!("│ Patience:           {} ms", config.simulation.patience_ms);
    println!("│ Duration:           {duration_secs} seconds");
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let mut simulation = match Simulation::new(config) {
        Ok(simulation) => simulation,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match simulation.run_for(Duration::from_secs(duration_secs)) {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_report(report: &SimulationReport) {
    println!();
    println!("┌─ TRAFFIC REPORT ────────────────────────────────────────────────┐");
    println!("│ Entered:            {}", report.entered);
    println!("│ Left:               {}", report.left);
    println!("│ Gave Up:            {}", report.gave_up);
    println!("│ Avg Wait:           {:?}", report.average_wait());
    println!("│ Max Wait:           {:?}", report.max_wait);
    for (id, crossings) in report.crossings.iter().enumerate() {
        println!("│ Intersection {id:<3}    {crossings} crossings");
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
}
