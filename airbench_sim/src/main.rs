//! airbench flight test CLI
//!
//! Run scripted flight sequences against the simulated vehicle.

use airbench_core::{Settings, SettingsProvider};
use airbench_sim::{FlightExport, FlightTestRunner, ScenarioId, ScenarioResult};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// airbench deterministic flight test CLI
#[derive(Parser, Debug)]
#[command(name = "airbench-sim")]
#[command(about = "Run deterministic flight-sequence tests", long_about = None)]
struct Args {
    /// Master seed for determinism (defaults to the settings seed)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Scenario to run (simple_flight, ungrounded_command, arm_before_enable,
    /// takeoff_before_arm, land_timeout, command_before_start, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// JSON settings file with vehicle profiles and the clock step
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Vehicle profile to fly
    #[arg(long, default_value = airbench_core::SIMPLE_FLIGHT)]
    vehicle: String,

    /// Status log file (one per scenario when running several)
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Export the flight trace to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

/// `log.txt` becomes `log.land_timeout.txt` when several scenarios share one path.
fn scenario_log_path(base: &Path, scenario: ScenarioId, several: bool) -> PathBuf {
    if !several {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "status".to_string());
    let name = match base.extension() {
        Some(ext) => format!("{stem}.{}.{}", scenario.name(), ext.to_string_lossy()),
        None => format!("{stem}.{}", scenario.name()),
    };
    base.with_file_name(name)
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("airbench flight test harness v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let settings = match &args.settings {
        Some(path) => Settings::from_file(path).unwrap_or_else(|e| {
            eprintln!("Error: failed to load {}: {}", path.display(), e);
            std::process::exit(1);
        }),
        None => Settings::default(),
    };

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
            eprintln!("Available scenarios: {}, all", names.join(", "));
            std::process::exit(1);
        })]
    };

    if args.export.is_some() && scenarios.len() > 1 {
        eprintln!("Error: --export only supports a single scenario, not 'all'");
        std::process::exit(1);
    }

    if !settings.profile_names().contains(&args.vehicle) {
        eprintln!(
            "Error: unknown vehicle profile '{}' (available: {})",
            args.vehicle,
            settings.profile_names().join(", ")
        );
        std::process::exit(1);
    }

    let seed = args.seed.unwrap_or(settings.seed);
    let runner = FlightTestRunner::new(seed)
        .with_settings(settings)
        .with_vehicle(&args.vehicle);

    // Run scenarios
    let several = scenarios.len() > 1;
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for scenario in &scenarios {
        let runner = match &args.log {
            Some(base) => runner.clone().with_log_path(scenario_log_path(base, *scenario, several)),
            None => runner.clone(),
        };
        let result = runner.run(*scenario);

        if !args.json {
            if result.passed {
                info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    scenario.name(),
                    seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
        all_results.push(result);
    }

    if let Some(export_path) = &args.export {
        if let Some(result) = all_results.first() {
            let export = FlightExport::from_result(result);
            match export.write_to_file(export_path) {
                Ok(()) => info!("Exported {} frames to {}", export.frames.len(), export_path.display()),
                Err(e) => error!("Failed to write export: {:?}", e),
            }
        }
    }

    // Summary
    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize results: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
