//! WorldView DST Simulator CLI
//!
//! Run deterministic scenarios against the map core.

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use worldview_core::BackendKind;
use worldview_sim::scenarios::ScenarioId;
use worldview_sim::{ScenarioResult, ScenarioRunner};

/// WorldView Deterministic Simulation Testing CLI
#[derive(Parser, Debug)]
#[command(name = "worldview-sim")]
#[command(about = "Run deterministic simulation tests for the WorldView map core", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (pan_storm, feed_burst, pause_resume, stale_store, flash_expiry, backend_parity, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Backend kind for single-backend scenarios (vector, compositor, both)
    #[arg(short, long, default_value = "both")]
    backend: String,

    /// Records per feed refresh
    #[arg(short, long, default_value = "200")]
    markers: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("WorldView DST Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: pan_storm, feed_burst, pause_resume, stale_store, flash_expiry, backend_parity, all");
            std::process::exit(1);
        })]
    };

    let backends: Vec<BackendKind> = match args.backend.to_lowercase().as_str() {
        "vector" => vec![BackendKind::Vector],
        "compositor" => vec![BackendKind::Compositor],
        "both" => vec![BackendKind::Vector, BackendKind::Compositor],
        other => {
            eprintln!("Error: Unknown backend: {}", other);
            eprintln!("Available backends: vector, compositor, both");
            std::process::exit(1);
        }
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64
    } else {
        args.seed
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("Failed to build tokio runtime");

    // Track results
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    // Run simulations
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);

        for scenario in &scenarios {
            // Parity already covers both kinds in one run.
            let kinds: &[BackendKind] = if *scenario == ScenarioId::BackendParity {
                &backends[..1]
            } else {
                &backends
            };

            for &kind in kinds {
                let runner = ScenarioRunner::new(seed)
                    .with_backend(kind)
                    .with_markers(args.markers);
                let result = rt.block_on(runner.run(*scenario));

                if !args.json {
                    if result.passed {
                        info!("✓ {} [{:?}] (seed={}) PASSED", scenario.name(), kind, seed);
                    } else {
                        error!("✗ {} [{:?}] (seed={}) FAILED: {}",
                            scenario.name(),
                            kind,
                            seed,
                            result.failure_reason.as_deref().unwrap_or("unknown")
                        );
                    }
                }

                if !result.passed {
                    failed_count += 1;
                }

                all_results.push(result);
            }
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "backend": r.backend,
                    "passed": r.passed,
                    "frames": r.total_frames,
                    "time_secs": r.final_time_secs,
                    "failure_reason": r.failure_reason,
                    "metrics": r.metrics,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary).unwrap());
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            // List failed seeds
            for result in &all_results {
                if !result.passed {
                    error!("  - {} [{:?}] seed={}: {}",
                        result.scenario.name(),
                        result.backend,
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
