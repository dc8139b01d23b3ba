use std::path::PathBuf;

use clap::Parser;

use beliefgrid_bench::config::{BenchmarkConfig, ResolvedOutputs};
use beliefgrid_bench::logging::init_logging;
use beliefgrid_bench::scenario::ScenarioRunner;

/// Tracking benchmark harness for the belief-state location estimator.
#[derive(Debug, Parser)]
#[command(
    name = "beliefgrid-bench",
    author,
    version,
    about = "Deterministic belief-tracking scenario harness"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/bench.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the number of simulation steps.
    #[arg(long, value_name = "STEPS")]
    steps: Option<usize>,

    /// Override the scenario RNG seed.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Exit after validating the configuration (no scenario is run).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = BenchmarkConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(steps) = cli.steps {
        config.scenario.steps = steps;
    }

    if let Some(seed) = cli.seed {
        config.scenario.seed = Some(seed);
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    let steps = config.scenario.steps;
    let area = config.scenario.area;
    let logging = config.logging.clone();

    println!(
        "Loaded configuration '{run_id}': {steps} steps over a {:.2} x {:.2} area, {} requested bins",
        area.width(),
        area.height(),
        config.estimator.number_of_bins
    );

    let runner = ScenarioRunner::new(config, outputs.clone())?;
    let layout = runner.grid().layout();
    println!(
        "Grid layout: {} cols x {} rows ({} bins)",
        layout.cols,
        layout.rows,
        layout.bin_count()
    );

    if cli.validate_only {
        println!("Validation-only mode: scenario execution skipped.");
        return Ok(());
    }

    let logging_guard = init_logging(&logging, &outputs)?;
    let mut summary = runner.run()?;
    // Flushes the non-blocking writer so the summary sees every event.
    drop(logging_guard);
    summary.summarise_telemetry()?;
    println!(
        "Scenario complete for '{run_id}': {} steps → {} updates, {} rows at {}",
        summary.steps,
        summary.updates,
        summary.rows_written,
        summary.jsonl_path.display()
    );
    for bucket in &summary.analytics.buckets {
        println!(
            "  {:<8} {:>5} updates, mean error {:.3} [{:.3}, {:.3}]",
            bucket.label, bucket.updates, bucket.mean_error, bucket.ci95.0, bucket.ci95.1
        );
    }
    println!("Summary table: {}", summary.summary_path.display());
    if let Some(plot_path) = summary.plot_path.as_ref() {
        println!("Tracking error plot: {}", plot_path.display());
    }
    if let Some(telemetry_path) = summary.telemetry_path.as_ref() {
        println!("Telemetry log: {}", telemetry_path.display());
    }
    if let Some(outputs) = summary.telemetry_outputs.as_ref() {
        println!("Telemetry summary (JSON): {}", outputs.json_path.display());
        println!(
            "Telemetry summary (Markdown): {}",
            outputs.markdown_path.display()
        );
        println!(
            "  Update events: {} captured, {} recoveries",
            outputs.summary.updates.count, outputs.summary.recoveries
        );
    }

    Ok(())
}
