use std::fs;
use std::path::Path;

use beliefgrid_bench::config::BenchmarkConfig;
use beliefgrid_bench::logging::init_logging;
use beliefgrid_bench::scenario::ScenarioRunner;
use tempfile::tempdir;

fn load_config(output_dir: &Path) -> BenchmarkConfig {
    let yaml = format!(
        r#"
run_id: "test_telemetry"
scenario:
  seed: 7
  steps: 2000
  dt: 0.025
  area:
    shape: "square"
    radius: 4.0
  start: {{ x: 0.0, y: 0.0 }}
  velocity: {{ x: 1.5, y: -0.5 }}
  attention:
    focus_seconds: 1.0
    away_seconds: 1.0
estimator:
  number_of_bins: 256
  number_of_samples: 20
outputs:
  jsonl: "{jsonl}"
  summary_md: "{summary}"
  plots_dir: "{plots}"
logging:
  enable_structured: true
  tracing_level: "info"
"#,
        jsonl = output_dir.join("updates.jsonl").display(),
        summary = output_dir.join("summary.md").display(),
        plots = output_dir.join("plots").display()
    );

    let mut cfg: BenchmarkConfig = serde_yaml::from_str(&yaml).expect("valid yaml");
    cfg.validate().expect("config validates");
    cfg
}

#[test]
fn telemetry_summary_counts_every_update_after_flush() {
    let dir = tempdir().expect("temp dir");
    let config = load_config(dir.path());
    let outputs = config.resolved_outputs();
    let logging = config.logging.clone();

    let guard = init_logging(&logging, &outputs)
        .expect("logging initialised")
        .expect("structured logging enabled");
    let runner = ScenarioRunner::new(config, outputs).expect("runner created");
    let mut summary = runner.run().expect("scenario completes");
    assert_eq!(summary.telemetry_path.as_ref(), Some(&guard.telemetry_path));
    assert!(summary.telemetry_outputs.is_none());

    drop(guard);
    let rows_written = summary.rows_written;
    let telemetry = summary
        .summarise_telemetry()
        .expect("telemetry summarised")
        .expect("telemetry outputs");

    assert_eq!(telemetry.summary.updates.count, rows_written);
    assert_eq!(
        telemetry.summary.updates.visible + telemetry.summary.updates.hidden,
        rows_written
    );
    assert!(telemetry.json_path.exists());

    let markdown = fs::read_to_string(&summary.summary_path).expect("summary readable");
    assert!(markdown.contains(&format!(
        "Update events captured: {}",
        summary.rows_written
    )));
}
