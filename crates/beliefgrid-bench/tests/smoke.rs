use std::fs;
use std::path::Path;

use beliefgrid_bench::config::BenchmarkConfig;
use beliefgrid_bench::scenario::ScenarioRunner;
use sha2::{Digest, Sha256};
use tempfile::tempdir;

fn load_config(output_dir: &Path) -> BenchmarkConfig {
    let yaml = format!(
        r#"
run_id: "test_smoke"
scenario:
  seed: 4242
  steps: 400
  dt: 0.025
  area:
    shape: "rectangle"
    width: 16.0
    height: 9.0
  start: {{ x: 1.0, y: -1.0 }}
  velocity: {{ x: 2.5, y: 1.5 }}
  velocity_noise: 0.4
  attention:
    focus_seconds: 1.0
    away_seconds: 1.5
estimator:
  number_of_bins: 360
  number_of_samples: 40
  reaction_time: 0.1
outputs:
  jsonl: "{jsonl}"
  summary_md: "{summary}"
  plots_dir: "{plots}"
logging:
  enable_structured: false
"#,
        jsonl = output_dir.join("updates.jsonl").display(),
        summary = output_dir.join("summary.md").display(),
        plots = output_dir.join("plots").display()
    );

    let mut cfg: BenchmarkConfig = serde_yaml::from_str(&yaml).expect("valid yaml");
    cfg.validate().expect("config validates");
    cfg
}

fn jsonl_digest(path: &Path) -> String {
    let jsonl = fs::read_to_string(path).expect("jsonl readable");
    let mut hasher = Sha256::new();
    hasher.update(jsonl.as_bytes());
    hex::encode(hasher.finalize())
}

#[test]
fn scenario_smoke_test_is_reproducible_for_a_seed() {
    let mut digests = Vec::new();
    for _ in 0..2 {
        let dir = tempdir().expect("temp dir");
        let config = load_config(dir.path());
        let outputs = config.resolved_outputs();

        let runner = ScenarioRunner::new(config, outputs).expect("runner created");
        let summary = runner.run().expect("scenario completes");

        assert_eq!(summary.steps, 400);
        assert!(summary.updates > 0);
        assert_eq!(summary.rows_written, summary.updates);
        assert!(summary.summary_path.exists(), "summary markdown missing");
        if let Some(plot_path) = summary.plot_path {
            assert!(plot_path.exists(), "plot path reported but missing on disk");
        }

        let visible = summary.analytics.bucket("visible").expect("visible bucket");
        let hidden = summary.analytics.bucket("hidden").expect("hidden bucket");
        assert!(visible.updates > 0 && hidden.updates > 0);
        assert_eq!(visible.updates + hidden.updates, summary.updates);

        let markdown = fs::read_to_string(&summary.summary_path).expect("summary readable");
        assert!(markdown.contains("| visible |"));
        assert!(markdown.contains("| hidden |"));

        for line in fs::read_to_string(&summary.jsonl_path)
            .expect("jsonl readable")
            .lines()
        {
            let row: serde_json::Value = serde_json::from_str(line).expect("row decodes");
            assert_eq!(row["run_id"], "test_smoke");
            assert!(row["error"].as_f64().expect("error field") >= 0.0);
        }

        digests.push(jsonl_digest(&summary.jsonl_path));
    }

    assert_eq!(
        digests[0], digests[1],
        "JSONL output differs between runs with the same seed"
    );
}
