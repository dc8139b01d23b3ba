use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const UPDATE_TARGET: &str = "beliefgrid_bench::update";
pub const RUN_TARGET: &str = "beliefgrid_bench::run";
const ESTIMATOR_TARGET: &str = "beliefgrid_core::estimator";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize)]
pub struct TelemetrySummary {
    pub updates: UpdateTelemetrySummary,
    /// Warnings from the estimator about degenerate updates.
    pub recoveries: usize,
    pub events_by_target: BTreeMap<String, usize>,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateTelemetrySummary {
    pub count: usize,
    pub visible: usize,
    pub hidden: usize,
    pub avg_error: Option<f64>,
    pub avg_entropy: Option<f64>,
}

#[derive(Debug)]
struct Average {
    sum: f64,
    count: usize,
}

impl Average {
    fn new() -> Self {
        Self { sum: 0.0, count: 0 }
    }

    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Aggregates the JSON lines written by the structured logger.
pub fn summarise_telemetry(path: &Path) -> Result<TelemetrySummary, TelemetryError> {
    if !path.exists() {
        return Ok(TelemetrySummary::default());
    }

    let file = File::open(path).map_err(|source| TelemetryError::Io {
        context: "opening telemetry log",
        source,
    })?;
    let reader = BufReader::new(file);

    let mut summary = TelemetrySummary::default();
    let mut error_avg = Average::new();
    let mut entropy_avg = Average::new();

    for line in reader.lines() {
        let line = line.map_err(|source| TelemetryError::Io {
            context: "reading telemetry line",
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let payload: Value = serde_json::from_str(&line)?;
        let target = payload
            .get("target")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let level = payload
            .get("level")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let fields = payload
            .get("fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        *summary
            .events_by_target
            .entry(target.to_string())
            .or_insert(0) += 1;

        match target {
            UPDATE_TARGET => {
                let updates = &mut summary.updates;
                updates.count += 1;
                match fields.get("visible").and_then(Value::as_bool) {
                    Some(true) => updates.visible += 1,
                    Some(false) => updates.hidden += 1,
                    None => {}
                }
                if let Some(error) = fields.get("error").and_then(Value::as_f64) {
                    error_avg.add(error);
                }
                if let Some(entropy) = fields.get("entropy").and_then(Value::as_f64) {
                    entropy_avg.add(entropy);
                }
            }
            ESTIMATOR_TARGET if level.eq_ignore_ascii_case("warn") => {
                summary.recoveries += 1;
            }
            _ => {}
        }
    }

    summary.updates.avg_error = error_avg.mean();
    summary.updates.avg_entropy = entropy_avg.mean();
    Ok(summary)
}

pub fn write_summary_outputs(
    telemetry_path: &Path,
    output_dir: &Path,
) -> Result<Option<TelemetryOutputs>, TelemetryError> {
    if !telemetry_path.exists() {
        return Ok(None);
    }

    let summary = summarise_telemetry(telemetry_path)?;
    let json_path = output_dir.join("telemetry_summary.json");
    let md_path = output_dir.join("telemetry_summary.md");

    std::fs::write(
        &json_path,
        serde_json::to_vec_pretty(&summary).map_err(TelemetryError::from)?,
    )
    .map_err(|source| TelemetryError::Io {
        context: "writing telemetry summary json",
        source,
    })?;

    let markdown = render_markdown(&summary, telemetry_path);
    std::fs::write(&md_path, markdown).map_err(|source| TelemetryError::Io {
        context: "writing telemetry summary markdown",
        source,
    })?;

    Ok(Some(TelemetryOutputs {
        summary,
        json_path,
        markdown_path: md_path,
    }))
}

pub fn append_highlights_to_markdown(
    summary_path: &Path,
    outputs: &TelemetryOutputs,
) -> Result<(), TelemetryError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(summary_path)
        .map_err(|source| TelemetryError::Io {
            context: "opening summary markdown for telemetry append",
            source,
        })?;

    let mut section = String::new();
    section.push_str("\n## Telemetry Highlights\n");
    section.push_str(&update_lines(&outputs.summary));
    section.push_str(&format!(
        "- Degenerate updates recovered: {}\n",
        outputs.summary.recoveries
    ));

    write!(file, "{section}").map_err(|source| TelemetryError::Io {
        context: "writing telemetry highlights",
        source,
    })?;

    Ok(())
}

fn update_lines(summary: &TelemetrySummary) -> String {
    let updates = &summary.updates;
    let mut lines = format!(
        "- Update events captured: {} ({} visible, {} hidden)\n",
        updates.count, updates.visible, updates.hidden
    );
    if let Some(value) = updates.avg_error {
        lines.push_str(&format!("- Avg tracking error: {value:.3}\n"));
    }
    if let Some(value) = updates.avg_entropy {
        lines.push_str(&format!("- Avg belief entropy: {value:.3}\n"));
    }
    lines
}

fn render_markdown(summary: &TelemetrySummary, telemetry_path: &Path) -> String {
    let mut output = String::new();
    output.push_str("# Telemetry Summary\n\n");
    output.push_str(&format!("- Source: `{}`\n", telemetry_path.display()));
    output.push('\n');

    output.push_str("## Belief Updates\n");
    output.push_str(&update_lines(summary));
    output.push_str(&format!("- Recoveries: {}\n", summary.recoveries));
    output.push('\n');

    output.push_str("## Events by Target\n");
    if summary.events_by_target.is_empty() {
        output.push_str("- <none>\n");
    } else {
        for (target, count) in &summary.events_by_target {
            output.push_str(&format!("- {target}: {count}\n"));
        }
    }
    output
}

#[derive(Debug)]
pub struct TelemetryOutputs {
    pub summary: TelemetrySummary,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
}
