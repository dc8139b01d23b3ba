//! Synthetic orchestrator: a ball bouncing inside the area while attention
//! alternates on a fixed schedule. Each belief update becomes one JSONL row.

mod motion;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use beliefgrid_core::{
    EstimatorError, GeometryError, GridSpec, LocationEstimator, Percept, UpdateReport, Vec2,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use statrs::StatsError;
use statrs::distribution::Normal;
use thiserror::Error;
use tracing::{Level, event};

use crate::analytics::{AnalyticsCollector, AnalyticsError, AnalyticsSummary, UpdateSample};
use crate::config::{BenchmarkConfig, ResolvedOutputs};
use crate::telemetry::{
    RUN_TARGET, TelemetryError, TelemetryOutputs, UPDATE_TARGET, append_highlights_to_markdown,
    write_summary_outputs,
};

pub use motion::{AttentionSchedule, MovingObject};

/// Primary entry point for running a tracking scenario.
pub struct ScenarioRunner {
    config: BenchmarkConfig,
    outputs: ResolvedOutputs,
    grid: GridSpec,
    jitter: Option<Normal>,
    logging_enabled: bool,
}

/// Summary details returned after a run.
pub struct RunSummary {
    pub steps: usize,
    pub updates: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub plot_path: Option<PathBuf>,
    pub telemetry_path: Option<PathBuf>,
    pub telemetry_outputs: Option<TelemetryOutputs>,
    pub analytics: AnalyticsSummary,
}

impl RunSummary {
    /// Summarises the structured log into JSON and markdown and appends the
    /// highlights to the summary table. The log writer is non-blocking, so
    /// call this only after the `LoggingGuard` has been dropped.
    pub fn summarise_telemetry(&mut self) -> Result<Option<&TelemetryOutputs>, RunnerError> {
        let Some(path) = self.telemetry_path.as_ref() else {
            return Ok(None);
        };
        self.telemetry_outputs = write_summary_outputs(path, &telemetry_dir(&self.summary_path))?;
        if let Some(outputs) = self.telemetry_outputs.as_ref() {
            append_highlights_to_markdown(&self.summary_path, outputs)?;
        }
        Ok(self.telemetry_outputs.as_ref())
    }
}

impl ScenarioRunner {
    /// Build a runner from a validated configuration.
    pub fn new(config: BenchmarkConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let grid = GridSpec::new(config.scenario.area, config.estimator.number_of_bins)?;
        let jitter = if config.scenario.velocity_noise > 0.0 {
            Some(Normal::new(0.0, config.scenario.velocity_noise)?)
        } else {
            None
        };

        Ok(Self {
            logging_enabled: config.logging.enable_structured,
            config,
            outputs,
            grid,
            jitter,
        })
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;
        if !self.outputs.plots_dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.outputs.plots_dir)?;
        }

        let scenario = &self.config.scenario;
        let mut estimator = LocationEstimator::new(
            self.grid.clone(),
            self.config.effective_estimator(),
            scenario.start,
        )?;
        let mut rng = StdRng::seed_from_u64(scenario.seed.unwrap_or(0));
        let mut object = MovingObject::new(scenario.area, scenario.start, scenario.velocity);
        let schedule = AttentionSchedule::new(&scenario.attention);

        if self.logging_enabled && tracing::enabled!(target: RUN_TARGET, Level::INFO) {
            let layout = self.grid.layout();
            event!(
                target: RUN_TARGET,
                Level::INFO,
                run_id = %self.config.run_id,
                cols = layout.cols as u64,
                rows = layout.rows as u64,
                steps = scenario.steps as u64,
                "run started"
            );
        }

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let mut analytics = AnalyticsCollector::new();
        let mut rows_written = 0usize;

        for step in 0..scenario.steps {
            let time = step as f64 * scenario.dt;
            object.advance(scenario.dt, self.jitter.as_ref(), &mut rng);
            let percept = Percept {
                focused: schedule.is_focused(time),
                position: Some(object.position()),
                velocity: Some(object.velocity()),
            };

            let Some(report) = estimator.step(scenario.dt, &percept)? else {
                continue;
            };

            let row = UpdateLogRow::new(
                &self.config.run_id,
                step,
                time,
                &percept,
                &report,
                self.grid.bin_to_coordinate(report.metrics.argmax_bin),
                object.position(),
            );
            self.log_update(&row);
            analytics.record_update(&UpdateSample {
                update_index: row.update_index,
                visible: row.visible,
                error: row.error,
                entropy: row.entropy,
                recovered: row.recovered,
            });

            serde_json::to_writer(&mut writer, &row)?;
            writer.write_all(b"\n")?;
            rows_written += 1;
        }

        writer.flush()?;

        let summary = analytics.finalize(&self.config.run_id);
        summary.write_markdown(&self.outputs.summary_md)?;
        let plot_path = match summary.render_plot(&self.outputs.plots_dir) {
            Ok(path) => Some(path),
            Err(err) => {
                eprintln!("WARN: {}", err);
                None
            }
        };

        if self.logging_enabled && tracing::enabled!(target: RUN_TARGET, Level::INFO) {
            event!(
                target: RUN_TARGET,
                Level::INFO,
                run_id = %self.config.run_id,
                updates = summary.updates as u64,
                recoveries = summary.recoveries as u64,
                "run complete"
            );
        }

        let telemetry_path = if self.logging_enabled {
            Some(telemetry_dir(&self.outputs.summary_md).join("telemetry.jsonl"))
        } else {
            None
        };

        Ok(RunSummary {
            steps: scenario.steps,
            updates: summary.updates,
            rows_written,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            plot_path,
            telemetry_path,
            telemetry_outputs: None,
            analytics: summary,
        })
    }

    fn log_update(&self, row: &UpdateLogRow<'_>) {
        if self.logging_enabled && tracing::enabled!(target: UPDATE_TARGET, Level::INFO) {
            event!(
                target: UPDATE_TARGET,
                Level::INFO,
                run_id = %row.run_id,
                update_index = row.update_index,
                visible = row.visible,
                error = row.error,
                entropy = row.entropy,
                argmax_bin = row.argmax_bin as u64,
                recovered = row.recovered
            );
        }
    }
}

fn telemetry_dir(summary_md: &Path) -> PathBuf {
    summary_md
        .parent()
        .map(Path::to_path_buf)
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct UpdateLogRow<'a> {
    run_id: &'a str,
    update_index: u64,
    step: usize,
    time: f64,
    focused: bool,
    visible: bool,
    true_position: Vec2,
    estimated_position: Vec2,
    error: f64,
    observed_bin: Option<usize>,
    argmax_bin: usize,
    max_probability: f64,
    entropy: f64,
    support: usize,
    estimated_displacement: Vec2,
    velocity_spread: f64,
    unnormalized_mass: Option<f64>,
    recovered: bool,
}

impl<'a> UpdateLogRow<'a> {
    fn new(
        run_id: &'a str,
        step: usize,
        time: f64,
        percept: &Percept<Vec2>,
        report: &UpdateReport<Vec2>,
        estimated_position: Vec2,
        true_position: Vec2,
    ) -> Self {
        Self {
            run_id,
            update_index: report.update_index,
            step,
            time,
            focused: percept.focused,
            visible: report.visible,
            true_position,
            estimated_position,
            error: (estimated_position - true_position).length(),
            observed_bin: report.observed_bin,
            argmax_bin: report.metrics.argmax_bin,
            max_probability: report.metrics.max_probability,
            entropy: report.metrics.entropy,
            support: report.metrics.support,
            estimated_displacement: report.estimated_displacement,
            velocity_spread: report.velocity_spread,
            unnormalized_mass: report.summary.map(|summary| summary.unnormalized_mass),
            recovered: report.recovered,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("invalid grid: {0}")]
    Geometry(#[from] GeometryError),
    #[error("estimator failed: {0}")]
    Estimator(#[from] EstimatorError),
    #[error("invalid velocity noise: {0}")]
    Noise(#[from] StatsError),
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
    #[error("telemetry summarisation failed: {0}")]
    Telemetry(#[from] TelemetryError),
}
