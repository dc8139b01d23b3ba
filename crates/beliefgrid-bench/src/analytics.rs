use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;
use thiserror::Error;

const CONFIDENCE_Z: f64 = 1.96; // 95% CI

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render plot: {0}")]
    Plot(String),
}

/// One belief update as seen by the harness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateSample {
    pub update_index: u64,
    pub visible: bool,
    /// Distance between the argmax position and the true position.
    pub error: f64,
    pub entropy: f64,
    pub recovered: bool,
}

#[derive(Debug, Default)]
pub struct AnalyticsCollector {
    visible: ErrorAccumulator,
    hidden: ErrorAccumulator,
    recoveries: usize,
    trace: Vec<TracePoint>,
}

impl AnalyticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_update(&mut self, sample: &UpdateSample) {
        if sample.visible {
            self.visible.record(sample.error, sample.entropy);
        } else {
            self.hidden.record(sample.error, sample.entropy);
        }
        if sample.recovered {
            self.recoveries += 1;
        }
        self.trace.push(TracePoint {
            update_index: sample.update_index,
            error: sample.error,
            visible: sample.visible,
        });
    }

    pub fn finalize(self, run_id: &str) -> AnalyticsSummary {
        let mut all = ErrorAccumulator::default();
        all.merge(&self.visible);
        all.merge(&self.hidden);

        AnalyticsSummary {
            run_id: run_id.to_string(),
            updates: self.trace.len(),
            recoveries: self.recoveries,
            buckets: vec![
                self.visible.into_report("visible"),
                self.hidden.into_report("hidden"),
                all.into_report("all"),
            ],
            trace: self.trace,
        }
    }
}

#[derive(Debug, Default)]
struct ErrorAccumulator {
    errors: Vec<f64>,
    entropy_sum: f64,
}

impl ErrorAccumulator {
    fn record(&mut self, error: f64, entropy: f64) {
        self.errors.push(error);
        self.entropy_sum += entropy;
    }

    fn merge(&mut self, other: &ErrorAccumulator) {
        self.errors.extend_from_slice(&other.errors);
        self.entropy_sum += other.entropy_sum;
    }

    fn into_report(self, label: &str) -> BucketReport {
        let updates = self.errors.len();
        let (mean_error, mean_entropy) = if updates == 0 {
            (0.0, 0.0)
        } else {
            (
                self.errors.iter().sum::<f64>() / updates as f64,
                self.entropy_sum / updates as f64,
            )
        };
        BucketReport {
            label: label.to_string(),
            updates,
            mean_error,
            ci95: confidence_interval(&self.errors),
            max_error: self.errors.iter().copied().fold(0.0, f64::max),
            mean_entropy,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TracePoint {
    pub update_index: u64,
    pub error: f64,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketReport {
    pub label: String,
    pub updates: usize,
    pub mean_error: f64,
    pub ci95: (f64, f64),
    pub max_error: f64,
    pub mean_entropy: f64,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub run_id: String,
    pub updates: usize,
    pub recoveries: usize,
    pub buckets: Vec<BucketReport>,
    #[serde(skip)]
    pub trace: Vec<TracePoint>,
}

impl AnalyticsSummary {
    pub fn bucket(&self, label: &str) -> Option<&BucketReport> {
        self.buckets.iter().find(|bucket| bucket.label == label)
    }

    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        let mut rows = String::new();
        rows.push_str("# Tracking Summary\n\n");
        rows.push_str(&format!(
            "Run `{}`: {} belief updates, {} recoveries after degenerate updates\n\n",
            self.run_id, self.updates, self.recoveries
        ));
        rows.push_str("| Visibility | Updates | Mean error | 95% CI | Max error | Mean entropy |\n");
        rows.push_str("|------------|---------|------------|--------|-----------|--------------|\n");

        for bucket in &self.buckets {
            rows.push_str(&format!(
                "| {label} | {updates} | {mean:.3} | [{ci_low:.3}, {ci_high:.3}] | {max:.3} | {entropy:.3} |\n",
                label = bucket.label,
                updates = bucket.updates,
                mean = bucket.mean_error,
                ci_low = bucket.ci95.0,
                ci_high = bucket.ci95.1,
                max = bucket.max_error,
                entropy = bucket.mean_entropy,
            ));
        }

        fs::write(path.as_ref(), rows).map_err(|e| AnalyticsError::Io {
            context: "writing summary markdown",
            source: e,
        })?;
        Ok(())
    }

    /// Renders tracking error per update; hidden updates are drawn in red.
    pub fn render_plot(&self, dir: impl AsRef<Path>) -> Result<PathBuf, AnalyticsError> {
        if self.trace.is_empty() {
            return Err(AnalyticsError::Plot("no belief updates to plot".into()));
        }

        let dir = dir.as_ref();
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| AnalyticsError::Io {
                context: "creating plots directory",
                source: e,
            })?;
        }

        let output_path = dir.join("tracking_error.png");
        let trace = self.trace.clone();

        let prev_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));

        let plot_attempt = std::panic::catch_unwind(move || {
            let root = BitMapBackend::new(&output_path, (800, 480)).into_drawing_area();
            root.fill(&WHITE)
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            let last_update = trace.last().map_or(1, |point| point.update_index.max(1));
            let max_error = trace.iter().map(|point| point.error).fold(0.0f64, f64::max);
            let y_max = (max_error * 1.1).max(0.1);

            let mut chart = ChartBuilder::on(&root)
                .margin(20)
                .caption("Argmax tracking error per update", ("sans-serif", 22))
                .set_label_area_size(LabelAreaPosition::Left, 50)
                .set_label_area_size(LabelAreaPosition::Bottom, 40)
                .build_cartesian_2d(0u64..last_update, 0.0..y_max)
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            chart
                .configure_mesh()
                .disable_mesh()
                .x_desc("Update")
                .y_desc("Error")
                .draw()
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            let line: Vec<(u64, f64)> = trace
                .iter()
                .map(|point| (point.update_index, point.error))
                .collect();
            chart
                .draw_series(std::iter::once(PathElement::new(line, &BLACK)))
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            chart
                .draw_series(trace.iter().map(|point| {
                    let color = if point.visible { &GREEN } else { &RED };
                    Circle::new((point.update_index, point.error), 2, color.filled())
                }))
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            drop(chart);

            root.present()
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            drop(root);

            Ok(output_path)
        });

        std::panic::set_hook(prev_hook);

        match plot_attempt {
            Ok(result) => result,
            Err(_) => Err(AnalyticsError::Plot(
                "plotters panicked while rendering (missing font support?)".into(),
            )),
        }
    }
}

fn confidence_interval(points: &[f64]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let mean = points.iter().mean();
    if points.len() == 1 {
        return (mean, mean);
    }
    let std_error = points.iter().std_dev() / (points.len() as f64).sqrt();
    let margin = CONFIDENCE_Z * std_error;
    (mean - margin, mean + margin)
}
