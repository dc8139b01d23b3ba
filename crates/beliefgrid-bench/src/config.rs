use beliefgrid_core::estimator::ConfigError as EstimatorConfigError;
use beliefgrid_core::{Area, EstimatorConfig, Vec2};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

const DEFAULT_DT: f64 = 0.02;
const DEFAULT_FOCUS_SECONDS: f64 = 1.0;
const DEFAULT_AWAY_SECONDS: f64 = 2.0;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root benchmark configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BenchmarkConfig {
    pub run_id: String,
    pub scenario: ScenarioConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchmarkConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: BenchmarkConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.scenario.validate()?;
        self.estimator.validate().map_err(|err| match err {
            EstimatorConfigError::InvalidField { field, message } => {
                ValidationError::InvalidField {
                    field: format!("estimator.{field}"),
                    message,
                }
            }
        })?;
        self.outputs.validate(&self.run_id)?;
        self.logging.normalize();
        Ok(())
    }

    /// Resolve output templates (e.g., `{run_id}` placeholders) into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
            plots_dir: resolve_template(&self.run_id, &self.outputs.plots_dir),
        }
    }

    /// Estimator settings with the scenario seed filled in when none is set.
    pub fn effective_estimator(&self) -> EstimatorConfig {
        let mut estimator = self.estimator.clone();
        if estimator.seed.is_none() {
            estimator.seed = self.scenario.seed;
        }
        estimator
    }
}

/// Synthetic world the estimator is run against.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScenarioConfig {
    pub seed: Option<u64>,
    pub steps: usize,
    #[serde(default = "default_dt")]
    pub dt: f64,
    pub area: Area,
    #[serde(default)]
    pub start: Vec2,
    pub velocity: Vec2,
    /// Standard deviation of the velocity jitter per second of simulated time.
    #[serde(default)]
    pub velocity_noise: f64,
    #[serde(default)]
    pub attention: AttentionConfig,
}

impl ScenarioConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.steps == 0 {
            return Err(invalid("scenario.steps", "number of steps must be greater than zero"));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(invalid("scenario.dt", "time step must be a positive number of seconds"));
        }
        self.area
            .validate()
            .map_err(|err| invalid("scenario.area", &err.to_string()))?;
        if !self.area.contains(self.start) {
            return Err(invalid("scenario.start", "start position lies outside the area"));
        }
        if !(self.velocity.x.is_finite() && self.velocity.y.is_finite()) {
            return Err(invalid("scenario.velocity", "velocity must be finite"));
        }
        if !(self.velocity_noise.is_finite() && self.velocity_noise >= 0.0) {
            return Err(invalid("scenario.velocity_noise", "noise must be finite and non-negative"));
        }
        self.attention.validate()
    }
}

fn default_dt() -> f64 {
    DEFAULT_DT
}

/// Alternating attention: `focus_seconds` on the task, then `away_seconds` elsewhere.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AttentionConfig {
    #[serde(default = "default_focus_seconds")]
    pub focus_seconds: f64,
    #[serde(default = "default_away_seconds")]
    pub away_seconds: f64,
    #[serde(default = "default_start_focused")]
    pub start_focused: bool,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            focus_seconds: DEFAULT_FOCUS_SECONDS,
            away_seconds: DEFAULT_AWAY_SECONDS,
            start_focused: true,
        }
    }
}

impl AttentionConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("scenario.attention.focus_seconds", self.focus_seconds),
            ("scenario.attention.away_seconds", self.away_seconds),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(field, "duration must be finite and non-negative"));
            }
        }
        if self.focus_seconds + self.away_seconds <= 0.0 {
            return Err(invalid(
                "scenario.attention",
                "focus and away durations cannot both be zero",
            ));
        }
        Ok(())
    }
}

fn default_focus_seconds() -> f64 {
    DEFAULT_FOCUS_SECONDS
}

fn default_away_seconds() -> f64 {
    DEFAULT_AWAY_SECONDS
}

fn default_start_focused() -> bool {
    true
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
    pub plots_dir: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.jsonl", &self.jsonl),
            ("outputs.summary_md", &self.summary_md),
            ("outputs.plots_dir", &self.plots_dir),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(label, "path must not be empty"));
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 {
                return Err(invalid(label, "resolved path is invalid"));
            }
        }
        Ok(())
    }
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(invalid("run_id", "run_id must not be empty"));
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(invalid(
            "run_id",
            "run_id may only contain alphanumeric characters, '.', '_' or '-'",
        ));
    }

    Ok(())
}

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    let replaced = template.replace("{run_id}", run_id);
    PathBuf::from(replaced)
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
    pub plots_dir: PathBuf,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
