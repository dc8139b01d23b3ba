use crate::belief::Parallelism;
use serde::{Deserialize, Serialize};
use std::fmt;

const DEFAULT_UPDATE_PERIOD: f64 = 0.1;
const DEFAULT_NUMBER_OF_SAMPLES: usize = 100;
const DEFAULT_SIGMA: f64 = 0.1;
const DEFAULT_SIGMA_MEAN: f64 = 0.01;
const DEFAULT_SIGMA_DECAY: f64 = 0.5;
const DEFAULT_OBSERVATION_PROBABILITY: f64 = 0.9;
const DEFAULT_NUMBER_OF_BINS: usize = 1000;

/// Tuning of one location estimator. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    #[serde(default = "default_number_of_samples")]
    pub number_of_samples: usize,
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    /// Spread of the velocity redraw while the object is unobserved.
    #[serde(default = "default_sigma_mean")]
    pub sigma_mean: f64,
    /// Factor applied to the redraw spread after every unobserved update.
    #[serde(default = "default_sigma_decay")]
    pub sigma_decay: f64,
    #[serde(default = "default_observation_probability")]
    pub observation_probability: f64,
    /// Requested bin budget; the grid rounds it to a valid layout.
    #[serde(default = "default_number_of_bins")]
    pub number_of_bins: usize,
    /// Seconds between belief updates.
    #[serde(default = "default_update_period")]
    pub update_period: f64,
    /// Seconds after attention returns before the object counts as visible.
    #[serde(default)]
    pub reaction_time: f64,
    /// Seconds after attention returns during which the previous task's
    /// belief stands in for this one and the object is not yet visible.
    #[serde(default)]
    pub persistence_time: f64,
    #[serde(default)]
    pub full_vision: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub parallel: ParallelMode,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelMode {
    #[default]
    Rayon,
    Sequential,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            number_of_samples: DEFAULT_NUMBER_OF_SAMPLES,
            sigma: DEFAULT_SIGMA,
            sigma_mean: DEFAULT_SIGMA_MEAN,
            sigma_decay: DEFAULT_SIGMA_DECAY,
            observation_probability: DEFAULT_OBSERVATION_PROBABILITY,
            number_of_bins: DEFAULT_NUMBER_OF_BINS,
            update_period: DEFAULT_UPDATE_PERIOD,
            reaction_time: 0.0,
            persistence_time: 0.0,
            full_vision: false,
            batch_size: default_batch_size(),
            parallel: ParallelMode::default(),
            seed: None,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.number_of_samples == 0 {
            return Err(ConfigError::invalid(
                "number_of_samples",
                "at least one sample is required",
            ));
        }
        if self.number_of_bins == 0 {
            return Err(ConfigError::invalid("number_of_bins", "must be greater than zero"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be greater than zero"));
        }
        for (field, value) in [("sigma", self.sigma), ("sigma_mean", self.sigma_mean)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid(field, "must be finite and non-negative"));
            }
        }
        for (field, value) in [
            ("sigma_decay", self.sigma_decay),
            ("observation_probability", self.observation_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::invalid(field, "must lie in [0, 1]"));
            }
        }
        if !(self.update_period.is_finite() && self.update_period > 0.0) {
            return Err(ConfigError::invalid("update_period", "must be a positive duration"));
        }
        for (field, value) in [
            ("reaction_time", self.reaction_time),
            ("persistence_time", self.persistence_time),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid(field, "must not be negative"));
            }
        }
        Ok(())
    }

    pub fn parallelism(&self) -> Parallelism {
        match self.parallel {
            ParallelMode::Rayon => Parallelism::Batched {
                min_batch: self.batch_size,
            },
            ParallelMode::Sequential => Parallelism::Sequential,
        }
    }
}

fn default_number_of_samples() -> usize {
    DEFAULT_NUMBER_OF_SAMPLES
}

fn default_sigma() -> f64 {
    DEFAULT_SIGMA
}

fn default_sigma_mean() -> f64 {
    DEFAULT_SIGMA_MEAN
}

fn default_sigma_decay() -> f64 {
    DEFAULT_SIGMA_DECAY
}

fn default_observation_probability() -> f64 {
    DEFAULT_OBSERVATION_PROBABILITY
}

fn default_number_of_bins() -> usize {
    DEFAULT_NUMBER_OF_BINS
}

fn default_update_period() -> f64 {
    DEFAULT_UPDATE_PERIOD
}

fn default_batch_size() -> usize {
    crate::belief::DEFAULT_BATCH_SIZE
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidField { field: &'static str, message: String },
}

impl ConfigError {
    fn invalid(field: &'static str, message: &str) -> Self {
        ConfigError::InvalidField {
            field,
            message: message.to_string(),
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            ConfigError::InvalidField { field, .. } => *field,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidField { field, message } => write!(f, "{field}: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EstimatorConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.parallelism(), Parallelism::default());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: EstimatorConfig =
            serde_json::from_str(r#"{"number_of_bins": 400, "seed": 9}"#).expect("parse");
        assert_eq!(config.number_of_bins, 400);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.number_of_samples, DEFAULT_NUMBER_OF_SAMPLES);
        assert_eq!(config.sigma_decay, DEFAULT_SIGMA_DECAY);
        assert_eq!(config.parallel, ParallelMode::Rayon);
    }

    #[test]
    fn sequential_mode_is_selectable() {
        let config: EstimatorConfig =
            serde_json::from_str(r#"{"parallel": "sequential"}"#).expect("parse");
        assert_eq!(config.parallelism(), Parallelism::Sequential);
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let cases = [
            (
                EstimatorConfig {
                    number_of_samples: 0,
                    ..EstimatorConfig::default()
                },
                "number_of_samples",
            ),
            (
                EstimatorConfig {
                    observation_probability: 1.2,
                    ..EstimatorConfig::default()
                },
                "observation_probability",
            ),
            (
                EstimatorConfig {
                    update_period: 0.0,
                    ..EstimatorConfig::default()
                },
                "update_period",
            ),
            (
                EstimatorConfig {
                    sigma: f64::NAN,
                    ..EstimatorConfig::default()
                },
                "sigma",
            ),
            (
                EstimatorConfig {
                    reaction_time: -0.1,
                    ..EstimatorConfig::default()
                },
                "reaction_time",
            ),
            (
                EstimatorConfig {
                    persistence_time: f64::INFINITY,
                    ..EstimatorConfig::default()
                },
                "persistence_time",
            ),
        ];
        for (config, field) in cases {
            let err = config.validate().expect_err("invalid config");
            assert_eq!(err.field(), field);
        }
    }
}
