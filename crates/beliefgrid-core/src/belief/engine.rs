use super::{BeliefError, BeliefState};
use crate::geometry::StateSpace;
use crate::kernel::TransitionSamples;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{Level, event};

/// Smallest number of bins handed to one rayon task.
pub const DEFAULT_BATCH_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    Sequential,
    Batched { min_batch: usize },
}

impl Default for Parallelism {
    fn default() -> Self {
        Parallelism::Batched {
            min_batch: DEFAULT_BATCH_SIZE,
        }
    }
}

/// What the caller knows about the object this period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub visible: bool,
    pub true_bin: Option<usize>,
    pub probability: f64,
}

impl Observation {
    pub fn hidden() -> Self {
        Self {
            visible: false,
            true_bin: None,
            probability: 0.0,
        }
    }

    pub fn seen(true_bin: Option<usize>, probability: f64) -> Self {
        Self {
            visible: true,
            true_bin,
            probability,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UpdateSummary {
    /// Mass after prediction and correction, before normalization.
    pub unnormalized_mass: f64,
    pub corrected: bool,
}

#[derive(Debug, Clone, Copy)]
enum Correction {
    None,
    Observed { true_bin: usize, hit: f64, miss: f64 },
}

impl Correction {
    fn apply(self, bin: usize, predicted: f64) -> f64 {
        match self {
            Correction::Observed { true_bin, hit, miss } if predicted != 0.0 => {
                if bin == true_bin {
                    predicted * hit
                } else {
                    predicted * miss
                }
            }
            _ => predicted,
        }
    }
}

/// Discrete Bayes filter step over any `StateSpace`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeliefUpdateEngine {
    parallelism: Parallelism,
}

impl BeliefUpdateEngine {
    pub fn new(parallelism: Parallelism) -> Self {
        Self { parallelism }
    }

    pub fn sequential() -> Self {
        Self::new(Parallelism::Sequential)
    }

    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }

    /// Predicts with `samples`, corrects with `observation`, then normalizes.
    ///
    /// On error `belief` is left untouched.
    pub fn update<S: StateSpace>(
        &self,
        space: &S,
        belief: &mut BeliefState,
        samples: &TransitionSamples<S::Point>,
        observation: &Observation,
    ) -> Result<UpdateSummary, BeliefError> {
        let bin_count = space.bin_count();
        if belief.len() != bin_count {
            return Err(BeliefError::DimensionMismatch {
                expected: bin_count,
                found: belief.len(),
            });
        }
        if samples.is_empty() {
            return Err(BeliefError::EmptySamples);
        }
        let correction = correction_for(bin_count, observation)?;

        let mut posterior = self.run_bins(space, belief.probabilities(), samples.as_slice(), correction);
        let mass: f64 = posterior.iter().sum();
        if !(mass.is_finite() && mass > 0.0) {
            return Err(BeliefError::DegenerateNormalization { mass });
        }
        posterior.iter_mut().for_each(|p| *p /= mass);
        belief.replace(posterior);

        let summary = UpdateSummary {
            unnormalized_mass: mass,
            corrected: matches!(correction, Correction::Observed { .. }),
        };
        if tracing::enabled!(target: "beliefgrid_core::engine", Level::TRACE) {
            event!(
                target: "beliefgrid_core::engine",
                Level::TRACE,
                bins = bin_count,
                samples = samples.len(),
                mass = summary.unnormalized_mass,
                corrected = summary.corrected,
                argmax = belief.argmax(),
            );
        }
        Ok(summary)
    }

    /// Prediction step alone, without correction or normalization.
    pub fn predict<S: StateSpace>(
        &self,
        space: &S,
        prior: &[f64],
        samples: &TransitionSamples<S::Point>,
    ) -> Result<Vec<f64>, BeliefError> {
        if prior.len() != space.bin_count() {
            return Err(BeliefError::DimensionMismatch {
                expected: space.bin_count(),
                found: prior.len(),
            });
        }
        Ok(self.run_bins(space, prior, samples.as_slice(), Correction::None))
    }

    fn run_bins<S: StateSpace>(
        &self,
        space: &S,
        prior: &[f64],
        samples: &[S::Point],
        correction: Correction,
    ) -> Vec<f64> {
        let bin_value = |bin: usize| correction.apply(bin, predict_bin(space, prior, samples, bin));
        match self.parallelism {
            Parallelism::Sequential => (0..space.bin_count()).map(bin_value).collect(),
            Parallelism::Batched { min_batch } => (0..space.bin_count())
                .into_par_iter()
                .with_min_len(min_batch.max(1))
                .map(bin_value)
                .collect(),
        }
    }
}

fn correction_for(bin_count: usize, observation: &Observation) -> Result<Correction, BeliefError> {
    if !observation.visible {
        return Ok(Correction::None);
    }
    let p = observation.probability;
    if !(0.0..=1.0).contains(&p) {
        return Err(BeliefError::InvalidObservationProbability(p));
    }
    let Some(true_bin) = observation.true_bin else {
        return Ok(Correction::None);
    };
    if true_bin >= bin_count {
        return Err(BeliefError::BinOutOfRange {
            bin: true_bin,
            bin_count,
        });
    }
    let miss = if bin_count > 1 {
        (1.0 - p) / (bin_count - 1) as f64
    } else {
        0.0
    };
    Ok(Correction::Observed {
        true_bin,
        hit: p,
        miss,
    })
}

/// Probability of arriving in `bin`, summed over the samples.
fn predict_bin<S: StateSpace>(space: &S, prior: &[f64], samples: &[S::Point], bin: usize) -> f64 {
    let per_sample = 1.0 / samples.len() as f64;
    let mut total = 0.0;

    if space.is_edge_bin(bin) {
        for &displacement in samples {
            let crossed = space.crossed_bins(displacement, bin);
            if crossed.is_empty() {
                continue;
            }
            let weight = per_sample / crossed.len() as f64;
            for source in crossed {
                total += prior[source] * weight;
            }
        }
    } else {
        let centre = space.bin_to_point(bin);
        for &displacement in samples {
            if let Some(source) = space.point_to_bin(centre - displacement) {
                total += prior[source] * per_sample;
            }
        }
    }

    total
}
