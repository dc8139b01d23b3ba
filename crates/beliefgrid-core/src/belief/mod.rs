//! Discrete belief over object location and its Bayes-filter update.
//!
//! This module is composed of:
//! - `state`: the probability array (`BeliefState`) and its lifecycle.
//! - `engine`: predict / correct / normalize over a `StateSpace`.
//! - `shared`: a belief handle shared between task instances of one kind.
//! - `region`: projection of grid mass onto rectangular regions.
//! - `telemetry`: summary statistics for logging.

mod engine;
mod region;
mod shared;
mod state;
pub mod telemetry;

use std::fmt;

pub use engine::{BeliefUpdateEngine, DEFAULT_BATCH_SIZE, Observation, Parallelism, UpdateSummary};
pub use region::{Region, RegionProjection};
pub use shared::SharedBelief;
pub use state::BeliefState;
pub use telemetry::BeliefMetrics;

#[derive(Debug, Clone, PartialEq)]
pub enum BeliefError {
    DimensionMismatch { expected: usize, found: usize },
    EmptyState,
    EmptySamples,
    InvalidProbabilities,
    InvalidObservationProbability(f64),
    BinOutOfRange { bin: usize, bin_count: usize },
    DegenerateNormalization { mass: f64 },
}

impl fmt::Display for BeliefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeliefError::DimensionMismatch { expected, found } => {
                write!(f, "belief has {found} bins but the space has {expected}")
            }
            BeliefError::EmptyState => write!(f, "belief needs at least one bin"),
            BeliefError::EmptySamples => write!(f, "update needs at least one transition sample"),
            BeliefError::InvalidProbabilities => {
                write!(f, "probabilities must be finite, non-negative and sum to 1")
            }
            BeliefError::InvalidObservationProbability(p) => {
                write!(f, "observation probability {p} is outside [0, 1]")
            }
            BeliefError::BinOutOfRange { bin, bin_count } => {
                write!(f, "bin {bin} is outside 0..{bin_count}")
            }
            BeliefError::DegenerateNormalization { mass } => {
                write!(f, "predicted belief mass {mass} cannot be normalized")
            }
        }
    }
}

impl std::error::Error for BeliefError {}
