use super::BeliefError;
use crate::geometry::StateSpace;
use serde::Serialize;

const NORMALIZATION_TOLERANCE: f64 = 1e-6;

/// Probability of the tracked object occupying each bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeliefState {
    probabilities: Vec<f64>,
    start_bin: usize,
}

impl BeliefState {
    /// All mass on `start_bin`, which is also where `reset` returns to.
    pub fn one_hot(bin_count: usize, start_bin: usize) -> Result<Self, BeliefError> {
        if bin_count == 0 {
            return Err(BeliefError::EmptyState);
        }
        if start_bin >= bin_count {
            return Err(BeliefError::BinOutOfRange {
                bin: start_bin,
                bin_count,
            });
        }
        let mut probabilities = vec![0.0; bin_count];
        probabilities[start_bin] = 1.0;
        Ok(Self {
            probabilities,
            start_bin,
        })
    }

    /// Arbitrary distribution; must be non-negative, finite and sum to 1.
    pub fn from_probabilities(probabilities: Vec<f64>, start_bin: usize) -> Result<Self, BeliefError> {
        if probabilities.is_empty() {
            return Err(BeliefError::EmptyState);
        }
        if start_bin >= probabilities.len() {
            return Err(BeliefError::BinOutOfRange {
                bin: start_bin,
                bin_count: probabilities.len(),
            });
        }
        if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(BeliefError::InvalidProbabilities);
        }
        let state = Self {
            probabilities,
            start_bin,
        };
        if !state.is_normalized(NORMALIZATION_TOLERANCE) {
            return Err(BeliefError::InvalidProbabilities);
        }
        Ok(state)
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn probability(&self, bin: usize) -> Option<f64> {
        self.probabilities.get(bin).copied()
    }

    pub fn start_bin(&self) -> usize {
        self.start_bin
    }

    pub fn set_start_bin(&mut self, bin: usize) -> Result<(), BeliefError> {
        self.check_bin(bin)?;
        self.start_bin = bin;
        Ok(())
    }

    /// Back to one-hot at the start bin.
    pub fn reset(&mut self) {
        let start = self.start_bin;
        self.fill_one_hot(start);
    }

    /// One-hot at `bin`; the start bin is unchanged.
    pub fn reset_to(&mut self, bin: usize) -> Result<(), BeliefError> {
        self.check_bin(bin)?;
        self.fill_one_hot(bin);
        Ok(())
    }

    fn fill_one_hot(&mut self, bin: usize) {
        self.probabilities.iter_mut().for_each(|p| *p = 0.0);
        self.probabilities[bin] = 1.0;
    }

    fn check_bin(&self, bin: usize) -> Result<(), BeliefError> {
        if bin >= self.probabilities.len() {
            return Err(BeliefError::BinOutOfRange {
                bin,
                bin_count: self.probabilities.len(),
            });
        }
        Ok(())
    }

    /// Most probable bin; ties resolve to the lowest index.
    pub fn argmax(&self) -> usize {
        let mut best = 0;
        let mut best_p = self.probabilities[0];
        for (bin, &p) in self.probabilities.iter().enumerate().skip(1) {
            if p > best_p {
                best = bin;
                best_p = p;
            }
        }
        best
    }

    pub fn argmax_point<S: StateSpace>(&self, space: &S) -> S::Point {
        space.bin_to_point(self.argmax())
    }

    pub fn total_mass(&self) -> f64 {
        self.probabilities.iter().sum()
    }

    pub fn is_normalized(&self, tolerance: f64) -> bool {
        (self.total_mass() - 1.0).abs() <= tolerance && self.probabilities.iter().all(|p| *p >= 0.0)
    }

    /// Swaps in a full replacement distribution of the same length.
    pub(crate) fn replace(&mut self, probabilities: Vec<f64>) {
        debug_assert_eq!(probabilities.len(), self.probabilities.len());
        self.probabilities = probabilities;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{GridSpec, Vec2};

    #[test]
    fn one_hot_starts_normalized() {
        let belief = BeliefState::one_hot(9, 4).expect("belief");
        assert_eq!(belief.len(), 9);
        assert_eq!(belief.probability(4), Some(1.0));
        assert!(belief.is_normalized(1e-12));
        assert_eq!(belief.argmax(), 4);
    }

    #[test]
    fn one_hot_rejects_bad_bins() {
        assert_eq!(BeliefState::one_hot(0, 0), Err(BeliefError::EmptyState));
        assert_eq!(
            BeliefState::one_hot(4, 4),
            Err(BeliefError::BinOutOfRange { bin: 4, bin_count: 4 })
        );
    }

    #[test]
    fn argmax_breaks_ties_toward_lowest_index() {
        let belief = BeliefState::from_probabilities(vec![0.1, 0.4, 0.1, 0.4], 0).expect("belief");
        assert_eq!(belief.argmax(), 1);
    }

    #[test]
    fn argmax_point_is_bin_centre() {
        let grid = GridSpec::square(1.5, 9).expect("grid");
        let belief = BeliefState::one_hot(9, 2).expect("belief");
        assert_eq!(belief.argmax_point(&grid), Vec2::new(1.0, -1.0));
    }

    #[test]
    fn reset_returns_to_start_and_reset_to_moves_mass() {
        let mut belief = BeliefState::from_probabilities(vec![0.25; 4], 3).expect("belief");
        belief.reset();
        assert_eq!(belief.probabilities(), &[0.0, 0.0, 0.0, 1.0]);
        belief.reset_to(1).expect("in range");
        assert_eq!(belief.probabilities(), &[0.0, 1.0, 0.0, 0.0]);
        assert_eq!(belief.start_bin(), 3);
        assert!(belief.reset_to(9).is_err());
    }

    #[test]
    fn rejects_unnormalized_input() {
        assert_eq!(
            BeliefState::from_probabilities(vec![0.5, 0.6], 0),
            Err(BeliefError::InvalidProbabilities)
        );
        assert_eq!(
            BeliefState::from_probabilities(vec![1.5, -0.5], 0),
            Err(BeliefError::InvalidProbabilities)
        );
    }

    #[test]
    fn serializes_probabilities() {
        let belief = BeliefState::one_hot(2, 1).expect("belief");
        let json = serde_json::to_string(&belief).expect("json");
        assert_eq!(json, r#"{"probabilities":[0.0,1.0],"start_bin":1}"#);
    }
}
