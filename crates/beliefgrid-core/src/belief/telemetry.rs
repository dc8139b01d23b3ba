use super::BeliefState;
use serde::Serialize;

/// Mass below this is not counted towards the support.
const SUPPORT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BeliefMetrics {
    /// Shannon entropy in nats.
    pub entropy: f64,
    pub max_probability: f64,
    pub argmax_bin: usize,
    /// Number of bins carrying non-negligible mass.
    pub support: usize,
}

impl BeliefMetrics {
    pub fn from_belief(belief: &BeliefState) -> Self {
        let mut entropy = 0.0;
        let mut support = 0;
        for &p in belief.probabilities() {
            if p > 0.0 {
                entropy -= p * p.ln();
            }
            if p > SUPPORT_EPSILON {
                support += 1;
            }
        }
        let argmax_bin = belief.argmax();

        Self {
            entropy,
            max_probability: belief.probabilities()[argmax_bin],
            argmax_bin,
            support,
        }
    }

    /// Entropy relative to a uniform belief over `bin_count` bins.
    pub fn normalized_entropy(&self, bin_count: usize) -> f64 {
        if bin_count <= 1 {
            return 0.0;
        }
        self.entropy / (bin_count as f64).ln()
    }
}
