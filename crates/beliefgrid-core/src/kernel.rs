//! Monte Carlo approximation of the transition kernel.

use crate::geometry::Point;
use rand::SeedableRng;
use rand::distributions::Distribution;
use rand::rngs::SmallRng;
use statrs::distribution::Normal;
use std::fmt;

/// Smallest standard deviation handed to the normal distribution.
pub const SIGMA_FLOOR: f64 = 1e-9;

/// Displacement samples drawn for one update period.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionSamples<P> {
    samples: Vec<P>,
}

impl<P: Point> TransitionSamples<P> {
    pub fn from_vec(samples: Vec<P>) -> Result<Self, KernelError> {
        if samples.is_empty() {
            return Err(KernelError::NoSamples);
        }
        Ok(Self { samples })
    }

    pub fn as_slice(&self) -> &[P] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &P> {
        self.samples.iter()
    }

    /// Average displacement across all samples.
    pub fn mean(&self) -> P {
        let total = self
            .samples
            .iter()
            .fold(P::zero(), |acc, &sample| acc + sample);
        total.scale(1.0 / self.samples.len() as f64)
    }
}

/// Draws displacement samples from a generator owned by this sampler alone.
#[derive(Debug, Clone)]
pub struct KernelSampler {
    rng: SmallRng,
}

impl KernelSampler {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    /// Draws `count` samples, each axis independently from
    /// `Normal(mean_axis, sigma)`.
    pub fn sample<P: Point>(
        &mut self,
        count: usize,
        mean: P,
        sigma: f64,
    ) -> Result<TransitionSamples<P>, KernelError> {
        if count == 0 {
            return Err(KernelError::NoSamples);
        }
        let normals = axis_normals(mean, sigma)?;
        let rng = &mut self.rng;

        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            samples.push(P::from_axes(|axis| normals[axis].sample(&mut *rng)));
        }
        TransitionSamples::from_vec(samples)
    }

    /// Single draw around `mean`.
    pub fn draw<P: Point>(&mut self, mean: P, sigma: f64) -> Result<P, KernelError> {
        let normals = axis_normals(mean, sigma)?;
        let rng = &mut self.rng;
        Ok(P::from_axes(|axis| normals[axis].sample(&mut *rng)))
    }
}

fn axis_normals<P: Point>(mean: P, sigma: f64) -> Result<Vec<Normal>, KernelError> {
    if !mean.is_finite() {
        return Err(KernelError::NonFiniteMean);
    }
    if !sigma.is_finite() {
        return Err(KernelError::NonFiniteSigma(sigma));
    }
    let sigma = sigma.max(SIGMA_FLOOR);
    (0..P::AXES)
        .map(|axis| {
            Normal::new(mean.axis(axis), sigma).map_err(|_| KernelError::InvalidParameters {
                mean: mean.axis(axis),
                sigma,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum KernelError {
    NoSamples,
    NonFiniteMean,
    NonFiniteSigma(f64),
    InvalidParameters { mean: f64, sigma: f64 },
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::NoSamples => write!(f, "transition kernel needs at least one sample"),
            KernelError::NonFiniteMean => write!(f, "kernel mean velocity is not finite"),
            KernelError::NonFiniteSigma(sigma) => write!(f, "kernel sigma {sigma} is not finite"),
            KernelError::InvalidParameters { mean, sigma } => {
                write!(f, "normal distribution rejected mean {mean} sigma {sigma}")
            }
        }
    }
}

impl std::error::Error for KernelError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec2;

    #[test]
    fn equal_seeds_reproduce_samples() {
        let mut a = KernelSampler::seeded(42);
        let mut b = KernelSampler::seeded(42);
        let mean = Vec2::new(0.3, -0.1);
        let first = a.sample(64, mean, 0.1).expect("samples");
        let second = b.sample(64, mean, 0.1).expect("samples");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn sample_mean_tracks_requested_mean() {
        let mut sampler = KernelSampler::seeded(7);
        let samples = sampler
            .sample(4000, Vec2::new(1.0, -2.0), 0.1)
            .expect("samples");
        let mean = samples.mean();
        assert!((mean.x - 1.0).abs() < 0.02, "mean {mean}");
        assert!((mean.y + 2.0).abs() < 0.02, "mean {mean}");
    }

    #[test]
    fn tiny_sigma_is_clamped_not_rejected() {
        let mut sampler = KernelSampler::seeded(1);
        let samples = sampler.sample(8, 0.5_f64, 0.0).expect("samples");
        assert!(samples.iter().all(|&value| (value - 0.5).abs() < 1e-6));
        let negative = sampler.sample(8, 0.5_f64, -3.0).expect("samples");
        assert_eq!(negative.len(), 8);
    }

    #[test]
    fn invalid_parameters_are_errors() {
        let mut sampler = KernelSampler::seeded(1);
        assert_eq!(
            sampler.sample(0, Vec2::ZERO, 0.1),
            Err(KernelError::NoSamples)
        );
        assert_eq!(
            sampler.sample(4, Vec2::new(f64::NAN, 0.0), 0.1),
            Err(KernelError::NonFiniteMean)
        );
        assert!(matches!(
            sampler.draw(0.0_f64, f64::INFINITY),
            Err(KernelError::NonFiniteSigma(_))
        ));
        assert_eq!(
            TransitionSamples::<f64>::from_vec(Vec::new()),
            Err(KernelError::NoSamples)
        );
    }
}
