use super::EstimatorConfig;
use crate::geometry::Point;
use crate::kernel::{KernelError, KernelSampler};

/// Tracks whether attention is on the task and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct VisibilityGate {
    focused: bool,
    focused_for: f64,
}

impl VisibilityGate {
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn focus_gained(&mut self) {
        self.focused = true;
        self.focused_for = 0.0;
    }

    pub fn focus_lost(&mut self) {
        self.focused = false;
        self.focused_for = 0.0;
    }

    pub fn advance(&mut self, dt: f64) {
        if self.focused {
            self.focused_for += dt;
        }
    }

    /// Visible once attention has rested on the task past both the reaction
    /// time and the persistence window of the previous task's belief.
    pub fn is_visible(&self, config: &EstimatorConfig) -> bool {
        config.full_vision
            || (self.focused
                && self.focused_for > config.reaction_time
                && self.focused_for > config.persistence_time)
    }

    /// True while the belief carried over from the previous task still applies.
    pub fn is_persisting(&self, config: &EstimatorConfig) -> bool {
        self.focused && self.focused_for < config.persistence_time
    }
}

/// Running estimate of the per-period displacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct VelocityModel<P> {
    estimate: P,
    spread: f64,
}

impl<P: Point> VelocityModel<P> {
    pub fn new(config: &EstimatorConfig) -> Self {
        Self {
            estimate: P::zero(),
            spread: config.sigma_mean,
        }
    }

    pub fn estimate(&self) -> P {
        self.estimate
    }

    pub fn spread(&self) -> f64 {
        self.spread
    }

    /// Takes the measured velocity when visible. Otherwise redraws the
    /// estimate around itself, narrows the redraw spread and rescales the
    /// draw to the magnitude of the measured displacement, so a slowing
    /// object slows the estimate too. A zero estimate stays zero.
    pub fn advance(
        &mut self,
        visible: bool,
        measured: Option<P>,
        config: &EstimatorConfig,
        sampler: &mut KernelSampler,
    ) -> Result<P, KernelError> {
        if visible {
            if let Some(velocity) = measured {
                self.estimate = velocity.scale(config.update_period);
            }
            self.spread = config.sigma_mean;
        } else {
            let drawn = sampler.draw(self.estimate, self.spread)?;
            self.spread *= config.sigma_decay;
            self.estimate = match measured {
                Some(velocity) => {
                    let magnitude = self.estimate.norm();
                    let ratio = if magnitude == 0.0 {
                        0.0
                    } else {
                        velocity.scale(config.update_period).norm() / magnitude
                    };
                    drawn.scale(ratio)
                }
                None => drawn,
            };
        }
        Ok(self.estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec2;

    #[test]
    fn reaction_time_delays_visibility() {
        let config = EstimatorConfig {
            reaction_time: 0.25,
            ..EstimatorConfig::default()
        };
        let mut gate = VisibilityGate::default();
        assert!(!gate.is_visible(&config));

        gate.focus_gained();
        gate.advance(0.2);
        assert!(!gate.is_visible(&config));
        gate.advance(0.1);
        assert!(gate.is_visible(&config));

        gate.focus_lost();
        gate.advance(1.0);
        assert!(!gate.is_visible(&config));
    }

    #[test]
    fn full_vision_ignores_attention() {
        let config = EstimatorConfig {
            full_vision: true,
            ..EstimatorConfig::default()
        };
        assert!(VisibilityGate::default().is_visible(&config));
    }

    #[test]
    fn unobserved_spread_decays_geometrically() {
        let config = EstimatorConfig::default();
        let mut sampler = KernelSampler::seeded(3);
        let mut model = VelocityModel::<Vec2>::new(&config);

        let seen = model
            .advance(true, Some(Vec2::new(2.0, -1.0)), &config, &mut sampler)
            .expect("visible");
        assert_eq!(seen, Vec2::new(0.2, -0.1));

        for step in 1..=3 {
            model.advance(false, None, &config, &mut sampler).expect("hidden");
            let expected = config.sigma_mean * config.sigma_decay.powi(step);
            assert!((model.spread() - expected).abs() < 1e-15);
        }
        assert!((model.estimate() - seen).norm() < 0.1);

        model.advance(true, None, &config, &mut sampler).expect("visible");
        assert_eq!(model.spread(), config.sigma_mean);
    }

    #[test]
    fn hidden_redraw_follows_measured_speed() {
        let config = EstimatorConfig::default();
        let mut sampler = KernelSampler::seeded(11);
        let mut model = VelocityModel::<Vec2>::new(&config);
        model
            .advance(true, Some(Vec2::new(3.0, 4.0)), &config, &mut sampler)
            .expect("visible");
        assert!((model.estimate().norm() - 0.5).abs() < 1e-12);

        // The object slowed to half speed while unobserved.
        let slowed = model
            .advance(false, Some(Vec2::new(1.5, 2.0)), &config, &mut sampler)
            .expect("hidden");
        assert!((slowed.norm() - 0.25).abs() < 0.02, "estimate {slowed}");
        assert!((slowed.x / slowed.y - 0.75).abs() < 0.1);

        let mut still = VelocityModel::<Vec2>::new(&config);
        let stays = still
            .advance(false, Some(Vec2::new(1.0, 0.0)), &config, &mut sampler)
            .expect("hidden");
        assert_eq!(stays, Vec2::ZERO);
    }

    #[test]
    fn persistence_window_delays_visibility() {
        let config = EstimatorConfig {
            reaction_time: 0.1,
            persistence_time: 0.5,
            ..EstimatorConfig::default()
        };
        let mut gate = VisibilityGate::default();
        assert!(!gate.is_persisting(&config));

        gate.focus_gained();
        assert!(gate.is_persisting(&config));
        gate.advance(0.3);
        assert!(gate.is_persisting(&config));
        assert!(!gate.is_visible(&config));

        gate.advance(0.3);
        assert!(!gate.is_persisting(&config));
        assert!(gate.is_visible(&config));

        gate.focus_lost();
        assert!(!gate.is_persisting(&config));
    }
}
