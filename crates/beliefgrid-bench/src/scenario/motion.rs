use beliefgrid_core::{Area, Vec2};
use rand::Rng;
use rand::distributions::Distribution;
use statrs::distribution::Normal;

use crate::config::AttentionConfig;

/// Ball bouncing inside the area. Walls reflect the offending velocity component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingObject {
    position: Vec2,
    velocity: Vec2,
    half_extent: Vec2,
}

impl MovingObject {
    pub fn new(area: Area, position: Vec2, velocity: Vec2) -> Self {
        Self {
            position,
            velocity,
            half_extent: Vec2::new(area.width() / 2.0, area.height() / 2.0),
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Integrates one time step. `jitter` perturbs the velocity with
    /// `jitter * sqrt(dt)` per axis before moving.
    pub fn advance<R: Rng + ?Sized>(&mut self, dt: f64, jitter: Option<&Normal>, rng: &mut R) {
        if let Some(normal) = jitter {
            let scale = dt.sqrt();
            self.velocity.x += normal.sample(rng) * scale;
            self.velocity.y += normal.sample(rng) * scale;
        }

        let (x, vx) = reflect(
            self.position.x + self.velocity.x * dt,
            self.velocity.x,
            self.half_extent.x,
        );
        let (y, vy) = reflect(
            self.position.y + self.velocity.y * dt,
            self.velocity.y,
            self.half_extent.y,
        );
        self.position = Vec2::new(x, y);
        self.velocity = Vec2::new(vx, vy);
    }
}

/// Folds `coord` back into `[-half, half)` and flips `velocity` on a bounce.
fn reflect(coord: f64, velocity: f64, half: f64) -> (f64, f64) {
    let (mut coord, mut velocity) = (coord, velocity);
    if coord >= half {
        coord = 2.0 * half - coord;
        velocity = -velocity;
    } else if coord < -half {
        coord = -2.0 * half - coord;
        velocity = -velocity;
    }
    // Steps longer than the area would overshoot the opposite wall.
    let upper = half - half * f64::EPSILON * 4.0;
    (coord.clamp(-half, upper), velocity)
}

/// Fixed attention cycle: focused for `focus_seconds`, away for `away_seconds`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttentionSchedule {
    focus: f64,
    away: f64,
    start_focused: bool,
}

impl AttentionSchedule {
    pub fn new(config: &AttentionConfig) -> Self {
        Self {
            focus: config.focus_seconds,
            away: config.away_seconds,
            start_focused: config.start_focused,
        }
    }

    pub fn is_focused(&self, time: f64) -> bool {
        if self.focus <= 0.0 {
            return false;
        }
        if self.away <= 0.0 {
            return true;
        }
        let phase = time.rem_euclid(self.focus + self.away);
        if self.start_focused {
            phase < self.focus
        } else {
            phase >= self.away
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn object_bounces_off_walls() {
        let area = Area::Square { radius: 1.0 };
        let mut object = MovingObject::new(area, Vec2::new(0.9, 0.0), Vec2::new(1.0, 0.0));
        let mut rng = StdRng::seed_from_u64(1);

        object.advance(0.2, None, &mut rng);
        assert!((object.position().x - 0.9).abs() < 1e-12);
        assert_eq!(object.velocity(), Vec2::new(-1.0, 0.0));
        assert!(area.contains(object.position()));
    }

    #[test]
    fn object_stays_inside_for_long_runs() {
        let area = Area::Rectangle {
            width: 4.0,
            height: 2.0,
        };
        let jitter = Normal::new(0.0, 0.5).expect("normal");
        let mut object = MovingObject::new(area, Vec2::ZERO, Vec2::new(3.0, -2.5));
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..5_000 {
            object.advance(0.05, Some(&jitter), &mut rng);
            assert!(area.contains(object.position()), "{}", object.position());
        }
    }

    #[test]
    fn attention_alternates_on_schedule() {
        let schedule = AttentionSchedule::new(&AttentionConfig {
            focus_seconds: 1.0,
            away_seconds: 2.0,
            start_focused: true,
        });
        assert!(schedule.is_focused(0.0));
        assert!(schedule.is_focused(0.99));
        assert!(!schedule.is_focused(1.0));
        assert!(!schedule.is_focused(2.5));
        assert!(schedule.is_focused(3.2));

        let delayed = AttentionSchedule::new(&AttentionConfig {
            start_focused: false,
            ..AttentionConfig::default()
        });
        assert!(!delayed.is_focused(0.5));
        assert!(delayed.is_focused(2.5));
    }

    #[test]
    fn degenerate_schedules() {
        let never = AttentionSchedule::new(&AttentionConfig {
            focus_seconds: 0.0,
            away_seconds: 1.0,
            start_focused: true,
        });
        assert!(!never.is_focused(0.0));

        let always = AttentionSchedule::new(&AttentionConfig {
            focus_seconds: 1.0,
            away_seconds: 0.0,
            start_focused: false,
        });
        assert!(always.is_focused(42.0));
    }
}
