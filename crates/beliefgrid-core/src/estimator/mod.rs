//! Periodic belief updates for one unobserved task.
//!
//! `LocationEstimator` owns the update timer, the attention gate and the
//! velocity estimate, and drives `BeliefUpdateEngine` once per update period.

mod attention;
mod config;

use crate::belief::{
    BeliefError, BeliefMetrics, BeliefState, BeliefUpdateEngine, Observation, SharedBelief,
    UpdateSummary,
};
use crate::geometry::{GeometryError, Point, StateSpace};
use crate::kernel::{KernelError, KernelSampler};
use attention::{VelocityModel, VisibilityGate};
use serde::Serialize;
use std::fmt;
use tracing::{Level, event, warn};

pub use config::{ConfigError, EstimatorConfig, ParallelMode};

/// What the orchestrator reports about the task each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percept<P> {
    pub focused: bool,
    pub position: Option<P>,
    pub velocity: Option<P>,
}

impl<P> Percept<P> {
    pub fn unattended() -> Self {
        Self {
            focused: false,
            position: None,
            velocity: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UpdateReport<P> {
    pub update_index: u64,
    pub visible: bool,
    pub observed_bin: Option<usize>,
    pub estimated_displacement: P,
    /// Spread the next unobserved redraw of the displacement will use.
    pub velocity_spread: f64,
    pub mean_displacement: P,
    pub summary: Option<UpdateSummary>,
    /// Set when the update degenerated and the belief was reset to the observed bin.
    pub recovered: bool,
    pub metrics: BeliefMetrics,
}

enum BeliefStore {
    Owned(BeliefState),
    Shared(SharedBelief),
}

impl BeliefStore {
    fn with_mut<R>(&mut self, f: impl FnOnce(&mut BeliefState) -> R) -> Result<R, EstimatorError> {
        match self {
            BeliefStore::Owned(belief) => Ok(f(belief)),
            BeliefStore::Shared(shared) => {
                shared.with_belief(f).ok_or(EstimatorError::SharedBeliefMissing)
            }
        }
    }

    fn snapshot(&self) -> Result<BeliefState, EstimatorError> {
        match self {
            BeliefStore::Owned(belief) => Ok(belief.clone()),
            BeliefStore::Shared(shared) => shared.snapshot().ok_or(EstimatorError::SharedBeliefMissing),
        }
    }
}

pub struct LocationEstimator<S: StateSpace> {
    space: S,
    config: EstimatorConfig,
    engine: BeliefUpdateEngine,
    sampler: KernelSampler,
    store: BeliefStore,
    gate: VisibilityGate,
    velocity: VelocityModel<S::Point>,
    update_timer: f64,
    updates: u64,
    mean_displacement: S::Point,
    /// Belief position of the task attention came from.
    handover: Option<S::Point>,
}

impl<S: StateSpace> LocationEstimator<S> {
    /// Estimator with its own belief, one-hot at the bin holding `start`.
    pub fn new(space: S, config: EstimatorConfig, start: S::Point) -> Result<Self, EstimatorError> {
        config.validate()?;
        let start_bin = start_bin(&space, start)?;
        let belief = BeliefState::one_hot(space.bin_count(), start_bin)?;
        Ok(Self::assemble(space, config, BeliefStore::Owned(belief)))
    }

    /// Estimator whose belief lives in `shared`. The first estimator attached
    /// to a fresh handle initialises it at `start`.
    pub fn with_shared_belief(
        space: S,
        config: EstimatorConfig,
        start: S::Point,
        shared: SharedBelief,
    ) -> Result<Self, EstimatorError> {
        config.validate()?;
        let start_bin = start_bin(&space, start)?;
        let initial = BeliefState::one_hot(space.bin_count(), start_bin)?;
        shared.initialize_with(|| initial);

        let existing = shared.snapshot().ok_or(EstimatorError::SharedBeliefMissing)?;
        if existing.len() != space.bin_count() {
            return Err(BeliefError::DimensionMismatch {
                expected: space.bin_count(),
                found: existing.len(),
            }
            .into());
        }
        Ok(Self::assemble(space, config, BeliefStore::Shared(shared)))
    }

    fn assemble(space: S, config: EstimatorConfig, store: BeliefStore) -> Self {
        let sampler = match config.seed {
            Some(seed) => KernelSampler::seeded(seed),
            None => KernelSampler::from_entropy(),
        };
        Self {
            engine: BeliefUpdateEngine::new(config.parallelism()),
            velocity: VelocityModel::new(&config),
            gate: VisibilityGate::default(),
            update_timer: 0.0,
            updates: 0,
            mean_displacement: <S::Point as Point>::zero(),
            handover: None,
            sampler,
            store,
            space,
            config,
        }
    }

    pub fn space(&self) -> &S {
        &self.space
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn update_count(&self) -> u64 {
        self.updates
    }

    pub fn is_visible(&self) -> bool {
        self.gate.is_visible(&self.config)
    }

    /// Advances time by `dt` seconds and updates the belief when the update
    /// period has elapsed. Focus changes in `percept` fire the focus events.
    pub fn step(
        &mut self,
        dt: f64,
        percept: &Percept<S::Point>,
    ) -> Result<Option<UpdateReport<S::Point>>, EstimatorError> {
        if percept.focused && !self.gate.is_focused() {
            self.on_focus_gained();
        } else if !percept.focused && self.gate.is_focused() {
            self.on_focus_lost();
        }

        self.gate.advance(dt);
        self.update_timer += dt;
        if self.update_timer <= self.config.update_period {
            return Ok(None);
        }
        self.update_timer = 0.0;
        self.update_now(percept).map(Some)
    }

    /// Runs one belief update immediately.
    pub fn update_now(
        &mut self,
        percept: &Percept<S::Point>,
    ) -> Result<UpdateReport<S::Point>, EstimatorError> {
        let visible = self.is_visible();
        let observed_bin = if visible {
            percept.position.and_then(|p| self.space.point_to_bin(p))
        } else {
            None
        };

        let estimate = self
            .velocity
            .advance(visible, percept.velocity, &self.config, &mut self.sampler)?;
        let samples = self
            .sampler
            .sample(self.config.number_of_samples, estimate, self.config.sigma)?;
        self.mean_displacement = samples.mean();

        let observation = if visible {
            Observation::seen(observed_bin, self.config.observation_probability)
        } else {
            Observation::hidden()
        };

        let engine = &self.engine;
        let space = &self.space;
        let outcome = self
            .store
            .with_mut(|belief| engine.update(space, belief, &samples, &observation))?;

        let (summary, recovered) = match (outcome, observed_bin) {
            (Ok(summary), _) => (Some(summary), false),
            (Err(BeliefError::DegenerateNormalization { mass }), Some(bin)) => {
                warn!(
                    target: "beliefgrid_core::estimator",
                    mass,
                    bin,
                    "belief collapsed; resetting to observed bin"
                );
                self.store.with_mut(|belief| belief.reset_to(bin))??;
                (None, true)
            }
            (Err(err), _) => return Err(err.into()),
        };

        self.updates += 1;
        let metrics = BeliefMetrics::from_belief(&self.store.snapshot()?);
        if tracing::enabled!(target: "beliefgrid_core::estimator", Level::DEBUG) {
            event!(
                target: "beliefgrid_core::estimator",
                Level::DEBUG,
                update = self.updates,
                visible,
                observed_bin = ?observed_bin,
                estimate = ?estimate,
                entropy = metrics.entropy,
                argmax = metrics.argmax_bin,
                recovered,
            );
        }

        Ok(UpdateReport {
            update_index: self.updates,
            visible,
            observed_bin,
            estimated_displacement: estimate,
            velocity_spread: self.velocity.spread(),
            mean_displacement: self.mean_displacement,
            summary,
            recovered,
            metrics,
        })
    }

    /// Puts the belief back at the start bin.
    pub fn on_episode_end(&mut self) -> Result<(), EstimatorError> {
        match &mut self.store {
            BeliefStore::Owned(belief) => belief.reset(),
            BeliefStore::Shared(shared) => {
                if !shared.reset() {
                    return Err(EstimatorError::SharedBeliefMissing);
                }
            }
        }
        self.update_timer = 0.0;
        self.velocity = VelocityModel::new(&self.config);
        Ok(())
    }

    pub fn on_focus_gained(&mut self) {
        self.gate.focus_gained();
        self.update_timer = 0.0;
        self.handover = None;
    }

    /// Focus arrives from another task whose belief places its object at
    /// `previous`. Until `persistence_time` has passed, `belief_position`
    /// reports that position instead of this estimator's argmax.
    pub fn on_focus_gained_from(&mut self, previous: S::Point) {
        self.on_focus_gained();
        self.handover = Some(previous);
    }

    pub fn on_focus_lost(&mut self) {
        self.gate.focus_lost();
        self.handover = None;
    }

    pub fn belief(&self) -> Result<BeliefState, EstimatorError> {
        self.store.snapshot()
    }

    pub fn argmax_bin(&self) -> Result<usize, EstimatorError> {
        Ok(self.store.snapshot()?.argmax())
    }

    pub fn argmax_position(&self) -> Result<S::Point, EstimatorError> {
        Ok(self.space.bin_to_point(self.argmax_bin()?))
    }

    /// Position the agent currently believes the object to be at.
    pub fn belief_position(&self) -> Result<S::Point, EstimatorError> {
        match self.handover {
            Some(previous) if self.gate.is_persisting(&self.config) => Ok(previous),
            _ => self.argmax_position(),
        }
    }

    /// Mean of the most recent transition samples.
    pub fn average_displacement(&self) -> S::Point {
        self.mean_displacement
    }

    pub fn velocity_estimate(&self) -> S::Point {
        self.velocity.estimate()
    }
}

fn start_bin<S: StateSpace>(space: &S, start: S::Point) -> Result<usize, EstimatorError> {
    space
        .point_to_bin(start)
        .ok_or_else(|| EstimatorError::StartOutsideSpace(format!("{start:?}")))
}

#[derive(Debug, Clone, PartialEq)]
pub enum EstimatorError {
    Config(ConfigError),
    Geometry(GeometryError),
    Kernel(KernelError),
    Belief(BeliefError),
    StartOutsideSpace(String),
    SharedBeliefMissing,
}

impl fmt::Display for EstimatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatorError::Config(err) => write!(f, "invalid estimator config: {err}"),
            EstimatorError::Geometry(err) => write!(f, "invalid geometry: {err}"),
            EstimatorError::Kernel(err) => write!(f, "sampling failed: {err}"),
            EstimatorError::Belief(err) => write!(f, "belief update failed: {err}"),
            EstimatorError::StartOutsideSpace(point) => {
                write!(f, "start point {point} lies outside the state space")
            }
            EstimatorError::SharedBeliefMissing => {
                write!(f, "shared belief was never initialized")
            }
        }
    }
}

impl std::error::Error for EstimatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EstimatorError::Config(err) => Some(err),
            EstimatorError::Geometry(err) => Some(err),
            EstimatorError::Kernel(err) => Some(err),
            EstimatorError::Belief(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for EstimatorError {
    fn from(err: ConfigError) -> Self {
        EstimatorError::Config(err)
    }
}

impl From<GeometryError> for EstimatorError {
    fn from(err: GeometryError) -> Self {
        EstimatorError::Geometry(err)
    }
}

impl From<KernelError> for EstimatorError {
    fn from(err: KernelError) -> Self {
        EstimatorError::Kernel(err)
    }
}

impl From<BeliefError> for EstimatorError {
    fn from(err: BeliefError) -> Self {
        EstimatorError::Belief(err)
    }
}
