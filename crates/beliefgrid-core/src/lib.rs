pub mod belief;
pub mod estimator;
pub mod geometry;
pub mod kernel;

pub use belief::{
    BeliefError, BeliefMetrics, BeliefState, BeliefUpdateEngine, Observation, Parallelism,
    Region, RegionProjection, SharedBelief, UpdateSummary,
};
pub use estimator::{
    EstimatorConfig, EstimatorError, LocationEstimator, ParallelMode, Percept, UpdateReport,
};
pub use geometry::{Area, BinLayout, GeometryError, GridSpec, LineSpec, Point, StateSpace, Vec2};
pub use kernel::{KernelError, KernelSampler, SIGMA_FLOOR, TransitionSamples};

pub struct AppInfo;

impl AppInfo {
    pub const fn name() -> &'static str {
        "beliefgrid"
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}
