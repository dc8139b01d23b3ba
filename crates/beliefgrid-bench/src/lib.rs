pub mod analytics;
pub mod config;
pub mod logging;
pub mod scenario;
pub mod telemetry;
