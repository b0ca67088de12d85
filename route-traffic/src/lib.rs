//! # Route Traffic Scoring
//!
//! Estimates per-segment congestion for a set of candidate road routes
//! from a slow, unreliable point-wise prediction oracle, and ranks the routes.
//!
//! The pipeline for each route is:
//!
//! 1. [`sampler`] picks a bounded set of steps to query.
//! 2. [`fanout`] queries the oracle for those steps concurrently,
//!    each call bounded by a timeout, substituting a neutral fallback for failures.
//! 3. [`propagation`] spreads the sparse samples over every step and classifies each one.
//! 4. [`scoring`] reduces the route to a composite score (lower is better).
//! 5. [`selector`] and [`advisor`] rank the alternatives, pick one with hysteresis,
//!    and derive human-readable suggestions.
//!
//! [`forecast`] reuses the same oracle machinery to build a time series for a single route.
//! [`engine::RouteTrafficEngine`] ties it all together.

pub mod advisor;
pub mod classify;
pub mod config;
pub mod directions;
pub mod engine;
pub mod fanout;
pub mod forecast;
mod model;
pub mod oracle;
pub mod propagation;
pub mod sampler;
pub mod scoring;
pub mod selector;

#[cfg(test)]
mod testing;

// Flattened re-exports for the types nearly every caller needs.
pub use classify::ClassificationPolicy;
pub use config::EngineConfig;
pub use engine::{PlanError, PlanRequest, RouteEvaluation, RoutePlan, RouteTrafficEngine};
pub use model::{RouteAlternative, Step, StepSource, TrafficLevel};
pub use oracle::{OracleError, PredictionOracle};
pub use scoring::{RouteScore, ScoringPreferences, Severity};
