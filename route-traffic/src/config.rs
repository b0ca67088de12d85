//! # Engine configuration
//!
//! Every knob has a default, so an empty JSON object (`{}`) is a valid configuration.

use crate::classify::{ClassificationPolicy, InvalidPolicyError};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid classification policy: {0}")]
    Classification(#[from] InvalidPolicyError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// An inclusive range of local hours, such as a rush hour window.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u32) -> bool {
        (self.start..=self.end).contains(&hour)
    }
}

/// Thresholds for the advisory text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub morning_rush: HourWindow,
    pub evening_rush: HourWindow,
    /// Best-route average traffic above which a departure-time suggestion is made.
    pub heavy_traffic_threshold: f64,
    /// Best-to-worst average traffic gap above which the routes are compared.
    pub spread_threshold: f64,
    /// Best-route traffic delay (minutes) above which the delay is disclosed.
    pub delay_threshold_min: f64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            morning_rush: HourWindow::new(7, 9),
            evening_rush: HourWindow::new(17, 19),
            heavy_traffic_threshold: 60.0,
            spread_threshold: 20.0,
            delay_threshold_min: 15.0,
        }
    }
}

/// Defaults for forecast requests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub horizon_min: u32,
    pub interval_min: u32,
    /// Max number of forecast instants evaluated at once.
    pub concurrency: usize,
    /// Max number of points in one forecast; longer requests are rejected.
    pub max_points: usize,
    /// Confidence attached to model-backed forecast points.
    pub model_confidence: f64,
    /// Confidence attached to heuristic forecast points.
    pub heuristic_confidence: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_min: 6 * 60,
            interval_min: 10,
            concurrency: 4,
            max_points: 288,
            model_confidence: 0.92,
            heuristic_confidence: 0.65,
        }
    }
}

impl ForecastConfig {
    pub fn horizon(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.horizon_min))
    }

    pub fn interval(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.interval_min))
    }
}

/// Configuration for [`crate::RouteTrafficEngine`].
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Max number of oracle queries per route when analyzing a single route.
    pub sample_budget: usize,
    /// Max number of oracle queries per route when ranking several alternatives.
    pub comparison_sample_budget: usize,
    /// Upper bound on each individual oracle call.
    #[serde(rename = "call_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub call_timeout: Duration,
    /// Neutral congestion value substituted whenever the oracle can't answer.
    pub fallback_value: f64,
    /// How many steps away from a sample its value still has influence.
    pub propagation_radius: usize,
    pub classification: ClassificationPolicy,
    /// Whether provider-reported per-step traffic durations take precedence over the oracle.
    pub prefer_provider_traffic: bool,
    /// Average traffic margin required before a selection is replaced by the best route.
    pub hysteresis_threshold: f64,
    pub advisor: AdvisorConfig,
    pub forecast: ForecastConfig,
    /// Capacity of the optional oracle answer cache (0 disables it).
    pub oracle_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_budget: 8,
            comparison_sample_budget: 5,
            call_timeout: Duration::from_secs(3),
            fallback_value: 50.0,
            propagation_radius: 3,
            classification: ClassificationPolicy::default(),
            prefer_provider_traffic: true,
            hysteresis_threshold: 15.0,
            advisor: AdvisorConfig::default(),
            forecast: ForecastConfig::default(),
            oracle_cache_capacity: 0,
        }
    }
}

impl EngineConfig {
    /// Loads and validates a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails if the file can't be read, isn't valid JSON,
    /// or describes an invalid configuration (see [`EngineConfig::validate`]).
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants that serde can't express.
    ///
    /// # Errors
    ///
    /// Fails on an invalid classification policy, a zero timeout,
    /// a fallback value off the `[0, 100]` scale, a zero forecast interval,
    /// or a forecast point cap too small for the default horizon.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.classification.validate()?;

        if self.call_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "call_timeout_ms must be positive".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.fallback_value) {
            return Err(ConfigError::Invalid(format!(
                "fallback_value must be within [0, 100]; got {}",
                self.fallback_value
            )));
        }
        let forecast = &self.forecast;
        if forecast.interval_min == 0 {
            return Err(ConfigError::Invalid(
                "forecast.interval_min must be positive".to_string(),
            ));
        }
        let default_points = forecast.horizon_min / forecast.interval_min + 1;
        if !usize::try_from(default_points).is_ok_and(|points| points <= forecast.max_points) {
            return Err(ConfigError::Invalid(format!(
                "forecast.max_points ({}) is too small for the default horizon and interval ({default_points} points)",
                forecast.max_points
            )));
        }
        let advisor = &self.advisor;
        for window in [advisor.morning_rush, advisor.evening_rush] {
            if window.start > window.end || window.end > 23 {
                return Err(ConfigError::Invalid(format!(
                    "rush window {}..={} is not a valid range of hours",
                    window.start, window.end
                )));
            }
        }

        Ok(())
    }
}
