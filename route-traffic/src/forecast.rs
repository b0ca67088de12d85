//! # Congestion forecasts
//!
//! Builds a time series for a single route by asking the oracle about the route's
//! origin, the midpoint between origin and destination, and the destination,
//! at evenly spaced future instants.
//!
//! Each instant is independent. When no oracle call succeeds for an instant,
//! it falls back to an hour-of-day heuristic with a lower confidence,
//! so callers can tell model-backed points from guesses.

use crate::classify::ClassificationPolicy;
use crate::config::{EngineConfig, ForecastConfig, HourWindow};
use crate::fanout::FanOutExecutor;
use crate::model::TrafficLevel;
use crate::oracle::PredictionOracle;
use chrono::{DateTime, FixedOffset, TimeDelta, Timelike};
use futures::{StreamExt, stream};
use geo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq)]
pub enum ForecastError {
    #[error("The forecast interval must be positive (got {0})")]
    InvalidInterval(TimeDelta),
    #[error("The forecast horizon must not be negative or run past the end of time (got {0})")]
    InvalidHorizon(TimeDelta),
    #[error("The forecast would have more than {max_points} points")]
    TooManyPoints { max_points: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForecastRequest {
    pub route_id: String,
    pub origin: Point,
    pub destination: Point,
    /// Free-flow duration of the route, in minutes.
    pub base_duration_min: f64,
    pub start: DateTime<FixedOffset>,
    pub horizon: TimeDelta,
    pub interval: TimeDelta,
}

impl ForecastRequest {
    /// The instants to forecast: `start`, `start + interval`, ... up to and including `start + horizon`.
    ///
    /// # Errors
    ///
    /// Fails if the interval is not positive, the horizon is negative or ends past the
    /// representable range, or there would be more than `max_points` instants.
    pub fn instants(
        &self,
        max_points: usize,
    ) -> Result<Vec<DateTime<FixedOffset>>, ForecastError> {
        if self.interval <= TimeDelta::zero() {
            return Err(ForecastError::InvalidInterval(self.interval));
        }
        if self.horizon < TimeDelta::zero()
            || self.start.checked_add_signed(self.horizon).is_none()
        {
            return Err(ForecastError::InvalidHorizon(self.horizon));
        }

        let mut instants = Vec::new();
        let mut offset = Some(TimeDelta::zero());
        while let Some(current) = offset.filter(|o| *o <= self.horizon) {
            if instants.len() == max_points {
                return Err(ForecastError::TooManyPoints { max_points });
            }
            // Every offset up to the horizon is representable (checked above).
            let instant = self
                .start
                .checked_add_signed(current)
                .ok_or(ForecastError::InvalidHorizon(self.horizon))?;
            instants.push(instant);
            offset = current.checked_add(&self.interval);
        }
        Ok(instants)
    }

    fn representative_points(&self) -> [(usize, Point); 3] {
        let midpoint = Point::new(
            (self.origin.x() + self.destination.x()) / 2.0,
            (self.origin.y() + self.destination.y()) / 2.0,
        );
        [(0, self.origin), (1, midpoint), (2, self.destination)]
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastBasis {
    /// Derived from oracle predictions.
    Model,
    /// Derived from the time of day alone.
    Heuristic,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub time: DateTime<FixedOffset>,
    pub duration_min: f64,
    pub average_speed_kmh: f64,
    pub congestion_level: TrafficLevel,
    /// Mean oracle value for this instant; absent for heuristic points.
    pub congestion: Option<f64>,
    pub confidence: f64,
    pub basis: ForecastBasis,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub route_id: String,
    pub points: Vec<ForecastPoint>,
}

pub struct ForecastDriver {
    executor: FanOutExecutor,
    policy: ClassificationPolicy,
    config: ForecastConfig,
    rush_hours: [HourWindow; 2],
}

impl ForecastDriver {
    pub fn new(
        executor: FanOutExecutor,
        policy: ClassificationPolicy,
        config: ForecastConfig,
        rush_hours: [HourWindow; 2],
    ) -> Self {
        Self {
            executor,
            policy,
            config,
            rush_hours,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            FanOutExecutor::from_config(config),
            config.classification,
            config.forecast.clone(),
            [config.advisor.morning_rush, config.advisor.evening_rush],
        )
    }

    /// Forecasts every instant of the request, returned in time order.
    ///
    /// At most `concurrency` instants are in flight at once.
    /// Oracle failures never fail the forecast; they only lower its confidence.
    ///
    /// # Errors
    ///
    /// Fails if the request's interval or horizon is invalid.
    pub async fn forecast<O: PredictionOracle + ?Sized>(
        &self,
        oracle: &O,
        request: &ForecastRequest,
    ) -> Result<Forecast, ForecastError> {
        let instants = request.instants(self.config.max_points)?;
        debug!(
            route_id = %request.route_id,
            instants = instants.len(),
            "Forecasting route congestion"
        );

        let points: Vec<ForecastPoint> = stream::iter(instants)
            .map(|at| self.forecast_at(oracle, request, at))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let heuristic = points
            .iter()
            .filter(|p| p.basis == ForecastBasis::Heuristic)
            .count();
        if heuristic > 0 {
            warn!(
                route_id = %request.route_id,
                heuristic,
                total = points.len(),
                "Some forecast points fell back to the time-of-day heuristic"
            );
        }

        Ok(Forecast {
            route_id: request.route_id.clone(),
            points,
        })
    }

    async fn forecast_at<O: PredictionOracle + ?Sized>(
        &self,
        oracle: &O,
        request: &ForecastRequest,
        at: DateTime<FixedOffset>,
    ) -> ForecastPoint {
        let samples = self
            .executor
            .query_points(oracle, &request.representative_points(), at)
            .await;
        let values: Vec<f64> = samples
            .iter()
            .filter(|s| s.is_success())
            .map(|s| s.value)
            .collect();

        if values.is_empty() {
            self.heuristic_point(request.base_duration_min, at)
        } else {
            #[allow(clippy::cast_precision_loss, reason = "at most three values")]
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            self.model_point(request.base_duration_min, mean, at)
        }
    }

    /// Maps a congestion value to a duration and speed, banded by the classification policy.
    pub fn model_point(
        &self,
        base_duration_min: f64,
        value: f64,
        time: DateTime<FixedOffset>,
    ) -> ForecastPoint {
        let level = self.policy.classify(value);
        let (speed, multiplier) = match level {
            TrafficLevel::High => (
                (60.0 - value * 0.6).max(15.0),
                1.5 + (value - self.policy.high) / 100.0,
            ),
            TrafficLevel::Medium => (
                (60.0 - value * 0.5).max(30.0),
                1.2 + (value - self.policy.medium) / 200.0,
            ),
            TrafficLevel::Low | TrafficLevel::Unknown => {
                ((65.0 - value * 0.3).max(45.0), 0.9 + value / 200.0)
            }
        };

        ForecastPoint {
            time,
            duration_min: scaled_duration(base_duration_min, multiplier),
            average_speed_kmh: speed.round(),
            congestion_level: level,
            congestion: Some(value),
            confidence: self.config.model_confidence,
            basis: ForecastBasis::Model,
        }
    }

    /// Guesses from the local hour alone: rush hours are slow, daytime and evening moderate.
    pub fn heuristic_point(
        &self,
        base_duration_min: f64,
        time: DateTime<FixedOffset>,
    ) -> ForecastPoint {
        let hour = time.hour();
        let (level, speed, multiplier) = if self.rush_hours.iter().any(|w| w.contains(hour)) {
            (TrafficLevel::High, 30.0, 1.6)
        } else if (10..=16).contains(&hour) || (20..=23).contains(&hour) {
            (TrafficLevel::Medium, 45.0, 1.2)
        } else {
            (TrafficLevel::Low, 60.0, 1.0)
        };

        ForecastPoint {
            time,
            duration_min: scaled_duration(base_duration_min, multiplier),
            average_speed_kmh: speed,
            congestion_level: level,
            congestion: None,
            confidence: self.config.heuristic_confidence,
            basis: ForecastBasis::Heuristic,
        }
    }
}

/// Whole minutes, and never less than one.
fn scaled_duration(base_duration_min: f64, multiplier: f64) -> f64 {
    (base_duration_min * multiplier).round().max(1.0)
}
