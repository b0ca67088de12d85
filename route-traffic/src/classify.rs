//! # Traffic classification
//!
//! The single policy that turns a congestion value in `[0, 100]` into a [`TrafficLevel`].
//! Every stage that needs a band (propagation, route summaries, forecasts)
//! goes through the same [`ClassificationPolicy`].

use crate::model::TrafficLevel;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Delay ratio at which a provider-reported step is considered to reach the medium band.
const PROVIDER_MEDIUM_RATIO: f64 = 1.15;
/// Delay ratio at which a provider-reported step is considered to reach the high band.
const PROVIDER_HIGH_RATIO: f64 = 1.4;
/// Delay ratio mapped to the top of the scale.
const PROVIDER_SATURATION_RATIO: f64 = 2.0;

#[derive(Debug, Error, PartialEq)]
pub enum InvalidPolicyError {
    #[error("Thresholds must satisfy 0 <= medium < high <= 100 (got medium = {medium}, high = {high})")]
    Thresholds { medium: f64, high: f64 },
}

/// Low/medium/high cutoffs on the congestion scale.
///
/// A value `>= high` is [`TrafficLevel::High`],
/// `>= medium` is [`TrafficLevel::Medium`],
/// and anything below is [`TrafficLevel::Low`].
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationPolicy {
    pub medium: f64,
    pub high: f64,
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self {
            medium: 35.0,
            high: 60.0,
        }
    }
}

impl ClassificationPolicy {
    /// Creates a policy with custom cutoffs.
    ///
    /// # Errors
    ///
    /// Fails unless `0 <= medium < high <= 100`.
    pub fn new(medium: f64, high: f64) -> Result<Self, InvalidPolicyError> {
        let policy = Self { medium, high };
        policy.validate()?;
        Ok(policy)
    }

    /// Checks the threshold ordering.
    ///
    /// # Errors
    ///
    /// Fails unless `0 <= medium < high <= 100`.
    pub fn validate(&self) -> Result<(), InvalidPolicyError> {
        if (0.0..self.high).contains(&self.medium) && self.high <= 100.0 {
            Ok(())
        } else {
            Err(InvalidPolicyError::Thresholds {
                medium: self.medium,
                high: self.high,
            })
        }
    }

    /// Classifies a congestion value.
    ///
    /// NaN is the only input that yields [`TrafficLevel::Unknown`].
    pub fn classify(&self, value: f64) -> TrafficLevel {
        if value.is_nan() {
            TrafficLevel::Unknown
        } else if value >= self.high {
            TrafficLevel::High
        } else if value >= self.medium {
            TrafficLevel::Medium
        } else {
            TrafficLevel::Low
        }
    }

    /// Maps a provider delay ratio (traffic-aware over free-flow duration)
    /// onto the congestion scale.
    ///
    /// The map is piecewise linear, with knots chosen so that the provider's own
    /// notion of "medium" (1.15x) and "high" (1.4x) lands exactly on this policy's cutoffs.
    /// No delay is 0, and anything at or past 2x saturates at 100.
    pub fn value_for_delay_ratio(&self, ratio: f64) -> f64 {
        let knots = [
            (1.0, 0.0),
            (PROVIDER_MEDIUM_RATIO, self.medium),
            (PROVIDER_HIGH_RATIO, self.high),
            (PROVIDER_SATURATION_RATIO, 100.0),
        ];

        if ratio.is_nan() || ratio <= 1.0 {
            return 0.0;
        }

        for pair in knots.windows(2) {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            if ratio <= x1 {
                return y0 + (ratio - x0) / (x1 - x0) * (y1 - y0);
            }
        }

        100.0
    }
}
