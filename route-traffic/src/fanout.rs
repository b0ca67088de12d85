//! # Fan-out oracle queries
//!
//! Issues one oracle call per sampled step, all at once, each bounded by a timeout.
//! Every call yields a [`PredictionSample`], whatever happened to it,
//! so a dead oracle costs accuracy but never availability.

use crate::config::EngineConfig;
use crate::model::Step;
use crate::oracle::{OracleError, PredictionOracle};
use chrono::{DateTime, FixedOffset};
use futures::future::join_all;
use geo::Point;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// What happened to a single oracle call.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleOutcome {
    Success,
    Timeout,
    Error,
}

/// The result of querying the oracle for one step.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionSample {
    pub step_index: usize,
    /// The oracle's answer, if it gave a usable one.
    pub raw: Option<f64>,
    pub outcome: SampleOutcome,
    /// The value downstream stages should use:
    /// the raw answer on success, the fallback value otherwise.
    pub value: f64,
}

impl PredictionSample {
    pub fn is_success(&self) -> bool {
        self.outcome == SampleOutcome::Success
    }
}

/// Outcome counts for a batch of samples.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub requested: usize,
    pub succeeded: usize,
    pub timed_out: usize,
    pub failed: usize,
}

impl SampleSummary {
    pub fn from_samples(samples: &[PredictionSample]) -> Self {
        samples.iter().fold(
            Self {
                requested: samples.len(),
                ..Self::default()
            },
            |mut summary, sample| {
                match sample.outcome {
                    SampleOutcome::Success => summary.succeeded += 1,
                    SampleOutcome::Timeout => summary.timed_out += 1,
                    SampleOutcome::Error => summary.failed += 1,
                }
                summary
            },
        )
    }

    /// True when every call in the batch was replaced by the fallback value.
    pub fn is_all_fallback(&self) -> bool {
        self.succeeded == 0
    }
}

/// Runs bounded, concurrent oracle calls.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FanOutExecutor {
    call_timeout: Duration,
    fallback_value: f64,
}

impl FanOutExecutor {
    pub fn new(call_timeout: Duration, fallback_value: f64) -> Self {
        Self {
            call_timeout,
            fallback_value,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.call_timeout, config.fallback_value)
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn fallback_value(&self) -> f64 {
        self.fallback_value
    }

    /// Makes a single bounded oracle call.
    ///
    /// A call that outlives the timeout is dropped; its answer, if it ever comes, is discarded.
    pub async fn call<O: PredictionOracle + ?Sized>(
        &self,
        oracle: &O,
        step_index: usize,
        point: Point,
        at: DateTime<FixedOffset>,
    ) -> PredictionSample {
        let result = tokio::time::timeout(self.call_timeout, oracle.predict(point, at))
            .await
            .unwrap_or(Err(OracleError::Timeout));

        match result {
            Ok(value) if value.is_finite() => {
                let value = value.clamp(0.0, 100.0);
                PredictionSample {
                    step_index,
                    raw: Some(value),
                    outcome: SampleOutcome::Success,
                    value,
                }
            }
            Ok(value) => {
                warn!(step_index, value, "Oracle returned a non-finite value; using fallback");
                self.fallback(step_index, SampleOutcome::Error)
            }
            Err(OracleError::Timeout) => {
                warn!(
                    step_index,
                    timeout = ?self.call_timeout,
                    "Oracle call timed out; using fallback"
                );
                self.fallback(step_index, SampleOutcome::Timeout)
            }
            Err(e) => {
                warn!(step_index, error = %e, "Oracle call failed; using fallback");
                self.fallback(step_index, SampleOutcome::Error)
            }
        }
    }

    /// Queries every `(step_index, point)` pair concurrently.
    ///
    /// Samples come back in input order, one per pair.
    /// Wall-clock time is bounded by the call timeout, not by the number of points.
    pub async fn query_points<O: PredictionOracle + ?Sized>(
        &self,
        oracle: &O,
        points: &[(usize, Point)],
        at: DateTime<FixedOffset>,
    ) -> Vec<PredictionSample> {
        let samples = join_all(
            points
                .iter()
                .map(|&(step_index, point)| self.call(oracle, step_index, point, at)),
        )
        .await;

        let summary = SampleSummary::from_samples(&samples);
        debug!(
            requested = summary.requested,
            succeeded = summary.succeeded,
            timed_out = summary.timed_out,
            failed = summary.failed,
            "Fan-out batch complete"
        );

        samples
    }

    /// Queries the oracle at the start point of each of the given steps.
    ///
    /// Indices past the end of `steps` are ignored.
    pub async fn query_steps<O: PredictionOracle + ?Sized>(
        &self,
        oracle: &O,
        steps: &[Step],
        indices: &[usize],
        at: DateTime<FixedOffset>,
    ) -> Vec<PredictionSample> {
        let points: Vec<(usize, Point)> = indices
            .iter()
            .filter_map(|&index| steps.get(index).map(|step| (index, step.start)))
            .collect();
        self.query_points(oracle, &points, at).await
    }

    fn fallback(&self, step_index: usize, outcome: SampleOutcome) -> PredictionSample {
        PredictionSample {
            step_index,
            raw: None,
            outcome,
            value: self.fallback_value,
        }
    }
}
