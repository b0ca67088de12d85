//! # Prediction oracles
//!
//! A prediction oracle answers a single question:
//! how congested will the road at this point be at this time, on a `[0, 100]` scale?
//!
//! Oracles are assumed to be slow and unreliable,
//! and there is no batching: every point is its own request.
//! Callers should go through [`crate::fanout::FanOutExecutor`],
//! which bounds each call and never lets a failure escape.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use geo::Point;
use std::sync::Arc;
use thiserror::Error;

mod cache;
mod http;

pub use cache::CachedOracle;
pub use http::HttpOracle;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    #[error("The prediction oracle did not answer in time")]
    Timeout,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("The prediction oracle answered with HTTP status {0}")]
    Status(u16),
    #[error("Invalid response from the prediction oracle: {0}")]
    InvalidResponse(String),
    #[error("Invalid oracle configuration: {0}")]
    Configuration(String),
}

/// A point-wise congestion prediction service.
#[async_trait]
pub trait PredictionOracle: Send + Sync {
    /// Predicts congestion at `point` (x = longitude, y = latitude) at time `at`.
    ///
    /// Implementations should return values in `[0, 100]`.
    ///
    /// # Errors
    ///
    /// Any failure to get a usable answer, including timeouts enforced by the implementation itself.
    async fn predict(&self, point: Point, at: DateTime<FixedOffset>) -> Result<f64, OracleError>;
}

#[async_trait]
impl<T: PredictionOracle + ?Sized> PredictionOracle for Arc<T> {
    async fn predict(&self, point: Point, at: DateTime<FixedOffset>) -> Result<f64, OracleError> {
        (**self).predict(point, at).await
    }
}

#[async_trait]
impl<T: PredictionOracle + ?Sized> PredictionOracle for Box<T> {
    async fn predict(&self, point: Point, at: DateTime<FixedOffset>) -> Result<f64, OracleError> {
        (**self).predict(point, at).await
    }
}
