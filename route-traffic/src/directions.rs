//! # Directions providers
//!
//! Where route alternatives come from.
//! The engine never invents geometry: if the provider fails, the request fails.

use crate::model::RouteAlternative;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use geo::Point;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("The directions provider is unavailable: {0}")]
    Unavailable(String),
    #[error("The directions provider is rate limiting requests")]
    RateLimited,
    #[error("Invalid response from the directions provider: {0}")]
    InvalidResponse(String),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOptions {
    pub departure: DateTime<FixedOffset>,
    #[serde(default)]
    pub avoid_tolls: bool,
    #[serde(default)]
    pub avoid_highways: bool,
}

impl RouteOptions {
    pub fn departing_at(departure: DateTime<FixedOffset>) -> Self {
        Self {
            departure,
            avoid_tolls: false,
            avoid_highways: false,
        }
    }
}

#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    /// Fetches the route alternatives between two points (x = longitude, y = latitude).
    ///
    /// The result may be empty.
    /// Each alternative's `id` is its ordinal in the result.
    ///
    /// # Errors
    ///
    /// Any failure to get alternatives, including rate limiting.
    async fn routes(
        &self,
        origin: Point,
        destination: Point,
        options: &RouteOptions,
    ) -> Result<Vec<RouteAlternative>, ProviderError>;
}

/// Serves recorded alternatives from a JSON file (an array of routes).
///
/// The same alternatives are returned for any origin and destination.
pub struct FileDirectionsProvider {
    path: PathBuf,
}

impl FileDirectionsProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DirectionsProvider for FileDirectionsProvider {
    async fn routes(
        &self,
        origin: Point,
        destination: Point,
        _options: &RouteOptions,
    ) -> Result<Vec<RouteAlternative>, ProviderError> {
        debug!(
            path = %self.path.display(),
            origin = ?origin,
            destination = ?destination,
            "Loading recorded route alternatives"
        );

        let bytes = tokio::fs::read(&self.path).await?;
        let routes: Vec<RouteAlternative> = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(routes
            .into_iter()
            .enumerate()
            .map(|(id, route)| route.normalized(id))
            .collect())
    }
}
