//! Mock oracles and route builders shared by the unit tests.

use crate::directions::{DirectionsProvider, ProviderError, RouteOptions};
use crate::model::{RouteAlternative, Step};
use crate::oracle::{OracleError, PredictionOracle};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone};
use geo::Point;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Longitude spacing between consecutive steps of [`straight_route`].
pub const STEP_SPACING_DEG: f64 = 0.01;
/// Latitude spacing between the [`straight_route`]s of different ids.
pub const ROUTE_SPACING_DEG: f64 = 0.1;
const BASE_LATITUDE: f64 = 12.0;

/// A fixed departure time (08:30 local, UTC+05:30).
pub fn departure() -> DateTime<FixedOffset> {
    at_hour(8)
}

/// The same day as [`departure`], at `hour:30` local time.
pub fn at_hour(hour: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(5 * 3600 + 1800)
        .unwrap()
        .with_ymd_and_hms(2025, 3, 14, hour, 30, 0)
        .unwrap()
}

/// A route heading due east, one step every [`STEP_SPACING_DEG`] degrees of longitude.
///
/// Each step is 1 km and 60 s, so the route is `step_count` km and `step_count` minutes long.
/// Routes with different ids run on parallel latitudes, so oracles can tell them apart.
pub fn straight_route(id: usize, step_count: usize) -> RouteAlternative {
    let steps = (0..step_count)
        .map(|index| Step::new(index, step_point(id, index), 1000.0, 60.0))
        .collect();
    RouteAlternative::new(id, steps)
}

#[allow(clippy::cast_precision_loss)]
pub fn step_point(route_id: usize, index: usize) -> Point {
    Point::new(
        index as f64 * STEP_SPACING_DEG,
        BASE_LATITUDE + route_id as f64 * ROUTE_SPACING_DEG,
    )
}

/// Recovers the step index of a [`straight_route`] point.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn step_index_of(point: Point) -> usize {
    (point.x() / STEP_SPACING_DEG).round() as usize
}

/// Recovers the route id of a [`straight_route`] point.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn route_id_of(point: Point) -> usize {
    ((point.y() - BASE_LATITUDE) / ROUTE_SPACING_DEG).round() as usize
}

/// An oracle backed by a closure.
pub struct FnOracle<F>(F);

impl<F> FnOracle<F>
where
    F: Fn(Point, DateTime<FixedOffset>) -> Result<f64, OracleError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> PredictionOracle for FnOracle<F>
where
    F: Fn(Point, DateTime<FixedOffset>) -> Result<f64, OracleError> + Send + Sync,
{
    async fn predict(&self, point: Point, at: DateTime<FixedOffset>) -> Result<f64, OracleError> {
        (self.0)(point, at)
    }
}

/// Always answers with the same value.
pub fn constant_oracle(
    value: f64,
) -> FnOracle<impl Fn(Point, DateTime<FixedOffset>) -> Result<f64, OracleError> + Send + Sync> {
    FnOracle::new(move |_, _| Ok(value))
}

/// Never answers successfully.
pub fn failing_oracle()
-> FnOracle<impl Fn(Point, DateTime<FixedOffset>) -> Result<f64, OracleError> + Send + Sync> {
    FnOracle::new(|_, _| Err(OracleError::Transport("connection refused".to_string())))
}

/// Answers with `values[i]` for the step with index `indices[i]` of a [`straight_route`],
/// and with `default` everywhere else.
pub fn scripted_oracle(
    indices: &[usize],
    values: &[f64],
    default: f64,
) -> FnOracle<impl Fn(Point, DateTime<FixedOffset>) -> Result<f64, OracleError> + Send + Sync> {
    let script: Vec<(usize, f64)> = indices.iter().copied().zip(values.iter().copied()).collect();
    FnOracle::new(move |point, _| {
        let index = step_index_of(point);
        Ok(script
            .iter()
            .find(|(i, _)| *i == index)
            .map_or(default, |(_, v)| *v))
    })
}

/// Sleeps before delegating to another oracle.
///
/// The delay is chosen per point, which makes it easy to script slow and fast calls.
pub struct DelayedOracle<O, D> {
    inner: O,
    delay: D,
}

impl<O, D> DelayedOracle<O, D>
where
    O: PredictionOracle,
    D: Fn(Point) -> Duration + Send + Sync,
{
    pub fn new(inner: O, delay: D) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<O, D> PredictionOracle for DelayedOracle<O, D>
where
    O: PredictionOracle,
    D: Fn(Point) -> Duration + Send + Sync,
{
    async fn predict(&self, point: Point, at: DateTime<FixedOffset>) -> Result<f64, OracleError> {
        tokio::time::sleep((self.delay)(point)).await;
        self.inner.predict(point, at).await
    }
}

/// Counts the calls made to another oracle.
pub struct CountingOracle<O> {
    inner: O,
    calls: AtomicUsize,
}

impl<O: PredictionOracle> CountingOracle<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<O: PredictionOracle> PredictionOracle for CountingOracle<O> {
    async fn predict(&self, point: Point, at: DateTime<FixedOffset>) -> Result<f64, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.predict(point, at).await
    }
}

/// Serves a fixed set of alternatives.
pub struct StaticDirectionsProvider(pub Vec<RouteAlternative>);

#[async_trait]
impl DirectionsProvider for StaticDirectionsProvider {
    async fn routes(
        &self,
        _origin: Point,
        _destination: Point,
        _options: &RouteOptions,
    ) -> Result<Vec<RouteAlternative>, ProviderError> {
        Ok(self.0.clone())
    }
}

/// Always rate limited.
pub struct RateLimitedDirectionsProvider;

#[async_trait]
impl DirectionsProvider for RateLimitedDirectionsProvider {
    async fn routes(
        &self,
        _origin: Point,
        _destination: Point,
        _options: &RouteOptions,
    ) -> Result<Vec<RouteAlternative>, ProviderError> {
        Err(ProviderError::RateLimited)
    }
}
