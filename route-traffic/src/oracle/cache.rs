use crate::oracle::{OracleError, PredictionOracle};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use geo::Point;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::trace;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    lng_bits: u64,
    lat_bits: u64,
    timestamp_ms: i64,
}

impl CacheKey {
    fn new(point: Point, at: DateTime<FixedOffset>) -> Self {
        Self {
            lng_bits: point.x().to_bits(),
            lat_bits: point.y().to_bits(),
            timestamp_ms: at.timestamp_millis(),
        }
    }
}

/// Remembers successful answers of another oracle for identical `(point, time)` queries.
///
/// Failures are never cached, so a flaky oracle gets another chance on the next request.
/// This changes latency only; the answers are whatever the wrapped oracle said.
pub struct CachedOracle<O> {
    inner: O,
    cache: Mutex<LruCache<CacheKey, f64>>,
}

impl<O: PredictionOracle> CachedOracle<O> {
    pub fn new(inner: O, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    fn lookup(&self, key: &CacheKey) -> Option<f64> {
        // A poisoned lock just means we skip the cache.
        self.cache.lock().ok()?.get(key).copied()
    }

    fn store(&self, key: CacheKey, value: f64) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, value);
        }
    }
}

#[async_trait]
impl<O: PredictionOracle> PredictionOracle for CachedOracle<O> {
    async fn predict(&self, point: Point, at: DateTime<FixedOffset>) -> Result<f64, OracleError> {
        let key = CacheKey::new(point, at);
        if let Some(value) = self.lookup(&key) {
            trace!(lat = point.y(), lng = point.x(), "Oracle cache hit");
            return Ok(value);
        }

        let value = self.inner.predict(point, at).await?;
        self.store(key, value);
        Ok(value)
    }
}
