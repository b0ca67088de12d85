//! # Engine
//!
//! The two call paths ("analyze one route" and "rank N alternatives")
//! share the same sample, fan-out, propagate and score pipeline;
//! they differ only in the per-route sample budget.

use crate::advisor::{Advisor, Advisories};
use crate::config::EngineConfig;
use crate::directions::{DirectionsProvider, ProviderError, RouteOptions};
use crate::fanout::{FanOutExecutor, SampleSummary};
use crate::forecast::{Forecast, ForecastDriver, ForecastError, ForecastRequest};
use crate::model::RouteAlternative;
use crate::oracle::{CachedOracle, PredictionOracle};
use crate::propagation::Propagator;
use crate::sampler::sample_indices;
use crate::scoring::{RouteScore, RouteScorer, ScoringPreferences};
use crate::selector::{RouteSelector, compare_scores};
use chrono::{DateTime, FixedOffset, Timelike};
use futures::future::join_all;
use geo::Point;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Unable to get routes: {0}")]
    ProviderUnavailable(#[from] ProviderError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub origin: Point,
    pub destination: Point,
    pub options: RouteOptions,
    #[serde(default)]
    pub preferences: ScoringPreferences,
}

/// A route after propagation, with its score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteEvaluation {
    /// The route, with every step assessed.
    pub route: RouteAlternative,
    pub score: RouteScore,
    /// How the oracle fared while sampling this route.
    pub oracle: SampleSummary,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    /// Every alternative, best first.
    pub routes: Vec<RouteEvaluation>,
    /// Id of the best route.
    pub recommended: Option<usize>,
    /// Id of the selected route, after hysteresis.
    pub selected: Option<usize>,
    pub advisories: Advisories,
    pub departure: DateTime<FixedOffset>,
}

pub struct RouteTrafficEngine<O> {
    oracle: O,
    config: EngineConfig,
    executor: FanOutExecutor,
    propagator: Propagator,
    forecaster: ForecastDriver,
}

impl RouteTrafficEngine<Box<dyn PredictionOracle>> {
    /// Builds an engine over a type-erased oracle,
    /// wrapped in an answer cache when `oracle_cache_capacity` is non-zero.
    pub fn boxed<O: PredictionOracle + 'static>(oracle: O, config: EngineConfig) -> Self {
        let capacity = NonZeroUsize::new(config.oracle_cache_capacity);
        let oracle: Box<dyn PredictionOracle> = match capacity {
            Some(capacity) => {
                debug!(capacity = capacity.get(), "Caching oracle answers");
                Box::new(CachedOracle::new(oracle, capacity))
            }
            None => Box::new(oracle),
        };
        Self::new(oracle, config)
    }
}

impl<O: PredictionOracle> RouteTrafficEngine<O> {
    /// Creates an engine. The configuration is assumed to be valid
    /// (see [`EngineConfig::validate`]).
    pub fn new(oracle: O, config: EngineConfig) -> Self {
        Self {
            executor: FanOutExecutor::from_config(&config),
            propagator: Propagator::from_config(&config),
            forecaster: ForecastDriver::from_config(&config),
            oracle,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// A fresh selector using the configured hysteresis threshold.
    pub fn selector(&self) -> RouteSelector {
        RouteSelector::from_config(&self.config)
    }

    /// Evaluates a single route with the full sample budget.
    pub async fn analyze_route(
        &self,
        route: RouteAlternative,
        at: DateTime<FixedOffset>,
        preferences: ScoringPreferences,
    ) -> RouteEvaluation {
        let scorer = RouteScorer::new(self.config.classification, preferences);
        self.evaluate(route, self.config.sample_budget, at, &scorer)
            .await
    }

    /// Evaluates every alternative concurrently and returns them best first.
    ///
    /// With more than one alternative, each route is sampled with the
    /// (smaller) comparison budget, keeping the total oracle load in check.
    pub async fn rank_alternatives(
        &self,
        routes: Vec<RouteAlternative>,
        at: DateTime<FixedOffset>,
        preferences: ScoringPreferences,
    ) -> Vec<RouteEvaluation> {
        let budget = if routes.len() > 1 {
            self.config.comparison_sample_budget
        } else {
            self.config.sample_budget
        };
        let scorer = RouteScorer::new(self.config.classification, preferences);

        let evaluations = join_all(
            routes
                .into_iter()
                .map(|route| self.evaluate(route, budget, at, &scorer)),
        )
        .await;

        evaluations
            .into_iter()
            .sorted_by(|a, b| compare_scores(&a.score, &b.score))
            .collect()
    }

    /// Fetches alternatives from the directions provider, ranks them,
    /// updates the traveler's selection, and derives advisories.
    ///
    /// # Errors
    ///
    /// Fails only if the directions provider fails.
    /// Oracle failures degrade the estimates but never fail the plan.
    pub async fn plan<D: DirectionsProvider + ?Sized>(
        &self,
        directions: &D,
        request: &PlanRequest,
        selector: &mut RouteSelector,
    ) -> Result<RoutePlan, PlanError> {
        let routes = directions
            .routes(request.origin, request.destination, &request.options)
            .await
            .inspect_err(|e| warn!(error = %e, "Directions provider failed"))?;
        // Ids are provider ordinals, whatever the provider filled in.
        let routes: Vec<RouteAlternative> = routes
            .into_iter()
            .enumerate()
            .map(|(id, route)| route.normalized(id))
            .collect();

        let departure = request.options.departure;
        let ranked = self
            .rank_alternatives(routes, departure, request.preferences)
            .await;

        let scores: Vec<RouteScore> = ranked.iter().map(|e| e.score.clone()).collect();
        let selected = selector.update(&scores);
        let advisories =
            Advisor::new(self.config.advisor.clone()).advise(&scores, departure.hour());
        let recommended = scores.first().map(|score| score.route_id);

        info!(
            alternatives = ranked.len(),
            recommended, selected, "Route plan ready"
        );

        Ok(RoutePlan {
            routes: ranked,
            recommended,
            selected,
            advisories,
            departure,
        })
    }

    /// Builds a congestion time series for a single route.
    ///
    /// # Errors
    ///
    /// Fails if the request's interval or horizon is invalid.
    pub async fn forecast(&self, request: &ForecastRequest) -> Result<Forecast, ForecastError> {
        self.forecaster.forecast(&self.oracle, request).await
    }

    async fn evaluate(
        &self,
        mut route: RouteAlternative,
        budget: usize,
        at: DateTime<FixedOffset>,
        scorer: &RouteScorer,
    ) -> RouteEvaluation {
        let indices = sample_indices(route.steps.len(), budget);
        let samples = self
            .executor
            .query_steps(&self.oracle, &route.steps, &indices, at)
            .await;

        self.propagator.propagate(&mut route.steps, &samples);
        let overridden = if self.config.prefer_provider_traffic {
            self.propagator.apply_provider_delays(&mut route.steps)
        } else {
            0
        };

        let oracle = SampleSummary::from_samples(&samples);
        if oracle.requested > 0 && oracle.is_all_fallback() {
            warn!(
                route_id = route.id,
                "The oracle did not answer for any sample; the estimate is the fallback value"
            );
        }

        let score = scorer.score(&route);
        debug!(
            route_id = route.id,
            steps = route.steps.len(),
            sampled = oracle.requested,
            succeeded = oracle.succeeded,
            overridden,
            avg_traffic = score.avg_traffic,
            composite_score = score.composite_score,
            "Evaluated route"
        );

        RouteEvaluation {
            route,
            score,
            oracle,
        }
    }
}
