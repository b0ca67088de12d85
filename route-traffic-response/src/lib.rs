//! Data structures for route traffic responses.
//!
//! Field names are camelCase on the wire.

use chrono::{DateTime, FixedOffset, Utc};
use route_traffic::fanout::SampleSummary;
use route_traffic::forecast::{Forecast, ForecastBasis, ForecastPoint};
use route_traffic::{RouteEvaluation, RoutePlan, Severity, Step, StepSource, TrafficLevel};
use serde::{Deserialize, Serialize};

/// The ranked alternatives for one planning request.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    /// Every alternative, best first.
    pub routes: Vec<RouteSummary>,
    /// The provider ordinal of the best route.
    ///
    /// Absent when there are no alternatives.
    pub recommended_route_index: Option<usize>,
    /// The provider ordinal of the selected route, which may differ from the best one.
    pub selected_route_index: Option<usize>,
    pub time_suggestions: Vec<String>,
    pub route_suggestions: Vec<String>,
    pub analysis_timestamp: DateTime<Utc>,
    pub total_routes_analyzed: usize,
}

impl PlanResponse {
    pub fn new(plan: &RoutePlan, analysis_timestamp: DateTime<Utc>) -> Self {
        Self {
            routes: plan.routes.iter().map(RouteSummary::from).collect(),
            recommended_route_index: plan.recommended,
            selected_route_index: plan.selected,
            time_suggestions: plan
                .advisories
                .time_suggestions
                .iter()
                .map(|a| a.message.clone())
                .collect(),
            route_suggestions: plan
                .advisories
                .route_suggestions
                .iter()
                .map(|a| a.message.clone())
                .collect(),
            analysis_timestamp,
            total_routes_analyzed: plan.routes.len(),
        }
    }
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    /// Ordinal of the route in the directions provider's response.
    pub route_index: usize,
    /// Absent for routes that could not be assessed.
    pub avg_traffic: Option<f64>,
    /// Lower is better. Absent for routes that could not be assessed.
    pub composite_score: Option<f64>,
    pub traffic_level: TrafficLevel,
    pub recommendation: String,
    pub severity: Severity,
    pub distance_km: f64,
    pub duration_min: f64,
    pub duration_in_traffic_min: f64,
    pub traffic_delay_min: f64,
    pub traffic_delay_ratio: f64,
    pub oracle: OracleSummary,
    pub steps: Vec<StepSummary>,
}

impl From<&RouteEvaluation> for RouteSummary {
    fn from(value: &RouteEvaluation) -> Self {
        let score = &value.score;
        Self {
            route_index: score.route_id,
            avg_traffic: score.avg_traffic,
            composite_score: score.composite_score,
            traffic_level: score.traffic_level,
            recommendation: score.recommendation.clone(),
            severity: score.severity,
            distance_km: score.distance_km,
            duration_min: score.duration_min,
            duration_in_traffic_min: score.duration_in_traffic_min,
            traffic_delay_min: score.traffic_delay_min,
            traffic_delay_ratio: score.traffic_delay_ratio,
            oracle: value.oracle.into(),
            steps: value.route.steps.iter().map(StepSummary::from).collect(),
        }
    }
}

/// How the prediction oracle fared for a route.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OracleSummary {
    pub sampled: usize,
    pub succeeded: usize,
    pub timed_out: usize,
    pub failed: usize,
}

impl From<SampleSummary> for OracleSummary {
    fn from(value: SampleSummary) -> Self {
        Self {
            sampled: value.requested,
            succeeded: value.succeeded,
            timed_out: value.timed_out,
            failed: value.failed,
        }
    }
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    pub index: usize,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub duration_in_traffic_seconds: Option<f64>,
    pub traffic_level: TrafficLevel,
    /// How the traffic level was derived (diagnostics only).
    pub source: Option<StepSource>,
    pub congestion: Option<f64>,
}

impl From<&Step> for StepSummary {
    fn from(value: &Step) -> Self {
        Self {
            index: value.index,
            latitude: value.start.y(),
            longitude: value.start.x(),
            distance_meters: value.distance_m,
            duration_seconds: value.duration_s,
            duration_in_traffic_seconds: value.duration_in_traffic_s,
            traffic_level: value.traffic_level,
            source: value.source,
            congestion: value.congestion,
        }
    }
}

/// A congestion time series for one route.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResponse {
    pub route_id: String,
    pub points: Vec<ForecastPointResponse>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPointResponse {
    pub time: DateTime<FixedOffset>,
    pub duration_minutes: f64,
    pub average_speed_kmh: f64,
    pub congestion_level: TrafficLevel,
    pub confidence: f64,
    /// Whether the point came from the prediction model or a time-of-day heuristic.
    pub basis: ForecastBasis,
}

impl From<&ForecastPoint> for ForecastPointResponse {
    fn from(value: &ForecastPoint) -> Self {
        Self {
            time: value.time,
            duration_minutes: value.duration_min,
            average_speed_kmh: value.average_speed_kmh,
            congestion_level: value.congestion_level,
            confidence: value.confidence,
            basis: value.basis,
        }
    }
}

impl From<Forecast> for ForecastResponse {
    fn from(value: Forecast) -> Self {
        Self {
            points: value.points.iter().map(ForecastPointResponse::from).collect(),
            route_id: value.route_id,
        }
    }
}
