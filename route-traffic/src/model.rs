use geo::{BoundingRect, MultiPoint, Point, Rect};
use serde::{Deserialize, Serialize};

/// Traffic band of a single step (or a whole route).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLevel {
    Low,
    Medium,
    High,
    /// Not assessed yet.
    ///
    /// Propagation never leaves a step in this state.
    #[default]
    Unknown,
}

/// How a step's congestion value was derived.
///
/// Used for diagnostics; end users only ever see the [`TrafficLevel`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepSource {
    /// The step was queried and the oracle answered.
    Sampled,
    /// The value was blended in from nearby sampled steps.
    Propagated,
    /// The neutral fallback value was used
    /// (the step was out of reach of every sample, or its own query failed).
    Fallback,
    /// The directions provider reported a traffic-aware duration for this step.
    Provider,
}

/// A single maneuver/segment of a route, as reported by the directions provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Position of the step within its route.
    #[serde(default)]
    pub index: usize,
    /// Where the step begins (x = longitude, y = latitude).
    pub start: Point,
    /// Length of the step in meters.
    pub distance_m: f64,
    /// Free-flow duration in seconds.
    pub duration_s: f64,
    /// Traffic-aware duration in seconds, if the provider reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_in_traffic_s: Option<f64>,
    #[serde(default)]
    pub traffic_level: TrafficLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<StepSource>,
    /// Congestion value in `[0, 100]`, filled in by propagation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub congestion: Option<f64>,
}

impl Step {
    pub fn new(index: usize, start: Point, distance_m: f64, duration_s: f64) -> Self {
        Self {
            index,
            start,
            distance_m,
            duration_s,
            duration_in_traffic_s: None,
            traffic_level: TrafficLevel::Unknown,
            source: None,
            congestion: None,
        }
    }

    #[must_use]
    pub fn with_duration_in_traffic(self, duration_in_traffic_s: f64) -> Self {
        Self {
            duration_in_traffic_s: Some(duration_in_traffic_s),
            ..self
        }
    }

    /// The provider's traffic delay ratio for this step (traffic-aware over free-flow duration).
    ///
    /// Returns `None` when the provider gave no traffic-aware duration,
    /// or the free-flow duration is not usable as a divisor.
    pub fn provider_delay_ratio(&self) -> Option<f64> {
        let in_traffic = self.duration_in_traffic_s?;
        if self.duration_s > 0.0 && in_traffic.is_finite() {
            Some(in_traffic / self.duration_s)
        } else {
            None
        }
    }

    /// Records the outcome of propagation (or a provider override) on the step.
    pub(crate) fn assess(&mut self, congestion: f64, level: TrafficLevel, source: StepSource) {
        self.congestion = Some(congestion);
        self.traffic_level = level;
        self.source = Some(source);
    }
}

/// One candidate route between an origin and a destination.
///
/// Immutable after construction, except for the per-step assessment
/// written by propagation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteAlternative {
    /// Ordinal of this alternative in the provider's response.
    ///
    /// Preserved through re-ranking so callers can map results back.
    #[serde(default)]
    pub id: usize,
    pub steps: Vec<Step>,
    pub distance_km: f64,
    pub duration_min: f64,
    /// Traffic-aware duration of the whole route, if the provider gave one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_in_traffic_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Rect>,
}

impl RouteAlternative {
    /// Builds a route from its steps, deriving the totals and bounds from them.
    pub fn new(id: usize, steps: Vec<Step>) -> Self {
        let distance_km = steps.iter().map(|step| step.distance_m).sum::<f64>() / 1000.0;
        let duration_min = steps.iter().map(|step| step.duration_s).sum::<f64>() / 60.0;
        let duration_in_traffic_min = if steps.iter().any(|s| s.duration_in_traffic_s.is_some()) {
            Some(
                steps
                    .iter()
                    .map(|step| step.duration_in_traffic_s.unwrap_or(step.duration_s))
                    .sum::<f64>()
                    / 60.0,
            )
        } else {
            None
        };

        Self {
            id,
            steps,
            distance_km,
            duration_min,
            duration_in_traffic_min,
            bounds: None,
        }
        .normalized(id)
    }

    /// Assigns the provider ordinal and renumbers steps by position.
    ///
    /// Also fills in the bounding region from the step geometry when none was provided.
    #[must_use]
    pub fn normalized(mut self, id: usize) -> Self {
        self.id = id;
        for (index, step) in self.steps.iter_mut().enumerate() {
            step.index = index;
        }
        if self.bounds.is_none() {
            self.bounds = MultiPoint::from(self.steps.iter().map(|s| s.start).collect::<Vec<_>>())
                .bounding_rect();
        }
        self
    }

    /// Traffic-aware duration, or the free-flow duration when the provider gave none.
    pub fn duration_in_traffic_min(&self) -> f64 {
        self.duration_in_traffic_min.unwrap_or(self.duration_min)
    }

    /// A route without steps can't be sampled or scored.
    pub fn is_degenerate(&self) -> bool {
        self.steps.is_empty()
    }

    /// Mean congestion over every assessed step.
    pub fn mean_congestion(&self) -> Option<f64> {
        let values: Vec<f64> = self.steps.iter().filter_map(|s| s.congestion).collect();
        if values.is_empty() {
            return None;
        }
        #[allow(
            clippy::cast_precision_loss,
            reason = "step counts are far below 2^52"
        )]
        let count = values.len() as f64;
        Some(values.iter().sum::<f64>() / count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn test_new_derives_totals() {
        let steps = vec![
            Step::new(7, Point::new(8.0, 47.0), 1500.0, 120.0),
            Step::new(3, Point::new(8.1, 47.2), 500.0, 60.0),
        ];
        let route = RouteAlternative::new(2, steps);

        assert_eq!(route.id, 2);
        assert!((route.distance_km - 2.0).abs() < 1e-9);
        assert!((route.duration_min - 3.0).abs() < 1e-9);
        assert_eq!(route.duration_in_traffic_min, None);
        assert!((route.duration_in_traffic_min() - 3.0).abs() < 1e-9);
        assert_eq!(
            route.steps.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![0, 1]
        );

        let bounds = route.bounds.expect("bounds should be derived from the steps");
        assert_eq!(bounds.min(), coord! {x: 8.0, y: 47.0});
        assert_eq!(bounds.max(), coord! {x: 8.1, y: 47.2});
    }

    #[test]
    fn test_traffic_duration_falls_back_per_step() {
        let steps = vec![
            Step::new(0, Point::new(0.0, 0.0), 100.0, 60.0).with_duration_in_traffic(120.0),
            Step::new(1, Point::new(0.0, 0.0), 100.0, 60.0),
        ];
        let route = RouteAlternative::new(0, steps);

        assert_eq!(route.duration_in_traffic_min, Some(3.0));
    }

    #[test]
    fn test_provider_delay_ratio() {
        let step = Step::new(0, Point::new(0.0, 0.0), 100.0, 60.0);
        assert_eq!(step.provider_delay_ratio(), None);

        let step = step.with_duration_in_traffic(90.0);
        assert_eq!(step.provider_delay_ratio(), Some(1.5));

        let zero = Step::new(0, Point::new(0.0, 0.0), 0.0, 0.0).with_duration_in_traffic(10.0);
        assert_eq!(zero.provider_delay_ratio(), None);
    }

    #[test]
    fn test_degenerate_route() {
        let route = RouteAlternative::new(0, Vec::new());
        assert!(route.is_degenerate());
        assert_eq!(route.bounds, None);
        assert_eq!(route.mean_congestion(), None);
    }

    #[test]
    fn test_deserialize_provider_json() {
        let json = r#"{
            "steps": [
                {"start": {"x": 77.59, "y": 12.97}, "distance_m": 850.0, "duration_s": 95.0},
                {"start": {"x": 77.60, "y": 12.98}, "distance_m": 1200.0, "duration_s": 140.0, "duration_in_traffic_s": 210.0}
            ],
            "distance_km": 2.05,
            "duration_min": 3.9
        }"#;
        let route: RouteAlternative = serde_json::from_str(json).expect("valid route JSON");
        let route = route.normalized(4);

        assert_eq!(route.id, 4);
        assert_eq!(route.steps[1].index, 1);
        assert_eq!(route.steps[0].traffic_level, TrafficLevel::Unknown);
        assert_eq!(route.steps[0].source, None);
        assert_eq!(route.steps[1].duration_in_traffic_s, Some(210.0));
        assert!(route.bounds.is_some());
    }
}
