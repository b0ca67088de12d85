//! # Route scoring
//!
//! Reduces a propagated route to one composite score (lower is better)
//! plus a qualitative recommendation.
//!
//! Every term of the composite is normalized to the `[0, 100]` congestion scale:
//!
//! - traffic: mean congestion over all steps
//! - delay ratio: `min(100, (ratio - 1) * 100)`, where `ratio = in_traffic / free_flow >= 1`
//! - distance: `min(100, km * 2)`
//! - duration: `min(100, minutes in traffic)`

use crate::classify::ClassificationPolicy;
use crate::model::{RouteAlternative, TrafficLevel};
use serde::{Deserialize, Serialize};

/// Caller-selected weighting of the composite score.
///
/// Leaving both flags unset selects [`WeightingPolicy::Balanced`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringPreferences {
    pub prioritize_time: bool,
    pub prioritize_traffic: bool,
}

impl ScoringPreferences {
    /// Traffic wins when both flags are set.
    pub fn weighting(&self) -> WeightingPolicy {
        if self.prioritize_traffic {
            WeightingPolicy::PrioritizeTraffic
        } else if self.prioritize_time {
            WeightingPolicy::PrioritizeTime
        } else {
            WeightingPolicy::Balanced
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingPolicy {
    /// `0.5 traffic + 0.25 delay ratio + 0.25 distance`
    Balanced,
    /// `0.7 traffic + 0.3 delay ratio`
    PrioritizeTraffic,
    /// `0.6 duration + 0.4 traffic`
    PrioritizeTime,
}

/// The normalized terms of the composite score.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Terms {
    traffic: f64,
    delay_ratio: f64,
    distance: f64,
    duration: f64,
}

impl WeightingPolicy {
    fn composite(self, terms: &Terms) -> f64 {
        match self {
            WeightingPolicy::Balanced => {
                0.5 * terms.traffic + 0.25 * terms.delay_ratio + 0.25 * terms.distance
            }
            WeightingPolicy::PrioritizeTraffic => 0.7 * terms.traffic + 0.3 * terms.delay_ratio,
            WeightingPolicy::PrioritizeTime => 0.6 * terms.duration + 0.4 * terms.traffic,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

/// Qualitative verdict on a route, driven by its average traffic alone.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Recommendation {
    pub text: &'static str,
    pub severity: Severity,
}

impl Recommendation {
    pub fn for_avg_traffic(avg_traffic: f64) -> Self {
        let (text, severity) = if avg_traffic < 30.0 {
            ("Excellent route with light traffic", Severity::Success)
        } else if avg_traffic < 50.0 {
            ("Good route with moderate traffic", Severity::Success)
        } else if avg_traffic < 70.0 {
            (
                "Fair route with heavy traffic - consider alternatives",
                Severity::Warning,
            )
        } else {
            (
                "Poor route with severe traffic - strongly recommend alternative",
                Severity::Error,
            )
        };
        Self { text, severity }
    }

    /// Used for routes without steps, which can't be assessed.
    pub fn unknown() -> Self {
        Self {
            text: "Traffic could not be estimated for this route",
            severity: Severity::Warning,
        }
    }
}

/// The evaluation of one route alternative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteScore {
    pub route_id: usize,
    /// Mean congestion over every step; `None` for a degenerate route.
    pub avg_traffic: Option<f64>,
    /// Lower is better; `None` for a degenerate route.
    pub composite_score: Option<f64>,
    pub traffic_level: TrafficLevel,
    pub recommendation: String,
    pub severity: Severity,
    pub distance_km: f64,
    pub duration_min: f64,
    pub duration_in_traffic_min: f64,
    /// Extra time spent in traffic, never negative.
    pub traffic_delay_min: f64,
    /// Traffic-aware over free-flow duration, never below 1.
    pub traffic_delay_ratio: f64,
}

impl RouteScore {
    pub fn is_degenerate(&self) -> bool {
        self.composite_score.is_none()
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RouteScorer {
    policy: ClassificationPolicy,
    weighting: WeightingPolicy,
}

impl RouteScorer {
    pub fn new(policy: ClassificationPolicy, preferences: ScoringPreferences) -> Self {
        Self {
            policy,
            weighting: preferences.weighting(),
        }
    }

    pub fn weighting(&self) -> WeightingPolicy {
        self.weighting
    }

    /// Scores a route whose steps have already been propagated.
    ///
    /// A route without assessed steps gets no average and no composite score,
    /// and sorts after every scored route.
    pub fn score(&self, route: &RouteAlternative) -> RouteScore {
        let duration_in_traffic_min = route.duration_in_traffic_min();
        let traffic_delay_ratio = if route.duration_min > 0.0 {
            (duration_in_traffic_min / route.duration_min).max(1.0)
        } else {
            1.0
        };
        let traffic_delay_min = (duration_in_traffic_min - route.duration_min).max(0.0);

        let avg_traffic = route.mean_congestion().map(|avg| avg.clamp(0.0, 100.0));

        let (composite_score, traffic_level, recommendation) = match avg_traffic {
            Some(avg) => {
                let terms = Terms {
                    traffic: avg,
                    delay_ratio: ((traffic_delay_ratio - 1.0) * 100.0).min(100.0),
                    distance: (route.distance_km * 2.0).clamp(0.0, 100.0),
                    duration: duration_in_traffic_min.clamp(0.0, 100.0),
                };
                (
                    Some(self.weighting.composite(&terms)),
                    self.policy.classify(avg),
                    Recommendation::for_avg_traffic(avg),
                )
            }
            None => (None, TrafficLevel::Unknown, Recommendation::unknown()),
        };

        RouteScore {
            route_id: route.id,
            avg_traffic,
            composite_score,
            traffic_level,
            recommendation: recommendation.text.to_string(),
            severity: recommendation.severity,
            distance_km: route.distance_km,
            duration_min: route.duration_min,
            duration_in_traffic_min,
            traffic_delay_min,
            traffic_delay_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::straight_route;
    use proptest::{prop_assert, proptest};

    /// A 10 km, 10 minute route with uniform congestion.
    fn congested_route(id: usize, value: f64) -> RouteAlternative {
        let mut route = straight_route(id, 10);
        for step in &mut route.steps {
            step.congestion = Some(value);
        }
        route
    }

    fn scorer(preferences: ScoringPreferences) -> RouteScorer {
        RouteScorer::new(ClassificationPolicy::default(), preferences)
    }

    #[test]
    fn test_weighting_selection() {
        assert_eq!(
            ScoringPreferences::default().weighting(),
            WeightingPolicy::Balanced
        );
        let both = ScoringPreferences {
            prioritize_time: true,
            prioritize_traffic: true,
        };
        assert_eq!(both.weighting(), WeightingPolicy::PrioritizeTraffic);
        let time = ScoringPreferences {
            prioritize_time: true,
            ..Default::default()
        };
        assert_eq!(time.weighting(), WeightingPolicy::PrioritizeTime);
    }

    #[test]
    fn test_preferences_json() {
        let prefs: ScoringPreferences =
            serde_json::from_str(r#"{"prioritizeTime": true}"#).expect("valid preferences");
        assert!(prefs.prioritize_time);
        assert!(!prefs.prioritize_traffic);
    }

    #[test]
    fn test_composite_per_policy() {
        let mut route = congested_route(0, 40.0);
        // 10 free-flow minutes become 12 in traffic.
        route.duration_in_traffic_min = Some(12.0);

        let balanced = scorer(ScoringPreferences::default()).score(&route);
        assert!((balanced.traffic_delay_ratio - 1.2).abs() < 1e-9);
        assert!((balanced.traffic_delay_min - 2.0).abs() < 1e-9);
        // 0.5 * 40 + 0.25 * 20 + 0.25 * 20
        assert!((balanced.composite_score.unwrap() - 30.0).abs() < 1e-9);

        let traffic = scorer(ScoringPreferences {
            prioritize_traffic: true,
            ..Default::default()
        })
        .score(&route);
        // 0.7 * 40 + 0.3 * 20
        assert!((traffic.composite_score.unwrap() - 34.0).abs() < 1e-9);

        let time = scorer(ScoringPreferences {
            prioritize_time: true,
            ..Default::default()
        })
        .score(&route);
        // 0.6 * 12 + 0.4 * 40
        assert!((time.composite_score.unwrap() - 23.2).abs() < 1e-9);
    }

    #[test]
    fn test_ratio_never_below_one() {
        let mut route = congested_route(0, 10.0);
        route.duration_in_traffic_min = Some(8.0);
        let score = scorer(ScoringPreferences::default()).score(&route);
        assert_eq!(score.traffic_delay_ratio, 1.0);
        assert_eq!(score.traffic_delay_min, 0.0);

        let mut stationary = congested_route(1, 10.0);
        stationary.duration_min = 0.0;
        let score = scorer(ScoringPreferences::default()).score(&stationary);
        assert_eq!(score.traffic_delay_ratio, 1.0);
        assert!(score.composite_score.unwrap().is_finite());
    }

    #[test]
    fn test_degenerate_route() {
        let route = RouteAlternative::new(3, Vec::new());
        let score = scorer(ScoringPreferences::default()).score(&route);

        assert!(score.is_degenerate());
        assert_eq!(score.route_id, 3);
        assert_eq!(score.avg_traffic, None);
        assert_eq!(score.traffic_level, TrafficLevel::Unknown);
        assert_eq!(score.severity, Severity::Warning);
    }

    #[test]
    fn test_recommendations() {
        let verdicts: Vec<String> = [10.0, 30.0, 49.9, 50.0, 69.9, 70.0, 100.0]
            .into_iter()
            .map(|avg| {
                let r = Recommendation::for_avg_traffic(avg);
                format!("{avg}: {:?} {}", r.severity, r.text)
            })
            .collect();

        insta::assert_snapshot!(verdicts.join("\n"), @r"
        10: Success Excellent route with light traffic
        30: Success Good route with moderate traffic
        49.9: Success Good route with moderate traffic
        50: Warning Fair route with heavy traffic - consider alternatives
        69.9: Warning Fair route with heavy traffic - consider alternatives
        70: Error Poor route with severe traffic - strongly recommend alternative
        100: Error Poor route with severe traffic - strongly recommend alternative
        ");
    }

    #[test]
    fn test_route_level() {
        let score = scorer(ScoringPreferences::default()).score(&congested_route(0, 65.0));
        assert_eq!(score.avg_traffic, Some(65.0));
        assert_eq!(score.traffic_level, TrafficLevel::High);
        assert_eq!(score.severity, Severity::Warning);
    }

    proptest! {
        #[test]
        fn less_traffic_scores_better(
            a in 0.0f64..=100.0,
            b in 0.0f64..=100.0,
            prioritize_time in proptest::bool::ANY,
            prioritize_traffic in proptest::bool::ANY,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            proptest::prop_assume!(hi - lo > 1e-6);

            let scorer = scorer(ScoringPreferences { prioritize_time, prioritize_traffic });
            let light = scorer.score(&congested_route(0, lo));
            let heavy = scorer.score(&congested_route(1, hi));

            prop_assert!(light.composite_score.unwrap() < heavy.composite_score.unwrap());
            let avg = light.avg_traffic.unwrap();
            prop_assert!((0.0..=100.0).contains(&avg));
        }
    }
}
