//! # Travel advisories
//!
//! Human-readable suggestions derived from a ranked set of route scores
//! and the local departure hour.

use crate::config::AdvisorConfig;
use crate::scoring::RouteScore;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    MorningRush,
    EveningRush,
    HeavyTraffic,
    RouteComparison,
    TrafficDelay,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub kind: AdvisoryKind,
    pub message: String,
}

impl Advisory {
    fn new(kind: AdvisoryKind, message: String) -> Self {
        Self { kind, message }
    }
}

/// Suggestions about when to leave, and about which route to take.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisories {
    pub time_suggestions: Vec<Advisory>,
    pub route_suggestions: Vec<Advisory>,
}

impl Advisories {
    pub fn is_empty(&self) -> bool {
        self.time_suggestions.is_empty() && self.route_suggestions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Advisory> {
        self.time_suggestions
            .iter()
            .chain(self.route_suggestions.iter())
    }
}

/// Formats an hour of the day on a 12-hour clock (ex: `17` is `5 PM`).
pub fn fmt_hour(hour: u32) -> String {
    let hour = hour % 24;
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{display} {suffix}")
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Advisor {
    config: AdvisorConfig,
}

impl Advisor {
    pub fn new(config: AdvisorConfig) -> Self {
        Self { config }
    }

    /// Derives advisories from route scores ranked best first.
    ///
    /// Degenerate routes are ignored; with no assessable route there is nothing to say.
    pub fn advise(&self, ranked: &[RouteScore], departure_hour: u32) -> Advisories {
        let mut advisories = Advisories::default();

        let assessed: Vec<(&RouteScore, f64)> = ranked
            .iter()
            .filter_map(|score| Some((score, score.avg_traffic?)))
            .collect();
        let (Some(&(best, best_avg)), Some(&(worst, worst_avg))) =
            (assessed.first(), assessed.last())
        else {
            return advisories;
        };

        if best_avg > self.config.heavy_traffic_threshold {
            advisories.time_suggestions.push(self.time_suggestion(departure_hour));
        }

        let spread = worst_avg - best_avg;
        if assessed.len() > 1 && spread > self.config.spread_threshold {
            advisories.route_suggestions.push(Advisory::new(
                AdvisoryKind::RouteComparison,
                format!(
                    "Route {} has {spread:.0}% less traffic than Route {}",
                    best.route_id + 1,
                    worst.route_id + 1
                ),
            ));
        }

        if best.traffic_delay_min > self.config.delay_threshold_min {
            advisories.route_suggestions.push(Advisory::new(
                AdvisoryKind::TrafficDelay,
                format!(
                    "Even the best route has {:.0} minutes of traffic delay",
                    best.traffic_delay_min
                ),
            ));
        }

        advisories
    }

    fn time_suggestion(&self, hour: u32) -> Advisory {
        let rush = [
            (self.config.morning_rush, AdvisoryKind::MorningRush, "morning"),
            (self.config.evening_rush, AdvisoryKind::EveningRush, "evening"),
        ]
        .into_iter()
        .find(|(window, _, _)| window.contains(hour));

        match rush {
            Some((window, kind, label)) => Advisory::new(
                kind,
                format!(
                    "Consider leaving before {} or after {} to avoid {label} rush",
                    fmt_hour(window.start),
                    fmt_hour(window.end + 1)
                ),
            ),
            None => Advisory::new(
                AdvisoryKind::HeavyTraffic,
                "Traffic is unusually heavy - consider postponing travel if possible".to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HourWindow;
    use crate::model::TrafficLevel;
    use crate::scoring::Severity;

    fn score(route_id: usize, avg: f64, delay_min: f64) -> RouteScore {
        RouteScore {
            route_id,
            avg_traffic: Some(avg),
            composite_score: Some(avg),
            traffic_level: TrafficLevel::Medium,
            recommendation: String::new(),
            severity: Severity::Success,
            distance_km: 12.0,
            duration_min: 20.0,
            duration_in_traffic_min: 20.0 + delay_min,
            traffic_delay_min: delay_min,
            traffic_delay_ratio: (20.0 + delay_min) / 20.0,
        }
    }

    fn messages(advisories: &Advisories) -> String {
        advisories
            .iter()
            .map(|a| format!("{:?}: {}", a.kind, a.message))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_fmt_hour() {
        assert_eq!(fmt_hour(0), "12 AM");
        assert_eq!(fmt_hour(7), "7 AM");
        assert_eq!(fmt_hour(12), "12 PM");
        assert_eq!(fmt_hour(17), "5 PM");
        assert_eq!(fmt_hour(24), "12 AM");
    }

    #[test]
    fn test_light_traffic_is_quiet() {
        let ranked = [score(0, 20.0, 2.0), score(1, 30.0, 4.0)];
        assert!(Advisor::default().advise(&ranked, 8).is_empty());
    }

    #[test]
    fn test_morning_rush() {
        let ranked = [score(1, 72.0, 18.0), score(0, 95.0, 30.0)];
        let advisories = Advisor::default().advise(&ranked, 8);

        assert_eq!(advisories.time_suggestions.len(), 1);
        assert_eq!(advisories.route_suggestions.len(), 2);
        insta::assert_snapshot!(messages(&advisories), @r"
        MorningRush: Consider leaving before 7 AM or after 10 AM to avoid morning rush
        RouteComparison: Route 2 has 23% less traffic than Route 1
        TrafficDelay: Even the best route has 18 minutes of traffic delay
        ");
    }

    #[test]
    fn test_evening_rush() {
        let advisories = Advisor::default().advise(&[score(0, 65.0, 0.0)], 18);
        insta::assert_snapshot!(messages(&advisories), @"EveningRush: Consider leaving before 5 PM or after 8 PM to avoid evening rush");
    }

    #[test]
    fn test_heavy_outside_rush() {
        let advisories = Advisor::default().advise(&[score(0, 61.0, 0.0)], 13);
        insta::assert_snapshot!(messages(&advisories), @"HeavyTraffic: Traffic is unusually heavy - consider postponing travel if possible");
    }

    #[test]
    fn test_custom_windows() {
        let advisor = Advisor::new(AdvisorConfig {
            morning_rush: HourWindow::new(6, 8),
            ..AdvisorConfig::default()
        });
        let advisories = advisor.advise(&[score(0, 80.0, 0.0)], 6);
        assert_eq!(advisories.time_suggestions[0].kind, AdvisoryKind::MorningRush);
        assert_eq!(
            advisories.time_suggestions[0].message,
            "Consider leaving before 6 AM or after 9 AM to avoid morning rush"
        );
    }

    #[test]
    fn test_single_route_delay_is_disclosed() {
        let advisories = Advisor::default().advise(&[score(0, 40.0, 16.4)], 11);
        assert!(advisories.time_suggestions.is_empty());
        assert_eq!(
            advisories.route_suggestions,
            vec![Advisory::new(
                AdvisoryKind::TrafficDelay,
                "Even the best route has 16 minutes of traffic delay".to_string()
            )]
        );
    }

    #[test]
    fn test_degenerate_routes_are_ignored() {
        let mut empty = score(2, 0.0, 0.0);
        empty.avg_traffic = None;
        empty.composite_score = None;

        let ranked = [score(0, 30.0, 0.0), score(1, 45.0, 0.0), empty];
        // The spread is measured against the worst assessed route (15), not the empty one.
        assert!(Advisor::default().advise(&ranked, 8).is_empty());
        assert!(Advisor::default().advise(&[], 8).is_empty());
    }
}
