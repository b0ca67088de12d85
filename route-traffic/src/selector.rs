//! # Ranking and selection
//!
//! Routes are ranked by composite score.
//! The selection then follows the ranking only when the gain is worth it:
//! an existing selection is replaced by the best route only when the best route's
//! average traffic is lower by more than the hysteresis threshold.
//! Otherwise oracle noise between two near-equal routes would flip the
//! recommendation on every refresh.
//!
//! Selections refer to route ids (the provider's ordinals), never to positions in a ranking.

use crate::config::EngineConfig;
use crate::scoring::RouteScore;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Orders scores best first.
///
/// Degenerate routes (no composite score) go last; ties are broken by route id.
pub fn compare_scores(a: &RouteScore, b: &RouteScore) -> Ordering {
    let by_score = match (a.composite_score, b.composite_score) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_score.then(a.route_id.cmp(&b.route_id))
}

/// Sorts scores best first (see [`compare_scores`]).
pub fn rank(scores: impl IntoIterator<Item = RouteScore>) -> Vec<RouteScore> {
    scores.into_iter().sorted_by(compare_scores).collect()
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "route_id", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    None,
    /// Picked by the engine.
    Automatic(usize),
    /// Picked by the traveler.
    Manual(usize),
}

impl Selection {
    pub fn route_id(&self) -> Option<usize> {
        match self {
            Selection::None => None,
            Selection::Automatic(id) | Selection::Manual(id) => Some(*id),
        }
    }
}

/// Selection state for one traveler, carried across evaluations.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteSelector {
    hysteresis_threshold: f64,
    selection: Selection,
}

impl RouteSelector {
    pub fn new(hysteresis_threshold: f64) -> Self {
        Self {
            hysteresis_threshold,
            selection: Selection::None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.hysteresis_threshold)
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn selected(&self) -> Option<usize> {
        self.selection.route_id()
    }

    pub fn select_manually(&mut self, route_id: usize) {
        self.selection = Selection::Manual(route_id);
    }

    pub fn clear(&mut self) {
        self.selection = Selection::None;
    }

    /// Reconciles the selection with a fresh ranking (best first), returning the selected route id.
    ///
    /// - No selection yet: select the best route.
    /// - The selected route is gone or could not be assessed: select the best route.
    /// - Otherwise keep the selection, unless the best route's average traffic
    ///   is lower by more than the hysteresis threshold.
    pub fn update(&mut self, ranked: &[RouteScore]) -> Option<usize> {
        let Some(best) = ranked.first() else {
            self.selection = Selection::None;
            return None;
        };

        let Some(current_id) = self.selection.route_id() else {
            debug!(route_id = best.route_id, "Selecting the best route");
            self.selection = Selection::Automatic(best.route_id);
            return self.selected();
        };

        let current_avg = ranked
            .iter()
            .find(|score| score.route_id == current_id)
            .and_then(|score| score.avg_traffic);
        let Some(current_avg) = current_avg else {
            info!(
                previous = current_id,
                route_id = best.route_id,
                "Selected route is no longer usable; switching to the best route"
            );
            self.selection = Selection::Automatic(best.route_id);
            return self.selected();
        };

        let gain = best.avg_traffic.map_or(0.0, |best_avg| current_avg - best_avg);
        if best.route_id != current_id && gain > self.hysteresis_threshold {
            info!(
                previous = current_id,
                route_id = best.route_id,
                gain,
                "Switching to a clearly better route"
            );
            self.selection = Selection::Automatic(best.route_id);
        }

        self.selected()
    }
}
