//! # Segment propagation
//!
//! Spreads a handful of sampled congestion values over every step of a route,
//! then classifies each step.
//!
//! A sample influences steps up to `radius` positions away,
//! with a weight that decays linearly with distance:
//! `w = max(0, 1 - d / (radius + 1))`.
//! For an unsampled step, the farthest sample in reach seeds the value,
//! and each nearer sample is then blended in as `v = v * (1 - w) + s * w`,
//! so the nearest samples have the last word.
//! Seeding (rather than starting from a neutral value) means a step covered
//! by samples that all agree gets exactly their value.

use crate::classify::ClassificationPolicy;
use crate::config::EngineConfig;
use crate::fanout::PredictionSample;
use crate::model::{Step, StepSource};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Propagator {
    radius: usize,
    fallback_value: f64,
    policy: ClassificationPolicy,
}

impl Propagator {
    pub fn new(radius: usize, fallback_value: f64, policy: ClassificationPolicy) -> Self {
        Self {
            radius,
            fallback_value,
            policy,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.propagation_radius,
            config.fallback_value,
            config.classification,
        )
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Weight of a sample `distance` steps away.
    #[allow(
        clippy::cast_precision_loss,
        reason = "radii and step distances are small"
    )]
    pub fn influence(&self, distance: usize) -> f64 {
        (1.0 - distance as f64 / (self.radius as f64 + 1.0)).max(0.0)
    }

    /// Assigns a congestion value, traffic level and source to every step.
    ///
    /// A sampled step keeps its own sample value.
    /// When that sample is a fallback substitute the step is tagged [`StepSource::Fallback`],
    /// but it still seeds its neighbours like any other sample.
    /// Steps out of reach of every sample get the fallback value.
    ///
    /// The result depends only on the set of samples, not on their order.
    /// Samples for indices past the end of `steps` are ignored.
    pub fn propagate(&self, steps: &mut [Step], samples: &[PredictionSample]) {
        let sources: BTreeMap<usize, &PredictionSample> = samples
            .iter()
            .filter(|sample| sample.step_index < steps.len())
            .map(|sample| (sample.step_index, sample))
            .collect();

        let mut propagated = 0usize;
        let mut untouched = 0usize;

        for (index, step) in steps.iter_mut().enumerate() {
            let (value, source) = if let Some(sample) = sources.get(&index) {
                let source = if sample.is_success() {
                    StepSource::Sampled
                } else {
                    StepSource::Fallback
                };
                (sample.value, source)
            } else if let Some(value) = self.blend(index, &sources) {
                propagated += 1;
                (value, StepSource::Propagated)
            } else {
                untouched += 1;
                (self.fallback_value, StepSource::Fallback)
            };

            let value = value.clamp(0.0, 100.0);
            step.assess(value, self.policy.classify(value), source);
        }

        debug!(
            steps = steps.len(),
            sampled = sources.len(),
            propagated,
            untouched,
            "Propagated samples"
        );
    }

    /// Blends every sample within reach of `index`, or returns `None` if there is none.
    fn blend(&self, index: usize, sources: &BTreeMap<usize, &PredictionSample>) -> Option<f64> {
        let lo = index.saturating_sub(self.radius);
        let hi = index.saturating_add(self.radius);

        let mut nearby: Vec<(usize, usize, f64)> = sources
            .range(lo..=hi)
            .map(|(&i, sample)| (i.abs_diff(index), i, sample.value))
            .collect();
        // Farthest first; ties are broken by position so the result is deterministic.
        nearby.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut iter = nearby.into_iter();
        let (_, _, seed) = iter.next()?;
        Some(iter.fold(seed, |value, (distance, _, sample)| {
            let w = self.influence(distance);
            value * (1.0 - w) + sample * w
        }))
    }

    /// Overrides steps that carry a provider traffic-aware duration
    /// with the value implied by their delay ratio.
    ///
    /// Returns the number of steps overridden.
    pub fn apply_provider_delays(&self, steps: &mut [Step]) -> usize {
        let mut overridden = 0;
        for step in steps.iter_mut() {
            if let Some(ratio) = step.provider_delay_ratio() {
                let value = self.policy.value_for_delay_ratio(ratio);
                step.assess(value, self.policy.classify(value), StepSource::Provider);
                overridden += 1;
            }
        }
        overridden
    }
}
