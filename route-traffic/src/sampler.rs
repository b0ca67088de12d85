//! # Step sampling
//!
//! Picks which steps of a route get a real oracle query.
//! Routes can have hundreds of steps, so the number of queries is capped
//! by a budget regardless of route length.

/// The smallest usable budget: the first and last step are always sampled.
pub const MIN_SAMPLE_BUDGET: usize = 2;

/// Selects up to `budget` step indices out of a route with `step_count` steps.
///
/// The result is sorted, free of duplicates, has exactly `min(budget, step_count)` entries,
/// and always includes the first and last step.
/// Interior indices are spread at an even stride of roughly `step_count / (budget - 1)`.
///
/// Budgets below [`MIN_SAMPLE_BUDGET`] are raised to it.
/// An empty route yields no indices.
pub fn sample_indices(step_count: usize, budget: usize) -> Vec<usize> {
    let budget = budget.max(MIN_SAMPLE_BUDGET);

    if step_count <= budget {
        return (0..step_count).collect();
    }

    // With step_count > budget the stride is > 1,
    // so consecutive indices are strictly increasing and the last one clamps to the final step.
    let last = step_count - 1;
    let mut indices: Vec<usize> = (0..budget)
        .map(|i| (i * step_count / (budget - 1)).min(last))
        .collect();
    indices.dedup();
    indices
}
