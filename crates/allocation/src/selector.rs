//! Seedless, tie-broken top-K backend selection.
//!
//! Selection ranks candidates by how far they sit from their target and breaks
//! ties by position, lowest first. The same inputs always produce the same
//! ranking; there is no entropy source involved.

use crate::calculator::AllocationCalculator;
use crate::error::{AllocationError, Result};

/// Deterministic ranking of backends by allocation delta.
pub struct DeterministicVaultSelector;

impl DeterministicVaultSelector {
    /// Indices of the `count` most underweight candidates, best first.
    ///
    /// Candidates that already sit above target are still ranked (after every
    /// underweight one) so a caller with a single eligible backend always gets
    /// an answer.
    pub fn select_top_underallocated(
        current: &[u32],
        targets: &[u32],
        count: usize,
    ) -> Result<Vec<usize>> {
        let deltas = AllocationCalculator::allocation_deltas(current, targets)?;
        rank(&deltas, count)
    }

    /// Indices of the `count` most overweight candidates, best first.
    pub fn select_top_overallocated(
        current: &[u32],
        targets: &[u32],
        count: usize,
    ) -> Result<Vec<usize>> {
        let surplus: Vec<i64> = AllocationCalculator::allocation_deltas(current, targets)?
            .into_iter()
            .map(|delta| -delta)
            .collect();
        rank(&surplus, count)
    }

    /// The single most underweight candidate.
    pub fn select_underallocated(current: &[u32], targets: &[u32]) -> Result<usize> {
        Self::select_top_underallocated(current, targets, 1)?
            .first()
            .copied()
            .ok_or(AllocationError::NoCandidates)
    }

    /// The single most overweight candidate.
    pub fn select_overallocated(current: &[u32], targets: &[u32]) -> Result<usize> {
        Self::select_top_overallocated(current, targets, 1)?
            .first()
            .copied()
            .ok_or(AllocationError::NoCandidates)
    }
}

fn rank(scores: &[i64], count: usize) -> Result<Vec<usize>> {
    if scores.is_empty() {
        return Err(AllocationError::NoCandidates);
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*b].cmp(&scores[*a]).then(a.cmp(b)));
    order.truncate(count);
    Ok(order)
}
