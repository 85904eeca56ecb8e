//! Current allocation fractions and their deviation from targets.

use alloy_primitives::U256;

use crate::error::{AllocationError, Result};

/// 100% expressed in millionths.
pub const ONE_HUNDRED_PERCENT_BPS: u32 = 1_000_000;

/// Pure allocation computations over parallel balance/target slices.
///
/// Every function takes slices in the same backend order and returns results in
/// that order, so callers can map positions back to their own backend list.
pub struct AllocationCalculator;

impl AllocationCalculator {
    /// Share of the total held by each balance, in millionths (floored).
    ///
    /// A zero total yields all-zero allocations rather than an error.
    pub fn current_allocations(balances: &[U256]) -> Vec<u32> {
        let total = balances
            .iter()
            .fold(U256::ZERO, |acc, balance| acc.saturating_add(*balance));

        if total.is_zero() {
            return vec![0; balances.len()];
        }

        let scale = U256::from(ONE_HUNDRED_PERCENT_BPS);
        balances
            .iter()
            .map(|balance| (*balance * scale / total).saturating_to::<u32>())
            .collect()
    }

    /// Signed distance `target - current` for each backend.
    ///
    /// Positive values are deficits (underweight), negative values surpluses.
    pub fn allocation_deltas(current: &[u32], targets: &[u32]) -> Result<Vec<i64>> {
        ensure_same_len(current.len(), targets.len())?;
        Ok(current
            .iter()
            .zip(targets)
            .map(|(current, target)| i64::from(*target) - i64::from(*current))
            .collect())
    }

    /// How far each backend sits below its target (zero when at or above).
    pub fn deficits(current: &[u32], targets: &[u32]) -> Result<Vec<u32>> {
        ensure_same_len(current.len(), targets.len())?;
        Ok(current
            .iter()
            .zip(targets)
            .map(|(current, target)| target.saturating_sub(*current))
            .collect())
    }

    /// How far each backend sits above its target (zero when at or below).
    pub fn surpluses(current: &[u32], targets: &[u32]) -> Result<Vec<u32>> {
        ensure_same_len(current.len(), targets.len())?;
        Ok(current
            .iter()
            .zip(targets)
            .map(|(current, target)| current.saturating_sub(*target))
            .collect())
    }

    /// Sum of targets, widened so that out-of-range input cannot overflow.
    pub fn total_target(targets: &[u32]) -> u64 {
        targets.iter().map(|target| u64::from(*target)).sum()
    }

    /// Check that a non-empty target set sums to exactly 100%.
    pub fn validate_targets(targets: &[u32]) -> Result<()> {
        if targets.is_empty() {
            return Ok(());
        }

        if let Some(bps) = targets.iter().find(|bps| **bps > ONE_HUNDRED_PERCENT_BPS) {
            return Err(AllocationError::TargetOutOfRange { bps: *bps });
        }

        let total = Self::total_target(targets);
        if total != u64::from(ONE_HUNDRED_PERCENT_BPS) {
            return Err(AllocationError::InvalidTargetSum { total });
        }

        Ok(())
    }
}

fn ensure_same_len(left: usize, right: usize) -> Result<()> {
    if left != right {
        return Err(AllocationError::LengthMismatch { left, right });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_allocations_even_split() {
        let balances = [U256::from(500u64), U256::from(500u64)];
        assert_eq!(
            AllocationCalculator::current_allocations(&balances),
            vec![500_000, 500_000]
        );
    }

    #[test]
    fn test_current_allocations_zero_total() {
        let balances = [U256::ZERO, U256::ZERO, U256::ZERO];
        assert_eq!(
            AllocationCalculator::current_allocations(&balances),
            vec![0, 0, 0]
        );
    }

    #[test]
    fn test_current_allocations_floor() {
        let balances = [U256::from(1u64), U256::from(1u64), U256::from(1u64)];
        // 1/3 floors to 333_333 for every entry
        assert_eq!(
            AllocationCalculator::current_allocations(&balances),
            vec![333_333, 333_333, 333_333]
        );
    }

    #[test]
    fn test_allocation_deltas_sign() {
        let deltas =
            AllocationCalculator::allocation_deltas(&[700_000, 300_000], &[500_000, 500_000])
                .unwrap();
        assert_eq!(deltas, vec![-200_000, 200_000]);
    }

    #[test]
    fn test_deficits_and_surpluses() {
        let current = [700_000, 300_000];
        let targets = [500_000, 500_000];
        assert_eq!(
            AllocationCalculator::deficits(&current, &targets).unwrap(),
            vec![0, 200_000]
        );
        assert_eq!(
            AllocationCalculator::surpluses(&current, &targets).unwrap(),
            vec![200_000, 0]
        );
    }

    #[test]
    fn test_length_mismatch() {
        let result = AllocationCalculator::deficits(&[1, 2], &[1]);
        assert_eq!(
            result,
            Err(AllocationError::LengthMismatch { left: 2, right: 1 })
        );
    }

    #[test]
    fn test_validate_targets() {
        assert!(AllocationCalculator::validate_targets(&[]).is_ok());
        assert!(AllocationCalculator::validate_targets(&[1_000_000]).is_ok());
        assert!(AllocationCalculator::validate_targets(&[600_000, 400_000, 0]).is_ok());
        assert_eq!(
            AllocationCalculator::validate_targets(&[600_000, 300_000]),
            Err(AllocationError::InvalidTargetSum { total: 900_000 })
        );
        assert_eq!(
            AllocationCalculator::validate_targets(&[1_000_001]),
            Err(AllocationError::TargetOutOfRange { bps: 1_000_001 })
        );
    }

    #[test]
    fn test_total_target_no_overflow() {
        assert_eq!(
            AllocationCalculator::total_target(&[u32::MAX, u32::MAX]),
            2 * u64::from(u32::MAX)
        );
    }
}
