//! Serializable allocation snapshots for reporting.

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculator::{AllocationCalculator, ONE_HUNDRED_PERCENT_BPS};
use crate::error::{AllocationError, Result};

/// One backend's position within a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationEntry {
    /// Backend identifier.
    pub backend: Address,
    /// Value held in the backend, in pooled units.
    pub value: U256,
    /// Current share of the total, in millionths.
    pub current_bps: u32,
    /// Configured target, in millionths.
    pub target_bps: u32,
}

impl AllocationEntry {
    /// Current share as a decimal fraction (0.25 = 25%).
    pub fn current_fraction(&self) -> Decimal {
        bps_to_fraction(self.current_bps)
    }

    /// Target share as a decimal fraction.
    pub fn target_fraction(&self) -> Decimal {
        bps_to_fraction(self.target_bps)
    }

    /// `target - current`; positive when the backend is underweight.
    pub fn deviation_bps(&self) -> i64 {
        i64::from(self.target_bps) - i64::from(self.current_bps)
    }
}

/// Allocation state of a set of backends at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSnapshot {
    /// Sum of all entry values.
    pub total_value: U256,
    /// Entries in backend order.
    pub entries: Vec<AllocationEntry>,
}

impl AllocationSnapshot {
    /// Build a snapshot from parallel backend/value/target slices.
    pub fn from_values(backends: &[Address], values: &[U256], targets: &[u32]) -> Result<Self> {
        if backends.len() != values.len() {
            return Err(AllocationError::LengthMismatch {
                left: backends.len(),
                right: values.len(),
            });
        }
        if backends.len() != targets.len() {
            return Err(AllocationError::LengthMismatch {
                left: backends.len(),
                right: targets.len(),
            });
        }

        let current = AllocationCalculator::current_allocations(values);
        let total_value = values
            .iter()
            .fold(U256::ZERO, |acc, value| acc.saturating_add(*value));

        let entries = backends
            .iter()
            .zip(values)
            .zip(current.iter().zip(targets))
            .map(|((backend, value), (current_bps, target_bps))| AllocationEntry {
                backend: *backend,
                value: *value,
                current_bps: *current_bps,
                target_bps: *target_bps,
            })
            .collect();

        Ok(Self {
            total_value,
            entries,
        })
    }

    /// Look up the entry for a backend.
    pub fn entry(&self, backend: Address) -> Option<&AllocationEntry> {
        self.entries.iter().find(|entry| entry.backend == backend)
    }

    /// Largest absolute distance from target across all entries.
    pub fn max_deviation_bps(&self) -> u64 {
        self.entries
            .iter()
            .map(|entry| entry.deviation_bps().unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

/// Convert millionths to a decimal fraction.
pub fn bps_to_fraction(bps: u32) -> Decimal {
    Decimal::from(bps) / Decimal::from(ONE_HUNDRED_PERCENT_BPS)
}

/// Convert a decimal fraction to millionths, rounding to nearest.
///
/// Returns `None` for negative fractions or fractions above 100%.
pub fn fraction_to_bps(fraction: Decimal) -> Option<u32> {
    let bps = (fraction * Decimal::from(ONE_HUNDRED_PERCENT_BPS)).round();
    if bps.is_sign_negative() || bps > Decimal::from(ONE_HUNDRED_PERCENT_BPS) {
        return None;
    }
    u32::try_from(bps).ok()
}
