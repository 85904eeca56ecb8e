//! Tunable parameters for the router and the share unit.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Upper bound on per-leg slippage (1%).
pub const MAX_SLIPPAGE_BPS: u32 = 10_000;

/// Upper bound on the withdrawal fee (1%).
pub const MAX_WITHDRAWAL_FEE_BPS: u32 = 10_000;

/// Upper bound on the reinvestment incentive (20%).
pub const MAX_REINVEST_INCENTIVE_BPS: u32 = 200_000;

/// Default dust tolerance in pooled units.
pub const DEFAULT_DUST_TOLERANCE: U256 = U256::from_limbs([1_000, 0, 0, 0]);

/// Default cap on configured backends.
pub const DEFAULT_MAX_BACKEND_COUNT: usize = 10;

/// Router configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Accepted pooled-unit slack when comparing independently converted values
    pub dust_tolerance: U256,
    /// Allowed shortfall of a leg against its adapter's preview
    pub max_slippage_bps: u32,
    /// Maximum number of configured backends
    pub max_backend_count: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            dust_tolerance: DEFAULT_DUST_TOLERANCE,
            max_slippage_bps: 0,
            max_backend_count: DEFAULT_MAX_BACKEND_COUNT,
        }
    }
}

impl RouterSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dust_tolerance(mut self, dust_tolerance: U256) -> Self {
        self.dust_tolerance = dust_tolerance;
        self
    }

    pub fn with_max_slippage_bps(mut self, bps: u32) -> Self {
        self.max_slippage_bps = bps;
        self
    }

    pub fn with_max_backend_count(mut self, count: usize) -> Self {
        self.max_backend_count = count;
        self
    }
}

/// Share-unit configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    /// Fee charged on the gross amount of every withdrawal
    pub withdrawal_fee_bps: u32,
    /// Share of reinvested fees paid to the caller of `reinvest_fees`
    pub reinvest_incentive_bps: u32,
    /// Share decimals minus asset decimals
    pub decimals_offset: u8,
}

impl VaultSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_withdrawal_fee_bps(mut self, bps: u32) -> Self {
        self.withdrawal_fee_bps = bps;
        self
    }

    pub fn with_reinvest_incentive_bps(mut self, bps: u32) -> Self {
        self.reinvest_incentive_bps = bps;
        self
    }

    pub fn with_decimals_offset(mut self, offset: u8) -> Self {
        self.decimals_offset = offset;
        self
    }
}
