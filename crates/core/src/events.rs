//! Structured notifications recorded in the [`ChainState`](crate::ChainState) log.
//!
//! Events are appended as operations progress and rolled back together with
//! the state, so after any call the log describes exactly the legs that moved.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::router::BackendStatus;

/// How a routing call chose its backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Internal deterministic selection with bounded fallback
    Auto,
    /// Caller-directed legs, executed atomically
    Solver,
    /// Straight into the configured default backend
    DefaultBackend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    RouterDeposit {
        mode: RoutingMode,
        backends: Vec<Address>,
        pool_amounts: Vec<U256>,
        receipt_amounts: Vec<U256>,
        total_pool_amount: U256,
    },
    RouterWithdraw {
        mode: RoutingMode,
        backends: Vec<Address>,
        pool_amounts: Vec<U256>,
        receipt_amounts: Vec<U256>,
        total_pool_amount: U256,
        receiver: Address,
        owner: Address,
    },
    BackendAdded {
        backend: Address,
        adapter: Address,
        target_bps: u32,
        status: BackendStatus,
    },
    BackendUpdated {
        backend: Address,
        target_bps: u32,
        status: BackendStatus,
    },
    BackendRemoved {
        backend: Address,
    },
    AdapterRegistered {
        receipt: Address,
        adapter: Address,
    },
    AdapterRemoved {
        receipt: Address,
        adapter: Address,
    },
    DefaultBackendSet {
        backend: Option<Address>,
    },
    DustToleranceSet {
        dust_tolerance: U256,
    },
    MaxSlippageSet {
        bps: u32,
    },
    MaxBackendCountSet {
        count: usize,
    },
    ShortfallRecorded {
        delta: U256,
        total: U256,
    },
    ShortfallCleared {
        amount: U256,
        total: U256,
    },
    ShortfallMigrated {
        router: Address,
        total: U256,
    },
    Exchanged {
        from_backend: Address,
        to_backend: Address,
        from_receipt_amount: U256,
        to_receipt_amount: U256,
        pool_value: U256,
    },
    SurplusSwept {
        backend: Address,
        amount: U256,
        receipt_amount: U256,
    },
    SurplusHeld {
        amount: U256,
    },
    Deposit {
        caller: Address,
        owner: Address,
        assets: U256,
        shares: U256,
    },
    Withdraw {
        caller: Address,
        receiver: Address,
        owner: Address,
        assets: U256,
        shares: U256,
        fee: U256,
    },
    FeesReinvested {
        caller: Address,
        amount: U256,
        incentive: U256,
    },
    WithdrawalFeeSet {
        bps: u32,
    },
    ReinvestIncentiveSet {
        bps: u32,
    },
    RouterSet {
        ledger: Address,
        previous: Option<Address>,
        router: Address,
    },
    CoreMigrated {
        previous_router: Address,
        router: Address,
        previous_ledger: Address,
        ledger: Address,
    },
    Rescued {
        token: Address,
        amount: U256,
        recipient: Address,
    },
}

impl Event {
    /// Snake-case event name, as used in the serialized tag.
    pub fn name(&self) -> &'static str {
        match self {
            Event::RouterDeposit { .. } => "router_deposit",
            Event::RouterWithdraw { .. } => "router_withdraw",
            Event::BackendAdded { .. } => "backend_added",
            Event::BackendUpdated { .. } => "backend_updated",
            Event::BackendRemoved { .. } => "backend_removed",
            Event::AdapterRegistered { .. } => "adapter_registered",
            Event::AdapterRemoved { .. } => "adapter_removed",
            Event::DefaultBackendSet { .. } => "default_backend_set",
            Event::DustToleranceSet { .. } => "dust_tolerance_set",
            Event::MaxSlippageSet { .. } => "max_slippage_set",
            Event::MaxBackendCountSet { .. } => "max_backend_count_set",
            Event::ShortfallRecorded { .. } => "shortfall_recorded",
            Event::ShortfallCleared { .. } => "shortfall_cleared",
            Event::ShortfallMigrated { .. } => "shortfall_migrated",
            Event::Exchanged { .. } => "exchanged",
            Event::SurplusSwept { .. } => "surplus_swept",
            Event::SurplusHeld { .. } => "surplus_held",
            Event::Deposit { .. } => "deposit",
            Event::Withdraw { .. } => "withdraw",
            Event::FeesReinvested { .. } => "fees_reinvested",
            Event::WithdrawalFeeSet { .. } => "withdrawal_fee_set",
            Event::ReinvestIncentiveSet { .. } => "reinvest_incentive_set",
            Event::RouterSet { .. } => "router_set",
            Event::CoreMigrated { .. } => "core_migrated",
            Event::Rescued { .. } => "rescued",
        }
    }
}
