//! Final-state report of a replayed scenario.

use alloy_primitives::{Address, U256};
use multivault_core::testing::{Deployment, LEDGER};
use multivault_core::{BackendStatus, Event};
use serde::{Serialize, Serializer};

use crate::scenario::Scenario;

/// Amounts are written as decimal strings so JSON consumers never see hex.
fn decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

fn optional_decimal<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serializer.collect_str(value),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub step: String,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct Accounting {
    #[serde(serialize_with = "decimal")]
    pub total_supply: U256,
    /// Unavailable when a backend's valuation cannot be read
    #[serde(serialize_with = "optional_decimal")]
    pub gross_managed: Option<U256>,
    #[serde(serialize_with = "optional_decimal")]
    pub net_managed: Option<U256>,
    #[serde(serialize_with = "decimal")]
    pub shortfall: U256,
    #[serde(serialize_with = "decimal")]
    pub accumulated_fees: U256,
    #[serde(serialize_with = "decimal")]
    pub router_idle: U256,
    pub withdrawal_fee_bps: u32,
    pub default_backend: Option<Address>,
}

#[derive(Debug, Serialize)]
pub struct BackendReport {
    pub name: String,
    pub address: Address,
    pub status: BackendStatus,
    pub target_bps: u32,
    /// Share of the counted total, absent for suspended backends
    pub current_bps: Option<u32>,
    #[serde(serialize_with = "optional_decimal")]
    pub value: Option<U256>,
    /// Receipts held by the collateral ledger
    #[serde(serialize_with = "decimal")]
    pub custody: U256,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub name: Option<String>,
    pub steps: Vec<StepReport>,
    pub accounting: Accounting,
    pub backends: Vec<BackendReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<Event>>,
}

impl Report {
    pub fn collect(
        scenario: &Scenario,
        deployment: &Deployment,
        steps: Vec<StepReport>,
        events: Option<Vec<Event>>,
    ) -> Self {
        let state = &deployment.state;
        let vault = &deployment.vault;
        let router = vault.router();
        let snapshot = router.current_allocations(state).ok();

        let backends = router
            .backends()
            .iter()
            .enumerate()
            .map(|(index, config)| {
                let current_bps = snapshot.as_ref().and_then(|snapshot| {
                    snapshot
                        .entries
                        .iter()
                        .find(|entry| entry.backend == config.backend_id)
                        .map(|entry| entry.current_bps)
                });
                BackendReport {
                    name: scenario.backend_name(index).to_string(),
                    address: config.backend_id,
                    status: config.status,
                    target_bps: config.target_bps,
                    current_bps,
                    value: router.backend_value(state, config.backend_id).ok(),
                    custody: state.tokens.balance_of(config.backend_id, LEDGER),
                }
            })
            .collect();

        let accounting = Accounting {
            total_supply: vault.total_supply(state),
            gross_managed: vault.gross_managed_assets(state).ok(),
            net_managed: vault.net_managed_assets(state).ok(),
            shortfall: router.shortfall(),
            accumulated_fees: vault.accumulated_fees(state),
            router_idle: router.idle_balance(state),
            withdrawal_fee_bps: vault.withdrawal_fee_bps(),
            default_backend: router.default_backend(),
        };

        Report {
            name: scenario.name.clone(),
            steps,
            accounting,
            backends,
            events,
        }
    }

    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|step| !step.ok).count()
    }
}
