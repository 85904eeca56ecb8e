//! Shared setup and assertions for routing integration tests.

#![expect(dead_code)]

use alloy_primitives::{Address, U256};
use multivault_core::testing::{
    user, Deployment, DeploymentBuilder, POOL_TOKEN, ROUTER, SHARE_VAULT,
};
use multivault_core::{Event, RoutingMode, StrategyAdapter, VaultSettings};

pub fn units(amount: u64) -> U256 {
    U256::from(amount)
}

/// A deployment with `backends` equally weighted backends.
pub fn deployment(backends: usize) -> Deployment {
    DeploymentBuilder::new()
        .with_backends(backends)
        .build()
        .unwrap()
}

pub fn deployment_with_fee(backends: usize, fee_bps: u32) -> Deployment {
    DeploymentBuilder::new()
        .with_backends(backends)
        .with_vault_settings(VaultSettings::new().with_withdrawal_fee_bps(fee_bps))
        .build()
        .unwrap()
}

/// Fund user `index` with `amount` and deposit it in equal chunks, one per call.
pub fn deposit_in_chunks(deployment: &mut Deployment, index: u8, chunk: u64, count: usize) -> Address {
    let depositor = user(index);
    deployment
        .fund(depositor, units(chunk) * U256::from(count))
        .unwrap();
    for _ in 0..count {
        deployment.deposit(depositor, units(chunk)).unwrap();
    }
    depositor
}

/// Pooled units held by everything except end users.
pub fn system_holdings(deployment: &Deployment) -> U256 {
    let backends = deployment
        .vault
        .router()
        .backends()
        .iter()
        .map(|config| deployment.pool_balance(config.backend_id))
        .fold(U256::ZERO, |total, balance| total + balance);
    backends + deployment.pool_balance(ROUTER) + deployment.pool_balance(SHARE_VAULT)
}

/// Every custody receipt balance, in backend order.
pub fn custody(deployment: &Deployment) -> Vec<U256> {
    (0..deployment.adapters.len())
        .map(|index| deployment.custody(index))
        .collect()
}

pub fn assert_no_dangling_allowances(deployment: &Deployment) {
    for owner in [ROUTER, SHARE_VAULT] {
        let granted = deployment.state.tokens.allowances_granted_by(owner);
        assert!(granted.is_empty(), "{owner} left allowances behind: {granted:?}");
    }
    for adapter in &deployment.adapters {
        let granted = deployment
            .state
            .tokens
            .allowances_granted_by(StrategyAdapter::address(adapter.as_ref()));
        assert!(granted.is_empty(), "adapter left allowances behind: {granted:?}");
    }
}

/// Backends named by the most recent router deposit or withdraw notification.
pub fn last_routed_backends(deployment: &Deployment) -> (RoutingMode, Vec<Address>) {
    deployment
        .state
        .events()
        .iter()
        .rev()
        .find_map(|event| match event {
            Event::RouterDeposit { mode, backends, .. }
            | Event::RouterWithdraw { mode, backends, .. } => Some((*mode, backends.clone())),
            _ => None,
        })
        .expect("no routing notification")
}

pub fn pool_supply(deployment: &Deployment) -> U256 {
    deployment.state.tokens.total_supply(POOL_TOKEN)
}
