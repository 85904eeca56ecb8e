//! The router: decides which backends capital moves into and out of.
//!
//! # Modes
//!
//! - **Auto** ([`Router::auto_deposit`], [`Router::auto_withdraw`]): one backend
//!   per call, chosen by allocation deficit or surplus with deterministic
//!   tie-breaking. Transient adapter failures fall through to the next
//!   candidate, bounded by the candidate count.
//! - **Solver** ([`Router::solver_deposit_pool`] and friends): caller-supplied
//!   legs executed in order with no fallback. Any leg failure unwinds the call.
//!
//! Both modes run inside a reentrancy guard and a state checkpoint, and every
//! leg is checked against the adapter's own preview using balances measured
//! before and after the call rather than the adapter's reported return value.

mod auto;
mod config;
mod exchange;
mod legs;
mod solver;

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};
use multivault_allocation::{AllocationCalculator, AllocationSnapshot};
use serde::{Deserialize, Serialize};

use crate::access::AccessControl;
use crate::adapter::AdapterHandle;
use crate::error::{AdapterError, RouterError};
use crate::events::{Event, RoutingMode};
use crate::ledger::{AdapterLookup, CollateralLedger};
use crate::settings::{RouterSettings, MAX_SLIPPAGE_BPS};
use crate::state::{self, ChainState};

pub use exchange::ExchangeOutcome;
pub use solver::SolverLeg;

pub type Result<T> = std::result::Result<T, RouterError>;

/// Lifecycle of a configured backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendStatus {
    /// Accepts deposits and withdrawals
    Active,
    /// Drains only; still counts toward targets
    WithdrawOnly,
    /// Fully drained and excluded from routing
    Suspended,
}

impl BackendStatus {
    pub fn accepts_deposits(self) -> bool {
        matches!(self, BackendStatus::Active)
    }

    pub fn allows_withdrawals(self) -> bool {
        matches!(self, BackendStatus::Active | BackendStatus::WithdrawOnly)
    }

    /// Whether the backend's target participates in the 100% sum.
    pub fn counts_toward_targets(self) -> bool {
        self.allows_withdrawals()
    }
}

/// One configured backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Receipt identity of the backend
    pub backend_id: Address,
    pub adapter: AdapterHandle,
    /// Target share of managed value, 1_000_000 = 100%
    pub target_bps: u32,
    pub status: BackendStatus,
}

impl BackendConfig {
    /// An active backend.
    pub fn new(backend_id: Address, adapter: AdapterHandle, target_bps: u32) -> Self {
        Self {
            backend_id,
            adapter,
            target_bps,
            status: BackendStatus::Active,
        }
    }

    pub fn with_status(mut self, status: BackendStatus) -> Self {
        self.status = status;
        self
    }
}

/// What moved through one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegOutcome {
    pub backend: Address,
    pub pool_amount: U256,
    pub receipt_amount: U256,
}

/// Result of a routing call, mirrored by its notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    pub backends: Vec<Address>,
    pub pool_amounts: Vec<U256>,
    pub receipt_amounts: Vec<U256>,
    pub total_pool_amount: U256,
}

impl RouteOutcome {
    fn push(&mut self, leg: LegOutcome) {
        self.backends.push(leg.backend);
        self.pool_amounts.push(leg.pool_amount);
        self.receipt_amounts.push(leg.receipt_amount);
        self.total_pool_amount += leg.pool_amount;
    }

    fn single(leg: LegOutcome) -> Self {
        let mut outcome = Self::default();
        outcome.push(leg);
        outcome
    }

    pub fn total_receipt_amount(&self) -> U256 {
        self.receipt_amounts
            .iter()
            .fold(U256::ZERO, |total, amount| total + *amount)
    }

    fn deposit_event(&self, mode: RoutingMode) -> Event {
        Event::RouterDeposit {
            mode,
            backends: self.backends.clone(),
            pool_amounts: self.pool_amounts.clone(),
            receipt_amounts: self.receipt_amounts.clone(),
            total_pool_amount: self.total_pool_amount,
        }
    }

    fn withdraw_event(&self, mode: RoutingMode, receiver: Address, owner: Address) -> Event {
        Event::RouterWithdraw {
            mode,
            backends: self.backends.clone(),
            pool_amounts: self.pool_amounts.clone(),
            receipt_amounts: self.receipt_amounts.clone(),
            total_pool_amount: self.total_pool_amount,
            receiver,
            owner,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    address: Address,
    pool_token: Address,
    ledger: Address,
    backends: Vec<BackendConfig>,
    adapters: BTreeMap<Address, AdapterHandle>,
    default_backend: Option<Address>,
    settings: RouterSettings,
    shortfall: U256,
    access: AccessControl,
    entered: bool,
}

impl Router {
    /// A router with no backends; `admin` holds the admin role.
    pub fn new(address: Address, pool_token: Address, ledger: Address, admin: Address) -> Self {
        Self {
            address,
            pool_token,
            ledger,
            backends: Vec::new(),
            adapters: BTreeMap::new(),
            default_backend: None,
            settings: RouterSettings::default(),
            shortfall: U256::ZERO,
            access: AccessControl::with_admin(admin),
            entered: false,
        }
    }

    /// Replace the settings, rejecting an out-of-range slippage bound.
    pub fn with_settings(mut self, settings: RouterSettings) -> Result<Self> {
        if settings.max_slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(RouterError::SlippageTooHigh {
                bps: settings.max_slippage_bps,
                max: MAX_SLIPPAGE_BPS,
            });
        }
        self.settings = settings;
        Ok(self)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn pool_token(&self) -> Address {
        self.pool_token
    }

    pub fn ledger(&self) -> Address {
        self.ledger
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub fn dust_tolerance(&self) -> U256 {
        self.settings.dust_tolerance
    }

    pub fn max_slippage_bps(&self) -> u32 {
        self.settings.max_slippage_bps
    }

    /// Outstanding shortfall liability in pooled units.
    pub fn shortfall(&self) -> U256 {
        self.shortfall
    }

    pub fn default_backend(&self) -> Option<Address> {
        self.default_backend
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn access_mut(&mut self) -> &mut AccessControl {
        &mut self.access
    }

    pub fn backends(&self) -> &[BackendConfig] {
        &self.backends
    }

    pub fn backend(&self, backend: Address) -> Option<&BackendConfig> {
        self.backends.iter().find(|config| config.backend_id == backend)
    }

    pub fn active_backends(&self) -> Vec<&BackendConfig> {
        self.backends
            .iter()
            .filter(|config| config.status.accepts_deposits())
            .collect()
    }

    /// Registered adapters keyed by receipt identity.
    pub fn adapters(&self) -> impl Iterator<Item = (&Address, &AdapterHandle)> {
        self.adapters.iter()
    }

    /// Pooled units the router itself holds (held surplus, fee residue).
    pub fn idle_balance(&self, state: &ChainState) -> U256 {
        state.tokens.balance_of(self.pool_token, self.address)
    }

    /// Pooled-unit value of the ledger's custody in one backend.
    pub fn backend_value(&self, state: &ChainState, backend: Address) -> Result<U256> {
        let index = self.index_of(backend)?;
        self.value_at(state, index)
    }

    /// Gross managed value as the ledger reports it.
    pub fn total_managed_value(
        &self,
        state: &ChainState,
        ledger: &CollateralLedger,
    ) -> Result<U256> {
        self.ensure_ledger(ledger)?;
        Ok(ledger.total_value_in_pool_units(state, self)?)
    }

    /// Current against target allocation over backends that count toward targets.
    pub fn current_allocations(&self, state: &ChainState) -> Result<AllocationSnapshot> {
        let counted: Vec<usize> = self.indices_where(|status| status.counts_toward_targets());
        let values = counted
            .iter()
            .map(|index| self.value_at(state, *index))
            .collect::<Result<Vec<_>>>()?;
        let backends: Vec<Address> = counted
            .iter()
            .map(|index| self.backends[*index].backend_id)
            .collect();
        let targets: Vec<u32> = counted
            .iter()
            .map(|index| self.backends[*index].target_bps)
            .collect();
        Ok(AllocationSnapshot::from_values(&backends, &values, &targets)?)
    }

    fn value_at(&self, state: &ChainState, index: usize) -> Result<U256> {
        let config = &self.backends[index];
        let balance = state.tokens.balance_of(config.backend_id, self.ledger);
        if balance.is_zero() {
            return Ok(U256::ZERO);
        }
        config
            .adapter
            .strategy_share_value_in_pool_units(state, config.backend_id, balance)
            .map_err(RouterError::adapter(config.backend_id))
    }

    fn index_of(&self, backend: Address) -> Result<usize> {
        self.backends
            .iter()
            .position(|config| config.backend_id == backend)
            .ok_or(RouterError::BackendNotFound { backend })
    }

    fn deposit_index(&self, backend: Address) -> Result<usize> {
        let index = self.index_of(backend)?;
        let status = self.backends[index].status;
        if !status.accepts_deposits() {
            return Err(RouterError::BackendNotActive { backend, status });
        }
        Ok(index)
    }

    fn withdraw_index(&self, backend: Address) -> Result<usize> {
        let index = self.index_of(backend)?;
        let status = self.backends[index].status;
        if !status.allows_withdrawals() {
            return Err(RouterError::BackendNotActive { backend, status });
        }
        Ok(index)
    }

    fn indices_where(&self, predicate: impl Fn(BackendStatus) -> bool) -> Vec<usize> {
        self.backends
            .iter()
            .enumerate()
            .filter(|(_, config)| predicate(config.status))
            .map(|(index, _)| index)
            .collect()
    }

    /// Allocation fractions and targets for a candidate set.
    fn allocations_for(&self, state: &ChainState, candidates: &[usize]) -> Result<(Vec<u32>, Vec<u32>)> {
        let values = candidates
            .iter()
            .map(|index| self.value_at(state, *index))
            .collect::<Result<Vec<_>>>()?;
        let targets = candidates
            .iter()
            .map(|index| self.backends[*index].target_bps)
            .collect();
        Ok((AllocationCalculator::current_allocations(&values), targets))
    }

    fn ensure_ledger(&self, ledger: &CollateralLedger) -> Result<()> {
        if ledger.address() != self.ledger {
            return Err(RouterError::LedgerMismatch {
                expected: self.ledger,
                actual: ledger.address(),
            });
        }
        Ok(())
    }

    /// Run a value-moving operation under the reentrancy guard, restoring the
    /// router and the state if it fails.
    fn guarded<T>(
        &mut self,
        state: &mut ChainState,
        op: impl FnOnce(&mut Self, &mut ChainState) -> Result<T>,
    ) -> Result<T> {
        if self.entered {
            return Err(RouterError::Reentrancy);
        }
        self.entered = true;
        let result = state::atomically(self, state, op);
        self.entered = false;
        result
    }

    fn zero_conversion(backend: Address) -> RouterError {
        RouterError::Adapter {
            backend,
            source: AdapterError::ZeroConversion { backend },
        }
    }
}

impl AdapterLookup for Router {
    fn adapter_for(&self, receipt: Address) -> Option<&AdapterHandle> {
        self.adapters.get(&receipt)
    }
}

fn sum(amounts: impl IntoIterator<Item = U256>) -> Result<U256> {
    amounts.into_iter().try_fold(U256::ZERO, |total, amount| {
        total.checked_add(amount).ok_or(RouterError::AmountOverflow)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DeploymentBuilder, Misbehavior, SHARE_VAULT};

    #[test]
    fn test_status_capabilities() {
        assert!(BackendStatus::Active.accepts_deposits());
        assert!(!BackendStatus::WithdrawOnly.accepts_deposits());
        assert!(BackendStatus::WithdrawOnly.allows_withdrawals());
        assert!(BackendStatus::WithdrawOnly.counts_toward_targets());
        assert!(!BackendStatus::Suspended.allows_withdrawals());
        assert!(!BackendStatus::Suspended.counts_toward_targets());
    }

    #[test]
    fn test_guard_rejects_reentry() {
        let mut deployment = DeploymentBuilder::new().build().unwrap();
        let (router, ledger) = deployment.vault.core_mut();
        let ledger = ledger.clone();
        router.entered = true;

        let result = router.auto_deposit(
            &mut deployment.state,
            &ledger,
            SHARE_VAULT,
            U256::from(100u64),
        );
        assert_eq!(result, Err(RouterError::Reentrancy));
    }

    #[test]
    fn test_guard_releases_after_failure() {
        let mut deployment = DeploymentBuilder::new().build().unwrap();
        let (router, ledger) = deployment.vault.core_mut();
        let ledger = ledger.clone();

        // No allowance from the share vault, so the pull fails.
        let result = router.auto_deposit(
            &mut deployment.state,
            &ledger,
            SHARE_VAULT,
            U256::from(100u64),
        );
        assert!(matches!(result, Err(RouterError::Token(_))));
        assert!(!router.entered);
        assert!(deployment.state.events().is_empty());
    }

    #[test]
    fn test_ledger_mismatch_rejected() {
        let mut deployment = DeploymentBuilder::new().build().unwrap();
        let stranger = CollateralLedger::new(
            Address::repeat_byte(0x77),
            deployment.vault.asset(),
            Address::repeat_byte(0x01),
        );
        let router = deployment.vault.router_mut();
        let result = router.auto_deposit(
            &mut deployment.state,
            &stranger,
            SHARE_VAULT,
            U256::from(100u64),
        );
        assert!(matches!(result, Err(RouterError::LedgerMismatch { .. })));
    }

    #[test]
    fn test_current_allocations_follow_custody() {
        let mut deployment = DeploymentBuilder::new().build().unwrap();
        let alice = crate::testing::user(1);
        deployment.fund(alice, U256::from(3000u64)).unwrap();
        deployment.deposit(alice, U256::from(1000u64)).unwrap();
        deployment.deposit(alice, U256::from(1000u64)).unwrap();
        deployment.deposit(alice, U256::from(1000u64)).unwrap();

        let snapshot = deployment
            .vault
            .router()
            .current_allocations(&deployment.state)
            .unwrap();
        assert_eq!(snapshot.total_value, U256::from(3000u64));
        assert_eq!(
            deployment
                .vault
                .router()
                .backend_value(&deployment.state, deployment.backend(0))
                .unwrap(),
            U256::from(2000u64)
        );
    }

    #[test]
    fn test_valuation_failure_names_backend() {
        let deployment = DeploymentBuilder::new().build().unwrap();
        let mut state = deployment.state.clone();
        state
            .tokens
            .mint(deployment.backend(1), deployment.vault.ledger().address(), U256::from(5u64))
            .unwrap();
        deployment
            .adapter(1)
            .set_behavior(Misbehavior::UnreachableValuation);

        let result = deployment
            .vault
            .router()
            .backend_value(&state, deployment.backend(1));
        assert!(matches!(
            result,
            Err(RouterError::Adapter { backend, .. }) if backend == deployment.backend(1)
        ));
    }
}
