//! Auto mode: deterministic single-backend routing with bounded fallback.

use alloy_primitives::{Address, U256};
use multivault_allocation::DeterministicVaultSelector;
use tracing::{debug, info, warn};

use super::{LegOutcome, Result, RouteOutcome, Router};
use crate::access::Role;
use crate::error::RouterError;
use crate::events::RoutingMode;
use crate::ledger::CollateralLedger;
use crate::state::ChainState;

impl Router {
    /// Pull `pool_amount` from the share unit and deposit it into the most
    /// underweight active backend, falling back on transient failures.
    pub fn auto_deposit(
        &mut self,
        state: &mut ChainState,
        ledger: &CollateralLedger,
        caller: Address,
        pool_amount: U256,
    ) -> Result<RouteOutcome> {
        self.guarded(state, |router, state| {
            router.access.ensure(Role::PooledVault, caller)?;
            router.ensure_ledger(ledger)?;
            if pool_amount.is_zero() {
                return Err(RouterError::ZeroAmount);
            }

            state.tokens.transfer_from(
                router.pool_token,
                router.address,
                caller,
                router.address,
                pool_amount,
            )?;

            let leg = router.route_deposit(state, pool_amount)?;
            let outcome = RouteOutcome::single(leg);
            info!(
                backend = %leg.backend,
                pool_amount = %leg.pool_amount,
                receipt_amount = %leg.receipt_amount,
                "auto deposit"
            );
            state.emit(outcome.deposit_event(RoutingMode::Auto));
            Ok(outcome)
        })
    }

    /// Withdraw exactly `pool_amount` from the most overweight backend that
    /// can cover it and deliver it to `receiver`.
    pub fn auto_withdraw(
        &mut self,
        state: &mut ChainState,
        ledger: &CollateralLedger,
        caller: Address,
        pool_amount: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<RouteOutcome> {
        self.guarded(state, |router, state| {
            router.access.ensure(Role::PooledVault, caller)?;
            router.ensure_ledger(ledger)?;
            if pool_amount.is_zero() {
                return Err(RouterError::ZeroAmount);
            }
            if receiver.is_zero() {
                return Err(RouterError::ZeroAddress);
            }

            let (leg, surplus) = router.route_withdraw(state, ledger, pool_amount)?;
            router.pay(state, receiver, pool_amount)?;
            router.recycle_surplus(state, surplus);

            let outcome = RouteOutcome::single(leg);
            info!(
                backend = %leg.backend,
                pool_amount = %leg.pool_amount,
                receipt_amount = %leg.receipt_amount,
                %receiver,
                %owner,
                "auto withdraw"
            );
            state.emit(outcome.withdraw_event(RoutingMode::Auto, receiver, owner));
            Ok(outcome)
        })
    }

    /// Candidate order for deposits: largest deficit first, lowest index on ties.
    pub fn deposit_candidates(&self, state: &ChainState) -> Result<Vec<Address>> {
        Ok(self
            .deposit_order(state)?
            .into_iter()
            .map(|index| self.backends[index].backend_id)
            .collect())
    }

    /// Candidate order for withdrawals: largest surplus first, lowest index on ties.
    pub fn withdraw_candidates(&self, state: &ChainState) -> Result<Vec<Address>> {
        Ok(self
            .withdraw_order(state)?
            .into_iter()
            .map(|index| self.backends[index].backend_id)
            .collect())
    }

    fn deposit_order(&self, state: &ChainState) -> Result<Vec<usize>> {
        let active = self.indices_where(|status| status.accepts_deposits());
        if active.is_empty() {
            return Err(RouterError::NoActiveBackends);
        }
        let (current, targets) = self.allocations_for(state, &active)?;
        let ranked =
            DeterministicVaultSelector::select_top_underallocated(&current, &targets, active.len())?;
        Ok(ranked.into_iter().map(|position| active[position]).collect())
    }

    fn withdraw_order(&self, state: &ChainState) -> Result<Vec<usize>> {
        let eligible = self.indices_where(|status| status.allows_withdrawals());
        if eligible.is_empty() {
            return Err(RouterError::NoActiveBackends);
        }
        let (current, targets) = self.allocations_for(state, &eligible)?;
        let ranked = DeterministicVaultSelector::select_top_overallocated(
            &current,
            &targets,
            eligible.len(),
        )?;
        Ok(ranked.into_iter().map(|position| eligible[position]).collect())
    }

    fn route_deposit(&self, state: &mut ChainState, pool_amount: U256) -> Result<LegOutcome> {
        let order = self.deposit_order(state)?;
        let attempts = order.len();

        for (attempt, index) in order.into_iter().enumerate() {
            let backend = self.backends[index].backend_id;
            debug!(attempt, %backend, %pool_amount, "auto deposit attempt");

            let checkpoint = state.checkpoint();
            match self.deposit_leg(state, index, pool_amount) {
                Ok(leg) => return Ok(leg),
                Err(error) if error.is_transient() => {
                    state.revert_to(checkpoint);
                    warn!(%backend, %error, "transient deposit failure, trying next backend");
                }
                Err(error) => return Err(error),
            }
        }

        Err(RouterError::NoEligibleBackend {
            attempted: attempts,
        })
    }

    fn route_withdraw(
        &self,
        state: &mut ChainState,
        ledger: &CollateralLedger,
        pool_amount: U256,
    ) -> Result<(LegOutcome, U256)> {
        let order = self.withdraw_order(state)?;
        let attempts = order.len();

        for (attempt, index) in order.into_iter().enumerate() {
            let backend = self.backends[index].backend_id;
            debug!(attempt, %backend, %pool_amount, "auto withdraw attempt");

            let checkpoint = state.checkpoint();
            match self.withdraw_leg(state, ledger, index, pool_amount) {
                Ok(result) => return Ok(result),
                Err(error) if error.is_transient() => {
                    state.revert_to(checkpoint);
                    warn!(%backend, %error, "transient withdraw failure, trying next backend");
                }
                Err(error) => return Err(error),
            }
        }

        Err(RouterError::NoEligibleBackend {
            attempted: attempts,
        })
    }
}
