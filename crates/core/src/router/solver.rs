//! Solver mode: caller-directed legs executed atomically, without fallback.

use alloy_primitives::{Address, U256};
use tracing::info;

use super::{sum, Result, RouteOutcome, Router};
use crate::access::Role;
use crate::error::RouterError;
use crate::events::RoutingMode;
use crate::ledger::CollateralLedger;
use crate::math::less_bps;
use crate::state::ChainState;

/// One `(backend, amount)` pair of a solver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverLeg {
    pub backend: Address,
    pub amount: U256,
}

impl SolverLeg {
    pub fn new(backend: Address, amount: U256) -> Self {
        Self { backend, amount }
    }

    /// Pair up parallel backend and amount lists.
    ///
    /// Ragged or empty input is a configuration error.
    pub fn zip(backends: &[Address], amounts: &[U256]) -> Result<Vec<SolverLeg>> {
        if backends.len() != amounts.len() {
            return Err(RouterError::LegLengthMismatch {
                backends: backends.len(),
                amounts: amounts.len(),
            });
        }
        if backends.is_empty() {
            return Err(RouterError::EmptyLegs);
        }
        Ok(backends
            .iter()
            .zip(amounts)
            .map(|(backend, amount)| SolverLeg::new(*backend, *amount))
            .collect())
    }

    /// Sum of the leg amounts, refusing totals that overflow.
    pub fn total(legs: &[SolverLeg]) -> Result<U256> {
        sum(legs.iter().map(|leg| leg.amount))
    }
}

/// Sum of leg amounts; rejects an empty list or a zero total.
fn leg_total(legs: &[SolverLeg]) -> Result<U256> {
    if legs.is_empty() {
        return Err(RouterError::EmptyLegs);
    }
    let total = SolverLeg::total(legs)?;
    if total.is_zero() {
        return Err(RouterError::ZeroAmount);
    }
    Ok(total)
}

impl Router {
    /// Deposit pooled amounts into the given backends.
    pub fn solver_deposit_pool(
        &mut self,
        state: &mut ChainState,
        ledger: &CollateralLedger,
        caller: Address,
        legs: &[SolverLeg],
    ) -> Result<RouteOutcome> {
        self.guarded(state, |router, state| {
            router.access.ensure(Role::PooledVault, caller)?;
            router.ensure_ledger(ledger)?;
            let total = leg_total(legs)?;

            state.tokens.transfer_from(
                router.pool_token,
                router.address,
                caller,
                router.address,
                total,
            )?;

            let mut outcome = RouteOutcome::default();
            for leg in legs.iter().filter(|leg| !leg.amount.is_zero()) {
                let index = router.deposit_index(leg.backend)?;
                outcome.push(router.deposit_leg(state, index, leg.amount)?);
            }

            info!(legs = outcome.backends.len(), total = %outcome.total_pool_amount, "solver deposit");
            state.emit(outcome.deposit_event(RoutingMode::Solver));
            Ok(outcome)
        })
    }

    /// Pooled units needed to mint the requested receipt amounts.
    pub fn preview_solver_deposit_receipts(
        &self,
        state: &ChainState,
        legs: &[SolverLeg],
    ) -> Result<U256> {
        leg_total(legs)?;
        let mut total = U256::ZERO;
        for leg in legs.iter().filter(|leg| !leg.amount.is_zero()) {
            total = total
                .checked_add(self.pool_for_receipt(state, leg)?)
                .ok_or(RouterError::AmountOverflow)?;
        }
        Ok(total)
    }

    /// Deposit enough pooled units to mint the requested receipt amounts.
    pub fn solver_deposit_receipts(
        &mut self,
        state: &mut ChainState,
        ledger: &CollateralLedger,
        caller: Address,
        legs: &[SolverLeg],
    ) -> Result<RouteOutcome> {
        self.guarded(state, |router, state| {
            router.access.ensure(Role::PooledVault, caller)?;
            router.ensure_ledger(ledger)?;
            leg_total(legs)?;

            let view: &ChainState = state;
            let pool_amounts = legs
                .iter()
                .map(|leg| {
                    if leg.amount.is_zero() {
                        Ok(U256::ZERO)
                    } else {
                        router.pool_for_receipt(view, leg)
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            let total = sum(pool_amounts.iter().copied())?;

            state.tokens.transfer_from(
                router.pool_token,
                router.address,
                caller,
                router.address,
                total,
            )?;

            let mut outcome = RouteOutcome::default();
            for (leg, pool_amount) in legs.iter().zip(pool_amounts) {
                if leg.amount.is_zero() {
                    continue;
                }
                let index = router.deposit_index(leg.backend)?;
                let executed = router.deposit_leg(state, index, pool_amount)?;
                let minimum = less_bps(leg.amount, router.settings.max_slippage_bps);
                if executed.receipt_amount < minimum {
                    return Err(RouterError::SlippageExceeded {
                        backend: leg.backend,
                        minimum,
                        actual: executed.receipt_amount,
                    });
                }
                outcome.push(executed);
            }

            info!(legs = outcome.backends.len(), total = %outcome.total_pool_amount, "solver receipt deposit");
            state.emit(outcome.deposit_event(RoutingMode::Solver));
            Ok(outcome)
        })
    }

    /// Withdraw exactly the given pooled amounts and deliver their sum to
    /// `receiver`.
    pub fn solver_withdraw_pool(
        &mut self,
        state: &mut ChainState,
        ledger: &CollateralLedger,
        caller: Address,
        legs: &[SolverLeg],
        receiver: Address,
        owner: Address,
    ) -> Result<RouteOutcome> {
        self.guarded(state, |router, state| {
            router.access.ensure(Role::PooledVault, caller)?;
            router.ensure_ledger(ledger)?;
            if receiver.is_zero() {
                return Err(RouterError::ZeroAddress);
            }
            let total = leg_total(legs)?;

            let mut outcome = RouteOutcome::default();
            let mut surplus = U256::ZERO;
            for leg in legs.iter().filter(|leg| !leg.amount.is_zero()) {
                let index = router.withdraw_index(leg.backend)?;
                let (executed, extra) = router.withdraw_leg(state, ledger, index, leg.amount)?;
                outcome.push(executed);
                surplus += extra;
            }

            router.pay(state, receiver, total)?;
            router.recycle_surplus(state, surplus);

            info!(legs = outcome.backends.len(), %total, %receiver, "solver withdraw");
            state.emit(outcome.withdraw_event(RoutingMode::Solver, receiver, owner));
            Ok(outcome)
        })
    }

    /// Pooled units the given receipt redemptions are expected to deliver.
    pub fn preview_solver_withdraw_receipts(
        &self,
        state: &ChainState,
        legs: &[SolverLeg],
    ) -> Result<U256> {
        leg_total(legs)?;
        let mut total = U256::ZERO;
        for leg in legs.iter().filter(|leg| !leg.amount.is_zero()) {
            let index = self.withdraw_index(leg.backend)?;
            let expected = self.backends[index]
                .adapter
                .preview_withdraw_from_strategy(state, leg.amount)
                .map_err(RouterError::adapter(leg.backend))?;
            total = total
                .checked_add(expected)
                .ok_or(RouterError::AmountOverflow)?;
        }
        Ok(total)
    }

    /// Redeem the given receipt amounts from custody and deliver everything
    /// they yield to `receiver`.
    pub fn solver_withdraw_receipts(
        &mut self,
        state: &mut ChainState,
        ledger: &CollateralLedger,
        caller: Address,
        legs: &[SolverLeg],
        receiver: Address,
        owner: Address,
    ) -> Result<RouteOutcome> {
        self.guarded(state, |router, state| {
            router.access.ensure(Role::PooledVault, caller)?;
            router.ensure_ledger(ledger)?;
            if receiver.is_zero() {
                return Err(RouterError::ZeroAddress);
            }
            leg_total(legs)?;

            let mut outcome = RouteOutcome::default();
            for leg in legs.iter().filter(|leg| !leg.amount.is_zero()) {
                let index = router.withdraw_index(leg.backend)?;
                outcome.push(router.redeem_leg(state, ledger, index, leg.amount)?);
            }

            router.pay(state, receiver, outcome.total_pool_amount)?;

            info!(legs = outcome.backends.len(), total = %outcome.total_pool_amount, %receiver, "solver receipt withdraw");
            state.emit(outcome.withdraw_event(RoutingMode::Solver, receiver, owner));
            Ok(outcome)
        })
    }

    fn pool_for_receipt(&self, state: &ChainState, leg: &SolverLeg) -> Result<U256> {
        let index = self.deposit_index(leg.backend)?;
        self.backends[index]
            .adapter
            .preview_pool_for_receipt(state, leg.amount)
            .map_err(RouterError::adapter(leg.backend))
    }
}
