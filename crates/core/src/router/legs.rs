//! Single-backend legs shared by every routing mode.
//!
//! Each leg approves the adapter for exactly the amount it moves, measures the
//! resulting balance change itself, and checks it against the adapter's own
//! preview less the configured slippage.

use alloy_primitives::{Address, U256};
use tracing::{debug, warn};

use super::{LegOutcome, Result, Router};
use crate::error::RouterError;
use crate::events::Event;
use crate::ledger::CollateralLedger;
use crate::math::{less_bps, zero_floor_sub};
use crate::state::ChainState;

impl Router {
    /// Deposit `pool_amount` held by the router into backend `index`.
    pub(super) fn deposit_leg(
        &self,
        state: &mut ChainState,
        index: usize,
        pool_amount: U256,
    ) -> Result<LegOutcome> {
        let config = &self.backends[index];
        let backend = config.backend_id;
        let adapter = &config.adapter;

        let (receipt, expected) = adapter
            .preview_deposit_into_strategy(state, pool_amount)
            .map_err(RouterError::adapter(backend))?;
        if receipt != backend {
            return Err(RouterError::AdapterReceiptMismatch {
                backend,
                reported: receipt,
            });
        }
        if expected.is_zero() {
            return Err(Router::zero_conversion(backend));
        }

        let router = self.address;
        let before = state.tokens.balance_of(backend, self.ledger);
        let (reported, _) = state
            .with_exact_approval(self.pool_token, router, adapter.address(), pool_amount, |state| {
                adapter.deposit_into_strategy(state, router, pool_amount)
            })
            .map_err(RouterError::adapter(backend))?;
        if reported != backend {
            return Err(RouterError::AdapterReceiptMismatch {
                backend,
                reported,
            });
        }

        let received = zero_floor_sub(state.tokens.balance_of(backend, self.ledger), before);
        let minimum = less_bps(expected, self.settings.max_slippage_bps);
        if received < minimum {
            return Err(RouterError::SlippageExceeded {
                backend,
                minimum,
                actual: received,
            });
        }

        debug!(%backend, %pool_amount, %received, "deposit leg");
        Ok(LegOutcome {
            backend,
            pool_amount,
            receipt_amount: received,
        })
    }

    /// Redeem `receipt_amount` of backend `index` from custody, leaving the
    /// proceeds with the router. The leg's `pool_amount` is the measured delivery.
    pub(super) fn redeem_leg(
        &self,
        state: &mut ChainState,
        ledger: &CollateralLedger,
        index: usize,
        receipt_amount: U256,
    ) -> Result<LegOutcome> {
        let config = &self.backends[index];
        let backend = config.backend_id;
        let adapter = &config.adapter;

        let available = ledger.balance_of(state, backend);
        if receipt_amount > available {
            return Err(RouterError::InsufficientCustody {
                backend,
                needed: receipt_amount,
                available,
            });
        }

        let expected = adapter
            .preview_withdraw_from_strategy(state, receipt_amount)
            .map_err(RouterError::adapter(backend))?;
        if expected.is_zero() {
            return Err(Router::zero_conversion(backend));
        }

        let router = self.address;
        ledger.transfer_out(state, router, backend, receipt_amount, router)?;

        let before = self.idle_balance(state);
        state
            .with_exact_approval(backend, router, adapter.address(), receipt_amount, |state| {
                adapter.withdraw_from_strategy(state, router, receipt_amount)
            })
            .map_err(RouterError::adapter(backend))?;
        let delivered = zero_floor_sub(self.idle_balance(state), before);

        let minimum = less_bps(expected, self.settings.max_slippage_bps);
        if delivered < minimum {
            return Err(RouterError::SlippageExceeded {
                backend,
                minimum,
                actual: delivered,
            });
        }

        debug!(%backend, %receipt_amount, %delivered, "redeem leg");
        Ok(LegOutcome {
            backend,
            pool_amount: delivered,
            receipt_amount,
        })
    }

    /// Withdraw at least `pool_amount` from backend `index` into the router.
    ///
    /// Returns the leg, reporting exactly `pool_amount`, and any surplus the
    /// round-up delivered beyond it.
    pub(super) fn withdraw_leg(
        &self,
        state: &mut ChainState,
        ledger: &CollateralLedger,
        index: usize,
        pool_amount: U256,
    ) -> Result<(LegOutcome, U256)> {
        let config = &self.backends[index];
        let backend = config.backend_id;

        let receipt_amount = config
            .adapter
            .preview_receipt_for_withdrawal(state, pool_amount)
            .map_err(RouterError::adapter(backend))?;
        if receipt_amount.is_zero() {
            return Err(Router::zero_conversion(backend));
        }

        let leg = self.redeem_leg(state, ledger, index, receipt_amount)?;
        if leg.pool_amount < pool_amount {
            return Err(RouterError::ShortDelivery {
                backend,
                requested: pool_amount,
                delivered: leg.pool_amount,
            });
        }

        let surplus = leg.pool_amount - pool_amount;
        Ok((
            LegOutcome {
                pool_amount,
                ..leg
            },
            surplus,
        ))
    }

    /// Put surplus from a withdrawal back into the default backend.
    ///
    /// On failure the amount stays with the router for a later sweep.
    pub(super) fn recycle_surplus(&self, state: &mut ChainState, surplus: U256) {
        if surplus.is_zero() {
            return;
        }

        let target = self
            .default_backend
            .and_then(|backend| self.deposit_index(backend).ok());
        if let Some(index) = target {
            let checkpoint = state.checkpoint();
            match self.deposit_leg(state, index, surplus) {
                Ok(leg) => {
                    debug!(backend = %leg.backend, %surplus, "recycled withdrawal surplus");
                    return;
                }
                Err(error) => {
                    state.revert_to(checkpoint);
                    warn!(%error, %surplus, "surplus recycle failed");
                }
            }
        }

        warn!(%surplus, "holding withdrawal surplus");
        state.emit(Event::SurplusHeld { amount: surplus });
    }

    /// Pay `amount` of pooled units from the router to `receiver`.
    pub(super) fn pay(&self, state: &mut ChainState, receiver: Address, amount: U256) -> Result<()> {
        state
            .tokens
            .transfer(self.pool_token, self.address, receiver, amount)?;
        Ok(())
    }
}
