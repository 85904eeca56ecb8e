//! Moving capital between backends and sweeping idle router balance.

use alloy_primitives::{Address, U256};
use tracing::info;

use super::{Result, RouteOutcome, Router};
use crate::access::Role;
use crate::error::RouterError;
use crate::events::{Event, RoutingMode};
use crate::ledger::CollateralLedger;
use crate::math::{abs_diff, min};
use crate::state::ChainState;

/// Result of a backend-to-backend exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeOutcome {
    pub from_backend: Address,
    pub to_backend: Address,
    pub from_receipt_amount: U256,
    pub to_receipt_amount: U256,
    /// Pooled units that passed through the router
    pub pool_value: U256,
}

impl Router {
    /// Redeem `from_receipt_amount` of `from_backend` and deposit the proceeds
    /// into `to_backend`.
    ///
    /// The destination receipt must reach `min_to_amount`, and the value that
    /// left must match the value that arrived within the dust tolerance, both
    /// priced by the adapters' previews.
    #[expect(clippy::too_many_arguments)]
    pub fn exchange_between_backends(
        &mut self,
        state: &mut ChainState,
        ledger: &CollateralLedger,
        caller: Address,
        from_backend: Address,
        to_backend: Address,
        from_receipt_amount: U256,
        min_to_amount: U256,
    ) -> Result<ExchangeOutcome> {
        self.guarded(state, |router, state| {
            router.access.ensure(Role::CollateralExchanger, caller)?;
            router.ensure_ledger(ledger)?;
            if from_backend == to_backend {
                return Err(RouterError::SameBackend {
                    backend: from_backend,
                });
            }
            if from_receipt_amount.is_zero() {
                return Err(RouterError::ZeroAmount);
            }

            let from_index = router.withdraw_index(from_backend)?;
            let to_index = router.deposit_index(to_backend)?;

            let value_out = router.backends[from_index]
                .adapter
                .preview_withdraw_from_strategy(state, from_receipt_amount)
                .map_err(RouterError::adapter(from_backend))?;

            let redeemed = router.redeem_leg(state, ledger, from_index, from_receipt_amount)?;
            let deposited = router.deposit_leg(state, to_index, redeemed.pool_amount)?;

            if deposited.receipt_amount < min_to_amount {
                return Err(RouterError::MinimumOutputNotMet {
                    minimum: min_to_amount,
                    actual: deposited.receipt_amount,
                });
            }

            let value_in = router.backends[to_index]
                .adapter
                .preview_withdraw_from_strategy(state, deposited.receipt_amount)
                .map_err(RouterError::adapter(to_backend))?;
            let tolerance = router.settings.dust_tolerance;
            if abs_diff(value_out, value_in) > tolerance {
                return Err(RouterError::ExchangeValueMismatch {
                    value_out,
                    value_in,
                    tolerance,
                });
            }

            let outcome = ExchangeOutcome {
                from_backend,
                to_backend,
                from_receipt_amount,
                to_receipt_amount: deposited.receipt_amount,
                pool_value: redeemed.pool_amount,
            };
            info!(
                from = %from_backend,
                to = %to_backend,
                pool_value = %outcome.pool_value,
                "exchanged between backends"
            );
            state.emit(Event::Exchanged {
                from_backend,
                to_backend,
                from_receipt_amount,
                to_receipt_amount: outcome.to_receipt_amount,
                pool_value: outcome.pool_value,
            });
            Ok(outcome)
        })
    }

    /// Move roughly `pool_value` worth of capital from one backend to another.
    ///
    /// The receipt amount is sized by the source adapter's withdrawal preview.
    #[expect(clippy::too_many_arguments)]
    pub fn rebalance_by_value(
        &mut self,
        state: &mut ChainState,
        ledger: &CollateralLedger,
        caller: Address,
        from_backend: Address,
        to_backend: Address,
        pool_value: U256,
        min_to_amount: U256,
    ) -> Result<ExchangeOutcome> {
        self.access.ensure(Role::CollateralExchanger, caller)?;
        if pool_value.is_zero() {
            return Err(RouterError::ZeroAmount);
        }

        let from_index = self.withdraw_index(from_backend)?;
        let receipt_amount = self.backends[from_index]
            .adapter
            .preview_receipt_for_withdrawal(state, pool_value)
            .map_err(RouterError::adapter(from_backend))?;

        self.exchange_between_backends(
            state,
            ledger,
            caller,
            from_backend,
            to_backend,
            receipt_amount,
            min_to_amount,
        )
    }

    /// Deposit up to `max_amount` of the router's idle pooled balance into the
    /// default backend. Returns the amount swept.
    pub fn sweep_surplus(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        max_amount: U256,
    ) -> Result<U256> {
        self.guarded(state, |router, state| {
            router.access.ensure(Role::ConfigManager, caller)?;

            let amount = min(router.idle_balance(state), max_amount);
            if amount.is_zero() {
                return Ok(U256::ZERO);
            }

            let backend = router
                .default_backend
                .ok_or(RouterError::DefaultBackendNotSet)?;
            let index = router.deposit_index(backend)?;
            let leg = router.deposit_leg(state, index, amount)?;

            info!(%backend, %amount, "swept surplus");
            state.emit(Event::SurplusSwept {
                backend,
                amount,
                receipt_amount: leg.receipt_amount,
            });
            Ok(amount)
        })
    }

    /// Pull `pool_amount` from the share unit and deposit it into the default
    /// backend, with the same leg checks as any other deposit.
    pub fn deposit_to_default(
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
            let backend = router
                .default_backend
                .ok_or(RouterError::DefaultBackendNotSet)?;
            let index = router.deposit_index(backend)?;

            state.tokens.transfer_from(
                router.pool_token,
                router.address,
                caller,
                router.address,
                pool_amount,
            )?;

            let outcome = RouteOutcome::single(router.deposit_leg(state, index, pool_amount)?);
            info!(%backend, %pool_amount, "default backend deposit");
            state.emit(outcome.deposit_event(RoutingMode::DefaultBackend));
            Ok(outcome)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;
    use crate::router::BackendStatus;
    use crate::settings::{RouterSettings, MAX_SLIPPAGE_BPS};
    use crate::testing::{user, Deployment, DeploymentBuilder, Misbehavior, ADMIN, POOL_TOKEN};

    fn balanced(settings: RouterSettings) -> Deployment {
        let mut deployment = DeploymentBuilder::new()
            .with_router_settings(settings)
            .build()
            .unwrap();
        let alice = user(1);
        deployment.fund(alice, U256::from(2_000u64)).unwrap();
        deployment.deposit(alice, U256::from(1_000u64)).unwrap();
        deployment.deposit(alice, U256::from(1_000u64)).unwrap();
        deployment
    }

    fn exchange(
        deployment: &mut Deployment,
        amount: u64,
        min_to: u64,
    ) -> Result<ExchangeOutcome> {
        let (from, to) = (deployment.backend(0), deployment.backend(1));
        let (router, ledger) = deployment.vault.core_mut();
        router.exchange_between_backends(
            &mut deployment.state,
            ledger,
            ADMIN,
            from,
            to,
            U256::from(amount),
            U256::from(min_to),
        )
    }

    #[test]
    fn test_exchange_preserves_value() {
        let mut deployment = balanced(RouterSettings::default());
        let outcome = exchange(&mut deployment, 500, 500).unwrap();

        assert_eq!(outcome.to_receipt_amount, U256::from(500u64));
        assert_eq!(outcome.pool_value, U256::from(500u64));
        assert_eq!(deployment.custody(0), U256::from(500u64));
        assert_eq!(deployment.custody(1), U256::from(1_500u64));
        assert_eq!(deployment.net_managed_assets().unwrap(), U256::from(2_000u64));
        assert!(deployment
            .state
            .tokens
            .allowances_granted_by(deployment.vault.router().address())
            .is_empty());
    }

    #[test]
    fn test_exchange_minimum_output() {
        let mut deployment = balanced(RouterSettings::default());
        let before = deployment.state.clone();

        assert_eq!(
            exchange(&mut deployment, 500, 501),
            Err(RouterError::MinimumOutputNotMet {
                minimum: U256::from(501u64),
                actual: U256::from(500u64)
            })
        );
        assert_eq!(deployment.custody(0), U256::from(1_000u64));
        assert_eq!(deployment.state.events(), before.events());
    }

    #[test]
    fn test_exchange_value_mismatch() {
        let settings = RouterSettings::new()
            .with_dust_tolerance(U256::ZERO)
            .with_max_slippage_bps(MAX_SLIPPAGE_BPS);
        let mut deployment = balanced(settings);
        deployment
            .adapter(1)
            .set_behavior(Misbehavior::ShortDelivery { keep_bps: 995_000 });

        assert_eq!(
            exchange(&mut deployment, 500, 0),
            Err(RouterError::ExchangeValueMismatch {
                value_out: U256::from(500u64),
                value_in: U256::from(497u64),
                tolerance: U256::ZERO
            })
        );
        assert_eq!(deployment.custody(0), U256::from(1_000u64));
        assert_eq!(deployment.custody(1), U256::from(1_000u64));
    }

    #[test]
    fn test_exchange_rejects_same_backend_and_inactive_target() {
        let mut deployment = balanced(RouterSettings::default());
        let backend = deployment.backend(0);
        let (router, ledger) = deployment.vault.core_mut();
        assert_eq!(
            router.exchange_between_backends(
                &mut deployment.state,
                ledger,
                ADMIN,
                backend,
                backend,
                U256::from(1u64),
                U256::ZERO,
            ),
            Err(RouterError::SameBackend { backend })
        );

        let target = deployment.backend(1);
        let (router, ledger) = deployment.vault.core_mut();
        router
            .update_backend(
                &mut deployment.state,
                ADMIN,
                target,
                500_000,
                BackendStatus::WithdrawOnly,
            )
            .unwrap();
        assert_eq!(
            router.exchange_between_backends(
                &mut deployment.state,
                ledger,
                ADMIN,
                backend,
                target,
                U256::from(1u64),
                U256::ZERO,
            ),
            Err(RouterError::BackendNotActive {
                backend: target,
                status: BackendStatus::WithdrawOnly
            })
        );
    }

    #[test]
    fn test_rebalance_by_value() {
        let mut deployment = balanced(RouterSettings::default());
        let (from, to) = (deployment.backend(0), deployment.backend(1));
        let (router, ledger) = deployment.vault.core_mut();
        let outcome = router
            .rebalance_by_value(
                &mut deployment.state,
                ledger,
                ADMIN,
                from,
                to,
                U256::from(300u64),
                U256::ZERO,
            )
            .unwrap();

        assert_eq!(outcome.from_receipt_amount, U256::from(300u64));
        assert_eq!(deployment.custody(0), U256::from(700u64));
        assert_eq!(deployment.custody(1), U256::from(1_300u64));
    }

    #[test]
    fn test_sweep_surplus_into_default() {
        let mut deployment = balanced(RouterSettings::default());
        let router_address = deployment.vault.router().address();
        deployment
            .state
            .tokens
            .mint(POOL_TOKEN, router_address, U256::from(250u64))
            .unwrap();

        let router = deployment.vault.router_mut();
        let swept = router
            .sweep_surplus(&mut deployment.state, ADMIN, U256::from(100u64))
            .unwrap();
        assert_eq!(swept, U256::from(100u64));
        assert_eq!(router.idle_balance(&deployment.state), U256::from(150u64));

        let swept = router
            .sweep_surplus(&mut deployment.state, ADMIN, U256::MAX)
            .unwrap();
        assert_eq!(swept, U256::from(150u64));
        assert_eq!(deployment.custody(0), U256::from(1_250u64));
        assert_eq!(
            deployment.state.events().last(),
            Some(&Event::SurplusSwept {
                backend: deployment.backend(0),
                amount: U256::from(150u64),
                receipt_amount: U256::from(150u64)
            })
        );
    }

    #[test]
    fn test_sweep_nothing_idle() {
        let mut deployment = balanced(RouterSettings::default());
        let router = deployment.vault.router_mut();
        assert_eq!(
            router.sweep_surplus(&mut deployment.state, ADMIN, U256::MAX),
            Ok(U256::ZERO)
        );
    }

    #[test]
    fn test_default_deposit_is_share_unit_only() {
        let mut deployment = balanced(RouterSettings::default());
        let intruder = user(9);
        let (router, ledger) = deployment.vault.core_mut();
        assert_eq!(
            router.deposit_to_default(&mut deployment.state, ledger, intruder, U256::from(1u64)),
            Err(RouterError::Access(AccessError::Unauthorized {
                role: Role::PooledVault,
                caller: intruder
            }))
        );
        assert_eq!(deployment.custody(0), U256::from(1_000u64));
    }
}
