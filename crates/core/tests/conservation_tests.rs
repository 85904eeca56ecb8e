//! Value conservation, allowance hygiene, and valuation stability.

mod helpers;

use helpers::{
    assert_no_dangling_allowances, deployment, deposit_in_chunks, pool_supply, system_holdings,
    units,
};
use multivault_core::testing::{user, Misbehavior, ADMIN};
use multivault_core::{
    BackendConfig, BackendStatus, RouterError, SolverLeg, VaultError, ONE_HUNDRED_PERCENT_BPS,
};

#[test]
fn test_deposit_raises_managed_value_by_amount() {
    let mut deployment = deployment(3);
    let alice = user(1);
    deployment.fund(alice, units(200_000)).unwrap();

    for amount in [1u64, 7, 1_000, 123_456] {
        let before = deployment.net_managed_assets().unwrap();
        let balance = deployment.pool_balance(alice);

        deployment.deposit(alice, units(amount)).unwrap();

        assert_eq!(
            deployment.net_managed_assets().unwrap() - before,
            units(amount)
        );
        assert_eq!(balance - deployment.pool_balance(alice), units(amount));
        assert_eq!(
            system_holdings(&deployment) + deployment.pool_balance(alice),
            pool_supply(&deployment)
        );
    }
}

#[test]
fn test_withdraw_pays_exactly_requested() {
    let mut deployment = deployment(3);
    let alice = deposit_in_chunks(&mut deployment, 1, 10_000, 3);

    for amount in [1u64, 333, 2_500] {
        let before = deployment.pool_balance(alice);
        let managed = deployment.net_managed_assets().unwrap();

        deployment.withdraw(alice, units(amount)).unwrap();

        assert_eq!(deployment.pool_balance(alice) - before, units(amount));
        assert_eq!(
            managed - deployment.net_managed_assets().unwrap(),
            units(amount)
        );
    }
    assert_eq!(
        system_holdings(&deployment) + deployment.pool_balance(alice),
        pool_supply(&deployment)
    );
}

#[test]
fn test_conservation_with_yield() {
    let mut deployment = deployment(2);
    let alice = deposit_in_chunks(&mut deployment, 1, 1_000, 1);
    let backend = deployment.backend(0);
    deployment.state.accrue_yield(backend, units(100)).unwrap();

    // Backend shares are priced rounding down.
    assert_eq!(deployment.net_managed_assets().unwrap(), units(1_099));

    let shares = deployment.vault.balance_of(&deployment.state, alice);
    let paid = deployment.redeem(alice, shares).unwrap();
    assert_eq!(paid, units(1_098));
    assert_eq!(deployment.pool_balance(alice), units(1_098));
    assert_eq!(
        system_holdings(&deployment) + deployment.pool_balance(alice),
        pool_supply(&deployment)
    );
}

#[test]
fn test_allowances_cleared_after_success() {
    let mut deployment = deployment(3);
    let alice = deposit_in_chunks(&mut deployment, 1, 5_000, 3);
    deployment.withdraw(alice, units(1_234)).unwrap();

    let legs = [
        SolverLeg::new(deployment.backend(0), units(100)),
        SolverLeg::new(deployment.backend(2), units(50)),
    ];
    deployment
        .vault
        .solver_withdraw_assets(&mut deployment.state, alice, &legs, units(1_000), alice, alice)
        .unwrap();

    assert_no_dangling_allowances(&deployment);
}

#[test]
fn test_allowances_cleared_after_failure() {
    let mut deployment = deployment(2);
    let alice = deposit_in_chunks(&mut deployment, 1, 5_000, 2);

    deployment.adapter(0).set_behavior(Misbehavior::FailFatal);
    deployment.adapter(1).set_behavior(Misbehavior::FailFatal);
    deployment.fund(alice, units(500)).unwrap();

    assert!(deployment.deposit(alice, units(500)).is_err());
    assert!(deployment.withdraw(alice, units(500)).is_err());
    assert_no_dangling_allowances(&deployment);
}

#[test]
fn test_valuation_stable_after_dust_backend_removed() {
    let mut deployment = deployment(2);
    let alice = user(1);
    deployment.fund(alice, units(1_010)).unwrap();
    deployment.deposit(alice, units(1_000)).unwrap();
    deployment.deposit(alice, units(10)).unwrap();
    assert_eq!(deployment.custody(1), units(10));

    // Drop the second backend while it holds less than the dust tolerance.
    let remaining = BackendConfig {
        target_bps: ONE_HUNDRED_PERCENT_BPS,
        ..deployment.vault.router().backends()[0].clone()
    };
    let (router, ledger) = deployment.vault.core_mut();
    router
        .set_backend_configs(&mut deployment.state, ledger, ADMIN, vec![remaining])
        .unwrap();

    let first = deployment.net_managed_assets().unwrap();
    let second = deployment.net_managed_assets().unwrap();
    assert_eq!(first, units(1_000));
    assert_eq!(first, second);

    let shares = deployment.vault.balance_of(&deployment.state, alice);
    assert_eq!(deployment.redeem(alice, shares).unwrap(), units(1_000));
    assert_eq!(deployment.vault.total_supply(&deployment.state), units(0));

    // Re-entering an emptied vault must not revert on orphaned dust.
    let bob = user(2);
    deployment.fund(bob, units(1_000)).unwrap();
    assert_eq!(deployment.deposit(bob, units(1_000)).unwrap(), units(1_000));
    assert_eq!(deployment.redeem(bob, units(1_000)).unwrap(), units(1_000));

    // Orphaned receipts are no longer custody and can be rescued.
    let orphan = deployment.backend(1);
    deployment
        .vault
        .ledger()
        .rescue_token(&mut deployment.state, ADMIN, orphan, units(10), ADMIN)
        .unwrap();
    assert_eq!(deployment.custody(1), units(0));
}

#[test]
fn test_failed_withdraw_keeps_shares() {
    let mut deployment = deployment(2);
    let alice = deposit_in_chunks(&mut deployment, 1, 1_000, 2);
    deployment
        .adapter(0)
        .set_behavior(Misbehavior::ShortWithdrawal { keep_bps: 900_000 });
    deployment
        .adapter(1)
        .set_behavior(Misbehavior::ShortWithdrawal { keep_bps: 900_000 });

    let result = deployment.withdraw(alice, units(500));
    assert!(matches!(result, Err(VaultError::Router(_))));
    assert_eq!(
        deployment.vault.balance_of(&deployment.state, alice),
        units(2_000)
    );
    assert_eq!(deployment.custody(0), units(1_000));
    assert_eq!(deployment.custody(1), units(1_000));
}

#[test]
fn test_every_share_redeemable_after_suspension() {
    let mut deployment = deployment(2);
    let alice = user(1);
    deployment.fund(alice, units(1_010)).unwrap();
    deployment.deposit(alice, units(1_000)).unwrap();
    deployment.deposit(alice, units(10)).unwrap();
    let (b0, b1) = (deployment.backend(0), deployment.backend(1));
    assert_eq!(deployment.custody(1), units(10));

    let suspended: Vec<BackendConfig> = deployment
        .vault
        .router()
        .backends()
        .iter()
        .map(|config| match config.backend_id {
            id if id == b1 => BackendConfig {
                target_bps: 0,
                ..config.clone()
            }
            .with_status(BackendStatus::Suspended),
            _ => BackendConfig {
                target_bps: ONE_HUNDRED_PERCENT_BPS,
                ..config.clone()
            },
        })
        .collect();

    // Dust within tolerance still blocks suspension.
    let (router, ledger) = deployment.vault.core_mut();
    assert_eq!(
        router.set_backend_configs(&mut deployment.state, ledger, ADMIN, suspended.clone()),
        Err(RouterError::BackendNotEmpty {
            backend: b1,
            receipts: units(10)
        })
    );

    router
        .exchange_between_backends(&mut deployment.state, ledger, ADMIN, b1, b0, units(10), units(0))
        .unwrap();
    router
        .set_backend_configs(&mut deployment.state, ledger, ADMIN, suspended)
        .unwrap();

    let shares = deployment.vault.balance_of(&deployment.state, alice);
    assert_eq!(deployment.redeem(alice, shares).unwrap(), units(1_010));
    assert_eq!(deployment.net_managed_assets().unwrap(), units(0));
    assert_eq!(deployment.pool_balance(alice), units(1_010));
}
