//! Withdrawal fees are charged once, on the gross amount.

mod helpers;

use alloy_primitives::U256;
use helpers::{custody, deployment_with_fee, deposit_in_chunks, last_routed_backends, units};
use multivault_core::testing::user;
use multivault_core::{Event, RoutingMode, SolverLeg};

const FEES: [u32; 3] = [0, 1_000, 10_000];
const AMOUNTS: [u64; 4] = [1, 2, 999, 250_000];

#[test]
fn test_withdraw_charges_fee_once() {
    for fee in FEES {
        for amount in AMOUNTS {
            let mut deployment = deployment_with_fee(2, fee);
            let alice = deposit_in_chunks(&mut deployment, 1, 500_000, 2);

            let gross = deployment.vault.gross_for_net(units(amount));
            let preview = deployment
                .vault
                .preview_withdraw(&deployment.state, units(amount))
                .unwrap();
            let managed = deployment
                .vault
                .gross_managed_assets(&deployment.state)
                .unwrap();

            let burned = deployment.withdraw(alice, units(amount)).unwrap();

            assert_eq!(burned, preview, "fee {fee} amount {amount}");
            assert_eq!(deployment.pool_balance(alice), units(amount));
            assert_eq!(
                deployment.vault.accumulated_fees(&deployment.state),
                gross - units(amount),
                "fee {fee} amount {amount}"
            );
            assert_eq!(
                managed
                    - deployment
                        .vault
                        .gross_managed_assets(&deployment.state)
                        .unwrap(),
                gross
            );

            let charged: Vec<_> = deployment
                .state
                .events()
                .iter()
                .filter_map(|event| match event {
                    Event::Withdraw { fee: withheld, .. } => Some(*withheld),
                    _ => None,
                })
                .collect();
            assert_eq!(charged, vec![gross - units(amount)]);
        }
    }
}

#[test]
fn test_redeem_matches_preview() {
    for fee in FEES {
        for amount in AMOUNTS {
            let mut deployment = deployment_with_fee(2, fee);
            let alice = deposit_in_chunks(&mut deployment, 1, 500_000, 2);

            let shares = units(amount);
            let preview = deployment
                .vault
                .preview_redeem(&deployment.state, shares)
                .unwrap();
            if preview.is_zero() {
                assert!(deployment.redeem(alice, shares).is_err());
                continue;
            }

            let paid = deployment.redeem(alice, shares).unwrap();
            assert_eq!(paid, preview, "fee {fee} shares {amount}");
            assert_eq!(deployment.pool_balance(alice), preview);
            assert_eq!(
                deployment.vault.accumulated_fees(&deployment.state),
                deployment.vault.fee_on_gross(shares),
            );
        }
    }
}

#[test]
fn test_zero_fee_keeps_nothing() {
    let mut deployment = deployment_with_fee(2, 0);
    let alice = deposit_in_chunks(&mut deployment, 1, 1_000, 1);
    deployment.withdraw(alice, units(400)).unwrap();
    deployment.redeem(alice, units(600)).unwrap();

    assert_eq!(deployment.vault.accumulated_fees(&deployment.state), units(0));
    assert_eq!(deployment.pool_balance(alice), units(1_000));
}

#[test]
fn test_reinvested_fees_go_to_default_backend() {
    let mut deployment = deployment_with_fee(2, 10_000);
    let alice = deposit_in_chunks(&mut deployment, 1, 3_000, 2);
    assert_eq!(custody(&deployment), vec![units(3_000), units(3_000)]);

    // Draining the second backend leaves it the most underweight.
    let legs = [SolverLeg::new(deployment.backend(1), units(2_000))];
    deployment
        .vault
        .solver_withdraw_assets(&mut deployment.state, alice, &legs, U256::MAX, alice, alice)
        .unwrap();
    assert_eq!(custody(&deployment), vec![units(3_000), units(1_000)]);
    assert_eq!(deployment.vault.accumulated_fees(&deployment.state), units(20));

    let reinvested = deployment
        .vault
        .reinvest_fees(&mut deployment.state, user(2))
        .unwrap();

    assert_eq!(reinvested, units(20));
    assert_eq!(custody(&deployment), vec![units(3_020), units(1_000)]);
    let (mode, backends) = last_routed_backends(&deployment);
    assert_eq!(mode, RoutingMode::DefaultBackend);
    assert_eq!(backends, vec![deployment.backend(0)]);
}
