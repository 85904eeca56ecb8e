//! The pooled share unit.
//!
//! [`PooledVault`] issues one fungible share against capital spread across
//! every backend the router manages. It follows ERC-4626 share accounting, with
//! three differences that matter for correctness:
//!
//! - **Net managed assets**: share price derives from the ledger's gross value
//!   minus the router's outstanding shortfall, floored at zero, so depositors
//!   never buy into a position that ignores a recorded loss.
//! - **Withdrawal fee**: charged once on the gross amount pulled from the
//!   router. `preview_withdraw(net)` burns exactly the shares whose execution
//!   pays `net` to the receiver.
//! - **Router replacement**: [`PooledVault::migrate_core`] copies the shortfall
//!   onto the incoming router in the same step as the swap.
//!
//! Conversions add one virtual asset and `10^decimals_offset` virtual shares,
//! so a zero-supply vault with leftover value never divides by zero.

use alloy_primitives::{Address, U256};
use tracing::info;

use crate::access::{AccessControl, Role};
use crate::error::VaultError;
use crate::events::Event;
use crate::ledger::CollateralLedger;
use crate::math::{
    apply_bps, mul_div, mul_div_up, pow10, zero_floor_sub, RoundingDirection,
    ONE_HUNDRED_PERCENT_BPS,
};
use crate::router::{Router, SolverLeg};
use crate::settings::{VaultSettings, MAX_REINVEST_INCENTIVE_BPS, MAX_WITHDRAWAL_FEE_BPS};
use crate::state::{self, ChainState};

/// Virtual assets added to share conversions (1)
pub const SHARE_VIRTUAL_ASSETS: U256 = U256::from_limbs([1, 0, 0, 0]);

type Result<T> = std::result::Result<T, VaultError>;

#[derive(Debug, Clone)]
pub struct PooledVault {
    address: Address,
    asset: Address,
    router: Router,
    ledger: CollateralLedger,
    settings: VaultSettings,
    access: AccessControl,
    entered: bool,
}

impl PooledVault {
    /// Wire a share unit to an existing router and ledger.
    ///
    /// The share token identity is `address`; `admin` holds the admin role.
    pub fn new(
        address: Address,
        asset: Address,
        router: Router,
        ledger: CollateralLedger,
        admin: Address,
        settings: VaultSettings,
    ) -> Result<Self> {
        Self::check_core(address, asset, &router, &ledger)?;
        if settings.withdrawal_fee_bps > MAX_WITHDRAWAL_FEE_BPS {
            return Err(VaultError::FeeTooHigh {
                bps: settings.withdrawal_fee_bps,
                max: MAX_WITHDRAWAL_FEE_BPS,
            });
        }
        if settings.reinvest_incentive_bps > MAX_REINVEST_INCENTIVE_BPS {
            return Err(VaultError::IncentiveTooHigh {
                bps: settings.reinvest_incentive_bps,
                max: MAX_REINVEST_INCENTIVE_BPS,
            });
        }

        Ok(Self {
            address,
            asset,
            router,
            ledger,
            settings,
            access: AccessControl::with_admin(admin),
            entered: false,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn asset(&self) -> Address {
        self.asset
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub fn ledger(&self) -> &CollateralLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut CollateralLedger {
        &mut self.ledger
    }

    /// Router and ledger together, for configuration calls that need both.
    pub fn core_mut(&mut self) -> (&mut Router, &mut CollateralLedger) {
        (&mut self.router, &mut self.ledger)
    }

    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn access_mut(&mut self) -> &mut AccessControl {
        &mut self.access
    }

    pub fn withdrawal_fee_bps(&self) -> u32 {
        self.settings.withdrawal_fee_bps
    }

    pub fn total_supply(&self, state: &ChainState) -> U256 {
        state.tokens.total_supply(self.address)
    }

    pub fn balance_of(&self, state: &ChainState, owner: Address) -> U256 {
        state.tokens.balance_of(self.address, owner)
    }

    /// Withdrawal fees held by the vault, awaiting reinvestment.
    pub fn accumulated_fees(&self, state: &ChainState) -> U256 {
        state.tokens.balance_of(self.asset, self.address)
    }

    pub fn gross_managed_assets(&self, state: &ChainState) -> Result<U256> {
        Ok(self.router.total_managed_value(state, &self.ledger)?)
    }

    /// Ledger value minus outstanding shortfall, floored at zero.
    pub fn net_managed_assets(&self, state: &ChainState) -> Result<U256> {
        let gross = self.gross_managed_assets(state)?;
        Ok(zero_floor_sub(gross, self.router.shortfall()))
    }

    pub fn total_assets(&self, state: &ChainState) -> Result<U256> {
        self.net_managed_assets(state)
    }

    pub fn to_shares(
        &self,
        state: &ChainState,
        assets: U256,
        rounding: RoundingDirection,
    ) -> Result<U256> {
        let supply = self.total_supply(state);
        let managed = self.net_managed_assets(state)?;
        Ok(self.shares_at(supply, managed, assets, rounding))
    }

    pub fn to_assets(
        &self,
        state: &ChainState,
        shares: U256,
        rounding: RoundingDirection,
    ) -> Result<U256> {
        let supply = self.total_supply(state);
        let managed = self.net_managed_assets(state)?;
        Ok(mul_div(
            shares,
            managed + SHARE_VIRTUAL_ASSETS,
            supply + self.virtual_shares(),
            rounding,
        ))
    }

    pub fn convert_to_shares(&self, state: &ChainState, assets: U256) -> Result<U256> {
        self.to_shares(state, assets, RoundingDirection::Down)
    }

    pub fn convert_to_assets(&self, state: &ChainState, shares: U256) -> Result<U256> {
        self.to_assets(state, shares, RoundingDirection::Down)
    }

    pub fn preview_deposit(&self, state: &ChainState, assets: U256) -> Result<U256> {
        self.to_shares(state, assets, RoundingDirection::Down)
    }

    pub fn preview_mint(&self, state: &ChainState, shares: U256) -> Result<U256> {
        self.to_assets(state, shares, RoundingDirection::Up)
    }

    /// Shares burned to pay exactly `assets` to the receiver, fee included.
    pub fn preview_withdraw(&self, state: &ChainState, assets: U256) -> Result<U256> {
        let gross = self.gross_for_net(assets);
        self.to_shares(state, gross, RoundingDirection::Up)
    }

    /// Assets paid to the receiver for `shares`, net of the fee.
    pub fn preview_redeem(&self, state: &ChainState, shares: U256) -> Result<U256> {
        let gross = self.to_assets(state, shares, RoundingDirection::Down)?;
        Ok(gross - self.fee_on_gross(gross))
    }

    pub fn max_withdraw(&self, state: &ChainState, owner: Address) -> Result<U256> {
        self.preview_redeem(state, self.balance_of(state, owner))
    }

    pub fn max_redeem(&self, state: &ChainState, owner: Address) -> U256 {
        self.balance_of(state, owner)
    }

    /// Fee withheld from a gross withdrawal (rounded up).
    pub fn fee_on_gross(&self, gross: U256) -> U256 {
        apply_bps(gross, self.settings.withdrawal_fee_bps, RoundingDirection::Up)
    }

    /// Smallest gross amount that leaves `net` after the fee.
    pub fn gross_for_net(&self, net: U256) -> U256 {
        let keep = ONE_HUNDRED_PERCENT_BPS - self.settings.withdrawal_fee_bps;
        mul_div_up(net, U256::from(ONE_HUNDRED_PERCENT_BPS), U256::from(keep))
    }

    /// Deposit `assets` from `caller` and mint shares to `receiver`.
    pub fn deposit(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        assets: U256,
        receiver: Address,
    ) -> Result<U256> {
        self.guarded(state, |vault, state| {
            if assets.is_zero() {
                return Err(VaultError::ZeroAmount);
            }
            let shares = vault.preview_deposit(state, assets)?;
            if shares.is_zero() {
                return Err(VaultError::ZeroShares);
            }

            vault.execute_deposit(state, caller, assets, shares, receiver)?;
            Ok(shares)
        })
    }

    /// Mint exactly `shares` to `receiver`, pulling the assets they cost.
    pub fn mint(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        shares: U256,
        receiver: Address,
    ) -> Result<U256> {
        self.guarded(state, |vault, state| {
            if shares.is_zero() {
                return Err(VaultError::ZeroAmount);
            }
            let assets = vault.preview_mint(state, shares)?;
            if assets.is_zero() {
                return Err(VaultError::ZeroAssets);
            }

            vault.execute_deposit(state, caller, assets, shares, receiver)?;
            Ok(assets)
        })
    }

    /// Pay exactly `assets` to `receiver`, burning `owner`'s shares.
    pub fn withdraw(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        assets: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<U256> {
        self.guarded(state, |vault, state| {
            if assets.is_zero() {
                return Err(VaultError::ZeroAmount);
            }
            let gross = vault.gross_for_net(assets);
            let shares = vault.to_shares(state, gross, RoundingDirection::Up)?;
            if shares.is_zero() {
                return Err(VaultError::ZeroShares);
            }

            vault.burn_shares(state, caller, owner, shares)?;
            let address = vault.address;
            vault
                .router
                .auto_withdraw(state, &vault.ledger, address, gross, address, owner)?;
            vault.settle_withdrawal(state, caller, receiver, owner, gross, assets, shares)?;
            Ok(shares)
        })
    }

    /// Burn `shares` from `owner` and pay the net proceeds to `receiver`.
    pub fn redeem(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        shares: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<U256> {
        self.guarded(state, |vault, state| {
            if shares.is_zero() {
                return Err(VaultError::ZeroAmount);
            }
            let gross = vault.to_assets(state, shares, RoundingDirection::Down)?;
            let net = gross - vault.fee_on_gross(gross);
            if net.is_zero() {
                return Err(VaultError::ZeroAssets);
            }

            vault.burn_shares(state, caller, owner, shares)?;
            let address = vault.address;
            vault
                .router
                .auto_withdraw(state, &vault.ledger, address, gross, address, owner)?;
            vault.settle_withdrawal(state, caller, receiver, owner, gross, net, shares)?;
            Ok(net)
        })
    }

    /// Deposit the given pooled amounts into the given backends and mint at
    /// least `min_shares`.
    pub fn solver_deposit_assets(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        legs: &[SolverLeg],
        min_shares: U256,
        receiver: Address,
    ) -> Result<U256> {
        self.guarded(state, |vault, state| {
            let assets = SolverLeg::total(legs)?;
            if assets.is_zero() {
                return Err(VaultError::ZeroAmount);
            }
            let shares = vault.preview_deposit(state, assets)?;
            vault.check_minimum(shares, min_shares)?;

            vault.pull_assets(state, caller, assets)?;
            let (address, asset, spender) = (vault.address, vault.asset, vault.router.address());
            let (router, ledger) = (&mut vault.router, &vault.ledger);
            state.with_exact_approval(asset, address, spender, assets, |state| {
                router.solver_deposit_pool(state, ledger, address, legs)
            })?;
            vault.mint_shares(state, caller, receiver, assets, shares)?;
            Ok(shares)
        })
    }

    /// Mint the given receipt amounts into the given backends, charging the
    /// pooled units they cost, and mint at least `min_shares`.
    ///
    /// Returns `(assets, shares)`.
    pub fn solver_deposit_shares(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        legs: &[SolverLeg],
        min_shares: U256,
        receiver: Address,
    ) -> Result<(U256, U256)> {
        self.guarded(state, |vault, state| {
            let assets = vault.router.preview_solver_deposit_receipts(state, legs)?;
            if assets.is_zero() {
                return Err(VaultError::ZeroAmount);
            }
            let shares = vault.preview_deposit(state, assets)?;
            vault.check_minimum(shares, min_shares)?;

            vault.pull_assets(state, caller, assets)?;
            let (address, asset, spender) = (vault.address, vault.asset, vault.router.address());
            let (router, ledger) = (&mut vault.router, &vault.ledger);
            state.with_exact_approval(asset, address, spender, assets, |state| {
                router.solver_deposit_receipts(state, ledger, address, legs)
            })?;
            vault.mint_shares(state, caller, receiver, assets, shares)?;
            Ok((assets, shares))
        })
    }

    /// Withdraw the given gross pooled amounts from the given backends,
    /// burning at most `max_shares`. The receiver gets the total net of fee.
    ///
    /// Returns the shares burned.
    pub fn solver_withdraw_assets(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        legs: &[SolverLeg],
        max_shares: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<U256> {
        self.guarded(state, |vault, state| {
            let gross = SolverLeg::total(legs)?;
            if gross.is_zero() {
                return Err(VaultError::ZeroAmount);
            }
            let shares = vault.to_shares(state, gross, RoundingDirection::Up)?;
            vault.check_maximum(shares, max_shares)?;
            let net = gross - vault.fee_on_gross(gross);
            if net.is_zero() {
                return Err(VaultError::ZeroAssets);
            }

            vault.burn_shares(state, caller, owner, shares)?;
            let (address, ledger) = (vault.address, &vault.ledger);
            vault.router.solver_withdraw_pool(state, ledger, address, legs, address, owner)?;
            vault.settle_withdrawal(state, caller, receiver, owner, gross, net, shares)?;
            Ok(shares)
        })
    }

    /// Redeem the given receipt amounts from the given backends, burning at
    /// most `max_shares` priced at the pre-call share rate.
    ///
    /// Returns `(net assets paid, shares burned)`.
    pub fn solver_withdraw_shares(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        legs: &[SolverLeg],
        max_shares: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<(U256, U256)> {
        self.guarded(state, |vault, state| {
            let supply = vault.total_supply(state);
            let managed = vault.net_managed_assets(state)?;

            let (address, ledger) = (vault.address, &vault.ledger);
            let outcome =
                vault
                    .router
                    .solver_withdraw_receipts(state, ledger, address, legs, address, owner)?;
            let gross = outcome.total_pool_amount;

            let shares = vault.shares_at(supply, managed, gross, RoundingDirection::Up);
            vault.check_maximum(shares, max_shares)?;
            let net = gross - vault.fee_on_gross(gross);
            if net.is_zero() {
                return Err(VaultError::ZeroAssets);
            }

            vault.burn_shares(state, caller, owner, shares)?;
            vault.settle_withdrawal(state, caller, receiver, owner, gross, net, shares)?;
            Ok((net, shares))
        })
    }

    /// Pay the caller an incentive out of accumulated fees and deposit the
    /// rest into the router's default backend without minting shares.
    ///
    /// Refused while a shortfall is outstanding. Returns the amount reinvested.
    pub fn reinvest_fees(&mut self, state: &mut ChainState, caller: Address) -> Result<U256> {
        self.guarded(state, |vault, state| {
            let shortfall = vault.router.shortfall();
            if !shortfall.is_zero() {
                return Err(VaultError::ShortfallOutstanding { shortfall });
            }

            let fees = vault.accumulated_fees(state);
            if fees.is_zero() {
                return Ok(U256::ZERO);
            }

            let incentive = apply_bps(
                fees,
                vault.settings.reinvest_incentive_bps,
                RoundingDirection::Down,
            );
            let amount = fees - incentive;
            if !incentive.is_zero() {
                state
                    .tokens
                    .transfer(vault.asset, vault.address, caller, incentive)?;
            }
            if !amount.is_zero() {
                let (address, asset, spender) =
                    (vault.address, vault.asset, vault.router.address());
                let (router, ledger) = (&mut vault.router, &vault.ledger);
                state.with_exact_approval(asset, address, spender, amount, |state| {
                    router.deposit_to_default(state, ledger, address, amount)
                })?;
            }

            info!(%caller, %amount, %incentive, "fees reinvested");
            state.emit(Event::FeesReinvested {
                caller,
                amount,
                incentive,
            });
            Ok(amount)
        })
    }

    pub fn set_withdrawal_fee(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        bps: u32,
    ) -> Result<()> {
        self.access.ensure(Role::FeeManager, caller)?;
        if bps > MAX_WITHDRAWAL_FEE_BPS {
            return Err(VaultError::FeeTooHigh {
                bps,
                max: MAX_WITHDRAWAL_FEE_BPS,
            });
        }
        self.settings.withdrawal_fee_bps = bps;
        info!(bps, "withdrawal fee set");
        state.emit(Event::WithdrawalFeeSet { bps });
        Ok(())
    }

    pub fn set_reinvest_incentive(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        bps: u32,
    ) -> Result<()> {
        self.access.ensure(Role::Admin, caller)?;
        if bps > MAX_REINVEST_INCENTIVE_BPS {
            return Err(VaultError::IncentiveTooHigh {
                bps,
                max: MAX_REINVEST_INCENTIVE_BPS,
            });
        }
        self.settings.reinvest_incentive_bps = bps;
        info!(bps, "reinvest incentive set");
        state.emit(Event::ReinvestIncentiveSet { bps });
        Ok(())
    }

    /// Swap in a new router and ledger, carrying the shortfall across.
    ///
    /// The new ledger must already recognize the new router. Returns the
    /// outgoing pair.
    pub fn migrate_core(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        mut router: Router,
        ledger: CollateralLedger,
    ) -> Result<(Router, CollateralLedger)> {
        if self.entered {
            return Err(VaultError::Reentrancy);
        }
        self.access.ensure(Role::Admin, caller)?;
        if ledger.router(state) != Some(router.address()) {
            return Err(VaultError::RouterNotRecognized {
                router: router.address(),
                ledger_router: ledger.router(state),
            });
        }
        Self::check_core(self.address, self.asset, &router, &ledger)?;

        router.set_shortfall_on_migration(state, self.router.shortfall());
        let previous_router = std::mem::replace(&mut self.router, router);
        let previous_ledger = std::mem::replace(&mut self.ledger, ledger);

        info!(
            previous = %previous_router.address(),
            router = %self.router.address(),
            shortfall = %self.router.shortfall(),
            "core migrated"
        );
        state.emit(Event::CoreMigrated {
            previous_router: previous_router.address(),
            router: self.router.address(),
            previous_ledger: previous_ledger.address(),
            ledger: self.ledger.address(),
        });
        Ok((previous_router, previous_ledger))
    }

    fn check_core(
        address: Address,
        asset: Address,
        router: &Router,
        ledger: &CollateralLedger,
    ) -> Result<()> {
        if router.ledger() != ledger.address() {
            return Err(VaultError::LedgerMismatch {
                expected: router.ledger(),
                actual: ledger.address(),
            });
        }
        for actual in [router.pool_token(), ledger.pool_token()] {
            if actual != asset {
                return Err(VaultError::AssetMismatch {
                    expected: asset,
                    actual,
                });
            }
        }
        if !router.access().has_role(Role::PooledVault, address) {
            return Err(VaultError::VaultNotAuthorized {
                router: router.address(),
            });
        }
        Ok(())
    }

    fn virtual_shares(&self) -> U256 {
        pow10(self.settings.decimals_offset)
    }

    fn shares_at(
        &self,
        supply: U256,
        managed: U256,
        assets: U256,
        rounding: RoundingDirection,
    ) -> U256 {
        mul_div(
            assets,
            supply + self.virtual_shares(),
            managed + SHARE_VIRTUAL_ASSETS,
            rounding,
        )
    }

    fn check_minimum(&self, shares: U256, min_shares: U256) -> Result<()> {
        if shares.is_zero() {
            return Err(VaultError::ZeroShares);
        }
        if shares < min_shares {
            return Err(VaultError::SharesBelowMinimum {
                shares,
                min: min_shares,
            });
        }
        Ok(())
    }

    fn check_maximum(&self, shares: U256, max_shares: U256) -> Result<()> {
        if shares.is_zero() {
            return Err(VaultError::ZeroShares);
        }
        if shares > max_shares {
            return Err(VaultError::SharesAboveMaximum {
                shares,
                max: max_shares,
            });
        }
        Ok(())
    }

    fn pull_assets(&self, state: &mut ChainState, caller: Address, assets: U256) -> Result<()> {
        state
            .tokens
            .transfer_from(self.asset, self.address, caller, self.address, assets)?;
        Ok(())
    }

    fn execute_deposit(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        assets: U256,
        shares: U256,
        receiver: Address,
    ) -> Result<()> {
        self.pull_assets(state, caller, assets)?;
        self.route_deposit(state, assets)?;
        self.mint_shares(state, caller, receiver, assets, shares)
    }

    /// Hand `assets` held by the vault to the router in Auto mode.
    fn route_deposit(&mut self, state: &mut ChainState, assets: U256) -> Result<()> {
        let (address, asset, spender) = (self.address, self.asset, self.router.address());
        let (router, ledger) = (&mut self.router, &self.ledger);
        state.with_exact_approval(asset, address, spender, assets, |state| {
            router.auto_deposit(state, ledger, address, assets)
        })?;
        Ok(())
    }

    fn mint_shares(
        &self,
        state: &mut ChainState,
        caller: Address,
        receiver: Address,
        assets: U256,
        shares: U256,
    ) -> Result<()> {
        state.tokens.mint(self.address, receiver, shares)?;
        info!(%caller, %receiver, %assets, %shares, "deposit");
        state.emit(Event::Deposit {
            caller,
            owner: receiver,
            assets,
            shares,
        });
        Ok(())
    }

    fn burn_shares(
        &self,
        state: &mut ChainState,
        caller: Address,
        owner: Address,
        shares: U256,
    ) -> Result<()> {
        let balance = self.balance_of(state, owner);
        if shares > balance {
            return Err(VaultError::SharesAboveMaximum {
                shares,
                max: balance,
            });
        }
        if caller != owner {
            state
                .tokens
                .spend_allowance(self.address, owner, caller, shares)?;
        }
        state.tokens.burn(self.address, owner, shares)?;
        Ok(())
    }

    /// Pay `net` out of the `gross` the router delivered, keeping the fee.
    #[expect(clippy::too_many_arguments)]
    fn settle_withdrawal(
        &self,
        state: &mut ChainState,
        caller: Address,
        receiver: Address,
        owner: Address,
        gross: U256,
        net: U256,
        shares: U256,
    ) -> Result<()> {
        state
            .tokens
            .transfer(self.asset, self.address, receiver, net)?;
        let fee = gross - net;
        info!(%caller, %receiver, %owner, assets = %net, %shares, %fee, "withdraw");
        state.emit(Event::Withdraw {
            caller,
            receiver,
            owner,
            assets: net,
            shares,
            fee,
        });
        Ok(())
    }

    fn guarded<T>(
        &mut self,
        state: &mut ChainState,
        op: impl FnOnce(&mut Self, &mut ChainState) -> Result<T>,
    ) -> Result<T> {
        if self.entered {
            return Err(VaultError::Reentrancy);
        }
        self.entered = true;
        let result = state::atomically(self, state, op);
        self.entered = false;
        result
    }
}
