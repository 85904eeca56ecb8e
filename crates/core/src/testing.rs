//! Test doubles and a one-call deployment for exercising the routing core.
//!
//! [`MisbehavingAdapter`] wraps an honest [`Erc4626Adapter`] and can be
//! switched at runtime into the failure modes the router must survive.
//! [`DeploymentBuilder`] wires a pooled token, N tokenized vaults, a ledger, a
//! router, and a share vault together with one admin holding every role.

use std::error::Error;
use std::sync::{Arc, Mutex, PoisonError};

use alloy_primitives::{Address, U256};

use crate::access::Role;
use crate::adapter::{AdapterHandle, Erc4626Adapter, StrategyAdapter};
use crate::backend::TokenizedVault;
use crate::error::{AdapterError, VaultError};
use crate::ledger::CollateralLedger;
use crate::math::{apply_bps, RoundingDirection, ONE_HUNDRED_PERCENT_BPS};
use crate::router::{BackendConfig, Router};
use crate::settings::{RouterSettings, VaultSettings};
use crate::state::ChainState;
use crate::vault::PooledVault;

pub type DeployResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Failure mode of a [`MisbehavingAdapter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Misbehavior {
    #[default]
    Honest,
    /// Deposits deliver only `keep_bps` of the receipt and report what was delivered
    ShortDelivery { keep_bps: u32 },
    /// Deposits deliver only `keep_bps` of the receipt but report the full amount
    InflatedReport { keep_bps: u32 },
    /// Withdrawals forward only `keep_bps` of the proceeds
    ShortWithdrawal { keep_bps: u32 },
    /// Deposits and withdrawals fail as if the backend were paused
    FailTransient,
    /// Deposits and withdrawals fail with an unclassified backend error
    FailFatal,
    /// Valuation fails loudly
    UnreachableValuation,
}

#[derive(Debug)]
pub struct MisbehavingAdapter {
    inner: Erc4626Adapter,
    behavior: Mutex<Misbehavior>,
}

impl MisbehavingAdapter {
    pub fn new(inner: Erc4626Adapter) -> Self {
        Self {
            inner,
            behavior: Mutex::new(Misbehavior::Honest),
        }
    }

    pub fn behavior(&self) -> Misbehavior {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_behavior(&self, behavior: Misbehavior) {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    fn forced_failure(&self) -> Option<AdapterError> {
        match self.behavior() {
            Misbehavior::FailTransient => Some(AdapterError::Paused {
                backend: self.inner.vault(),
            }),
            Misbehavior::FailFatal => Some(AdapterError::Backend("forced failure".to_string())),
            _ => None,
        }
    }

    /// Deposit into the vault with the adapter as receiver, then forward
    /// `keep_bps` of the shares to the ledger.
    fn skimmed_deposit(
        &self,
        state: &mut ChainState,
        caller: Address,
        pool_amount: U256,
        keep_bps: u32,
    ) -> Result<(U256, U256), AdapterError> {
        let (adapter, vault, pool) = (self.address(), self.inner.vault(), self.pool_token());
        state
            .tokens
            .transfer_from(pool, adapter, caller, adapter, pool_amount)?;
        let shares = state.with_exact_approval(pool, adapter, vault, pool_amount, |state| {
            state.vault_deposit(vault, adapter, pool_amount, adapter)
        })?;
        let delivered = apply_bps(shares, keep_bps, RoundingDirection::Down);
        state
            .tokens
            .transfer(vault, adapter, self.inner.ledger(), delivered)?;
        Ok((shares, delivered))
    }
}

impl StrategyAdapter for MisbehavingAdapter {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn pool_token(&self) -> Address {
        self.inner.pool_token()
    }

    fn strategy_share(&self) -> Address {
        self.inner.strategy_share()
    }

    fn deposit_into_strategy(
        &self,
        state: &mut ChainState,
        caller: Address,
        pool_amount: U256,
    ) -> Result<(Address, U256), AdapterError> {
        if let Some(error) = self.forced_failure() {
            return Err(error);
        }
        match self.behavior() {
            Misbehavior::ShortDelivery { keep_bps } => {
                let (_, delivered) = self.skimmed_deposit(state, caller, pool_amount, keep_bps)?;
                Ok((self.strategy_share(), delivered))
            }
            Misbehavior::InflatedReport { keep_bps } => {
                let (shares, _) = self.skimmed_deposit(state, caller, pool_amount, keep_bps)?;
                Ok((self.strategy_share(), shares))
            }
            _ => self.inner.deposit_into_strategy(state, caller, pool_amount),
        }
    }

    fn withdraw_from_strategy(
        &self,
        state: &mut ChainState,
        caller: Address,
        receipt_amount: U256,
    ) -> Result<U256, AdapterError> {
        if let Some(error) = self.forced_failure() {
            return Err(error);
        }
        let Misbehavior::ShortWithdrawal { keep_bps } = self.behavior() else {
            return self.inner.withdraw_from_strategy(state, caller, receipt_amount);
        };

        let (adapter, vault) = (self.address(), self.inner.vault());
        state
            .tokens
            .transfer_from(vault, adapter, caller, adapter, receipt_amount)?;
        let assets = state.vault_redeem(vault, adapter, receipt_amount, adapter, adapter)?;
        let forwarded = apply_bps(assets, keep_bps, RoundingDirection::Down);
        state
            .tokens
            .transfer(self.pool_token(), adapter, caller, forwarded)?;
        Ok(assets)
    }

    fn preview_deposit_into_strategy(
        &self,
        state: &ChainState,
        pool_amount: U256,
    ) -> Result<(Address, U256), AdapterError> {
        self.inner.preview_deposit_into_strategy(state, pool_amount)
    }

    fn preview_withdraw_from_strategy(
        &self,
        state: &ChainState,
        receipt_amount: U256,
    ) -> Result<U256, AdapterError> {
        self.inner.preview_withdraw_from_strategy(state, receipt_amount)
    }

    fn strategy_share_value_in_pool_units(
        &self,
        state: &ChainState,
        receipt: Address,
        receipt_amount: U256,
    ) -> Result<U256, AdapterError> {
        if self.behavior() == Misbehavior::UnreachableValuation {
            return Err(AdapterError::ValuationUnavailable {
                backend: self.inner.vault(),
            });
        }
        self.inner
            .strategy_share_value_in_pool_units(state, receipt, receipt_amount)
    }

    fn preview_receipt_for_withdrawal(
        &self,
        state: &ChainState,
        pool_amount: U256,
    ) -> Result<U256, AdapterError> {
        self.inner.preview_receipt_for_withdrawal(state, pool_amount)
    }

    fn preview_pool_for_receipt(
        &self,
        state: &ChainState,
        receipt_amount: U256,
    ) -> Result<U256, AdapterError> {
        self.inner.preview_pool_for_receipt(state, receipt_amount)
    }
}

/// Deterministic principal for a role tag and index.
pub fn principal(tag: u8, index: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[18] = tag;
    bytes[19] = index;
    Address::new(bytes)
}

pub const POOL_TOKEN: Address = Address::new([0xd5; 20]);
pub const ADMIN: Address = Address::new([0xad; 20]);
pub const LEDGER: Address = Address::new([0xc0; 20]);
pub const ROUTER: Address = Address::new([0x90; 20]);
pub const SHARE_VAULT: Address = Address::new([0x5a; 20]);

/// Receipt identity of the `index`-th backend vault.
pub fn backend_address(index: usize) -> Address {
    principal(0xb0, index as u8)
}

fn adapter_address(index: usize) -> Address {
    principal(0xa0, index as u8)
}

/// A depositor address.
pub fn user(index: u8) -> Address {
    principal(0x0e, index)
}

/// Equal targets summing to 100%, remainder on the first backend.
pub fn equal_targets(count: usize) -> Vec<u32> {
    if count == 0 {
        return Vec::new();
    }
    let share = ONE_HUNDRED_PERCENT_BPS / count as u32;
    let mut targets = vec![share; count];
    targets[0] += ONE_HUNDRED_PERCENT_BPS - share * count as u32;
    targets
}

#[derive(Debug, Clone)]
pub struct DeploymentBuilder {
    backend_count: usize,
    targets: Option<Vec<u32>>,
    router_settings: RouterSettings,
    vault_settings: VaultSettings,
}

impl Default for DeploymentBuilder {
    fn default() -> Self {
        Self {
            backend_count: 2,
            targets: None,
            router_settings: RouterSettings::default(),
            vault_settings: VaultSettings::default(),
        }
    }
}

impl DeploymentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backends(mut self, count: usize) -> Self {
        self.backend_count = count;
        self
    }

    pub fn with_targets(mut self, targets: Vec<u32>) -> Self {
        self.backend_count = targets.len();
        self.targets = Some(targets);
        self
    }

    pub fn with_router_settings(mut self, settings: RouterSettings) -> Self {
        self.router_settings = settings;
        self
    }

    pub fn with_vault_settings(mut self, settings: VaultSettings) -> Self {
        self.vault_settings = settings;
        self
    }

    pub fn build(self) -> DeployResult<Deployment> {
        let mut state = ChainState::new();

        let mut ledger = CollateralLedger::new(LEDGER, POOL_TOKEN, ADMIN);
        ledger.set_router(&mut state, ADMIN, ROUTER)?;

        let mut router =
            Router::new(ROUTER, POOL_TOKEN, LEDGER, ADMIN).with_settings(self.router_settings)?;
        for role in [Role::ConfigManager, Role::CollateralExchanger] {
            router.access_mut().grant_role(ADMIN, role, ADMIN)?;
        }
        router
            .access_mut()
            .grant_role(ADMIN, Role::PooledVault, SHARE_VAULT)?;

        let targets = self
            .targets
            .unwrap_or_else(|| equal_targets(self.backend_count));
        let mut adapters = Vec::with_capacity(targets.len());
        let mut configs = Vec::with_capacity(targets.len());
        for (index, target) in targets.iter().enumerate() {
            let backend = state.deploy_vault(TokenizedVault::new(backend_address(index), POOL_TOKEN))?;
            let adapter = Arc::new(MisbehavingAdapter::new(Erc4626Adapter::new(
                adapter_address(index),
                POOL_TOKEN,
                backend,
                LEDGER,
            )));
            let handle: AdapterHandle = adapter.clone();
            configs.push(BackendConfig::new(backend, handle, *target));
            adapters.push(adapter);
        }

        if !configs.is_empty() {
            router.set_backend_configs(&mut state, &mut ledger, ADMIN, configs)?;
            router.set_default_backend(&mut state, ADMIN, backend_address(0))?;
        }

        let mut vault = PooledVault::new(
            SHARE_VAULT,
            POOL_TOKEN,
            router,
            ledger,
            ADMIN,
            self.vault_settings,
        )?;
        vault
            .access_mut()
            .grant_role(ADMIN, Role::FeeManager, ADMIN)?;

        state.take_events();
        Ok(Deployment {
            state,
            vault,
            adapters,
        })
    }
}

/// A wired system plus handles to its adapters.
#[derive(Debug)]
pub struct Deployment {
    pub state: ChainState,
    pub vault: PooledVault,
    pub adapters: Vec<Arc<MisbehavingAdapter>>,
}

impl Deployment {
    pub fn backend(&self, index: usize) -> Address {
        backend_address(index)
    }

    pub fn adapter(&self, index: usize) -> &MisbehavingAdapter {
        &self.adapters[index]
    }

    /// Mint pooled units to `user` and approve the share vault for them.
    pub fn fund(&mut self, user: Address, amount: U256) -> DeployResult<()> {
        self.state.tokens.mint(POOL_TOKEN, user, amount)?;
        let allowance = self.state.tokens.allowance(POOL_TOKEN, user, SHARE_VAULT);
        self.state
            .tokens
            .approve(POOL_TOKEN, user, SHARE_VAULT, allowance + amount);
        Ok(())
    }

    pub fn deposit(&mut self, user: Address, amount: U256) -> Result<U256, VaultError> {
        self.vault.deposit(&mut self.state, user, amount, user)
    }

    pub fn withdraw(&mut self, user: Address, amount: U256) -> Result<U256, VaultError> {
        self.vault.withdraw(&mut self.state, user, amount, user, user)
    }

    pub fn redeem(&mut self, user: Address, shares: U256) -> Result<U256, VaultError> {
        self.vault.redeem(&mut self.state, user, shares, user, user)
    }

    pub fn pool_balance(&self, holder: Address) -> U256 {
        self.state.tokens.balance_of(POOL_TOKEN, holder)
    }

    /// Receipt balance the ledger holds for backend `index`.
    pub fn custody(&self, index: usize) -> U256 {
        self.state.tokens.balance_of(backend_address(index), LEDGER)
    }

    pub fn net_managed_assets(&self) -> Result<U256, VaultError> {
        self.vault.net_managed_assets(&self.state)
    }
}
