//! The adapter capability: conversion between the pooled unit and one
//! backend's receipt unit.
//!
//! Adapters are externally supplied and untrusted. The router never relies on
//! a value an adapter reports when it can measure a balance delta instead, and
//! it classifies adapter failures with [`AdapterError::is_transient`].

use std::fmt::Debug;
use std::sync::Arc;

use alloy_primitives::{Address, U256};

use crate::error::AdapterError;
use crate::state::ChainState;

/// Shared handle to a registered adapter.
pub type AdapterHandle = Arc<dyn StrategyAdapter>;

pub trait StrategyAdapter: Debug + Send + Sync {
    /// The adapter's own principal, the spender the router approves.
    fn address(&self) -> Address;

    /// The pooled unit this adapter consumes.
    fn pool_token(&self) -> Address;

    /// Receipt identity issued by the backend.
    fn strategy_share(&self) -> Address;

    /// Pull `pool_amount` from `caller` and deliver the receipt to the ledger.
    ///
    /// Returns the reported receipt identity and amount. Must fail rather than
    /// deliver a short amount.
    fn deposit_into_strategy(
        &self,
        state: &mut ChainState,
        caller: Address,
        pool_amount: U256,
    ) -> Result<(Address, U256), AdapterError>;

    /// Pull `receipt_amount` from `caller`, redeem it, and send the pooled
    /// proceeds to `caller`.
    fn withdraw_from_strategy(
        &self,
        state: &mut ChainState,
        caller: Address,
        receipt_amount: U256,
    ) -> Result<U256, AdapterError>;

    fn preview_deposit_into_strategy(
        &self,
        state: &ChainState,
        pool_amount: U256,
    ) -> Result<(Address, U256), AdapterError>;

    fn preview_withdraw_from_strategy(
        &self,
        state: &ChainState,
        receipt_amount: U256,
    ) -> Result<U256, AdapterError>;

    /// Value of `receipt_amount` of `receipt` in pooled units.
    ///
    /// Fails with [`AdapterError::ValuationUnavailable`] rather than guessing.
    fn strategy_share_value_in_pool_units(
        &self,
        state: &ChainState,
        receipt: Address,
        receipt_amount: U256,
    ) -> Result<U256, AdapterError>;

    /// Receipt needed to withdraw at least `pool_amount` (rounded up).
    fn preview_receipt_for_withdrawal(
        &self,
        state: &ChainState,
        pool_amount: U256,
    ) -> Result<U256, AdapterError>;

    /// Pooled units needed to mint at least `receipt_amount` (rounded up).
    fn preview_pool_for_receipt(
        &self,
        state: &ChainState,
        receipt_amount: U256,
    ) -> Result<U256, AdapterError>;
}

/// Adapter over a [`TokenizedVault`](crate::backend::TokenizedVault).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc4626Adapter {
    address: Address,
    pool_token: Address,
    vault: Address,
    ledger: Address,
}

impl Erc4626Adapter {
    /// Deposits mint receipts straight to `ledger`.
    pub fn new(address: Address, pool_token: Address, vault: Address, ledger: Address) -> Self {
        Self {
            address,
            pool_token,
            vault,
            ledger,
        }
    }

    pub fn into_handle(self) -> AdapterHandle {
        Arc::new(self)
    }

    pub fn vault(&self) -> Address {
        self.vault
    }

    pub fn ledger(&self) -> Address {
        self.ledger
    }
}

impl StrategyAdapter for Erc4626Adapter {
    fn address(&self) -> Address {
        self.address
    }

    fn pool_token(&self) -> Address {
        self.pool_token
    }

    fn strategy_share(&self) -> Address {
        self.vault
    }

    fn deposit_into_strategy(
        &self,
        state: &mut ChainState,
        caller: Address,
        pool_amount: U256,
    ) -> Result<(Address, U256), AdapterError> {
        if pool_amount.is_zero() {
            return Err(AdapterError::ZeroAmount);
        }

        state.tokens.transfer_from(
            self.pool_token,
            self.address,
            caller,
            self.address,
            pool_amount,
        )?;

        let (vault, adapter, ledger) = (self.vault, self.address, self.ledger);
        let shares =
            state.with_exact_approval(self.pool_token, adapter, vault, pool_amount, |state| {
                state.vault_deposit(vault, adapter, pool_amount, ledger)
            })?;

        Ok((self.vault, shares))
    }

    fn withdraw_from_strategy(
        &self,
        state: &mut ChainState,
        caller: Address,
        receipt_amount: U256,
    ) -> Result<U256, AdapterError> {
        if receipt_amount.is_zero() {
            return Err(AdapterError::ZeroAmount);
        }

        state
            .tokens
            .transfer_from(self.vault, self.address, caller, self.address, receipt_amount)?;
        let assets =
            state.vault_redeem(self.vault, self.address, receipt_amount, caller, self.address)?;
        Ok(assets)
    }

    fn preview_deposit_into_strategy(
        &self,
        state: &ChainState,
        pool_amount: U256,
    ) -> Result<(Address, U256), AdapterError> {
        let vault = state.vault(self.vault)?;
        Ok((self.vault, vault.preview_deposit(&state.tokens, pool_amount)))
    }

    fn preview_withdraw_from_strategy(
        &self,
        state: &ChainState,
        receipt_amount: U256,
    ) -> Result<U256, AdapterError> {
        let vault = state.vault(self.vault)?;
        Ok(vault.preview_redeem(&state.tokens, receipt_amount))
    }

    fn strategy_share_value_in_pool_units(
        &self,
        state: &ChainState,
        receipt: Address,
        receipt_amount: U256,
    ) -> Result<U256, AdapterError> {
        if receipt != self.vault {
            return Err(AdapterError::ReceiptMismatch {
                expected: self.vault,
                actual: receipt,
            });
        }
        let vault = state.vault(self.vault)?;
        Ok(vault.share_value(&state.tokens, receipt_amount)?)
    }

    fn preview_receipt_for_withdrawal(
        &self,
        state: &ChainState,
        pool_amount: U256,
    ) -> Result<U256, AdapterError> {
        let vault = state.vault(self.vault)?;
        Ok(vault.preview_withdraw(&state.tokens, pool_amount))
    }

    fn preview_pool_for_receipt(
        &self,
        state: &ChainState,
        receipt_amount: U256,
    ) -> Result<U256, AdapterError> {
        let vault = state.vault(self.vault)?;
        Ok(vault.preview_mint(&state.tokens, receipt_amount))
    }
}
