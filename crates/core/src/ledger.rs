//! Custody of every backend receipt.
//!
//! The ledger is the single shared mutable resource of the system: receipts
//! are minted straight into it by adapters, and only the currently configured
//! router may move them out again.

use alloy_primitives::{Address, U256};
use tracing::info;

use crate::access::{AccessControl, Role};
use crate::adapter::AdapterHandle;
use crate::error::LedgerError;
use crate::events::Event;
use crate::state::ChainState;
use crate::token::NATIVE_TOKEN;

/// Resolves a receipt identity to its registered adapter.
pub trait AdapterLookup {
    fn adapter_for(&self, receipt: Address) -> Option<&AdapterHandle>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollateralLedger {
    address: Address,
    pool_token: Address,
    supported: Vec<Address>,
    access: AccessControl,
}

impl CollateralLedger {
    pub fn new(address: Address, pool_token: Address, admin: Address) -> Self {
        Self {
            address,
            pool_token,
            supported: Vec::new(),
            access: AccessControl::with_admin(admin),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn pool_token(&self) -> Address {
        self.pool_token
    }

    /// The only principal allowed to move receipts out.
    ///
    /// Held in the shared state, so every handle to this ledger agrees on it.
    pub fn router(&self, state: &ChainState) -> Option<Address> {
        state.ledger_router(self.address)
    }

    /// Receipt identities currently in custody scope, in registration order.
    pub fn supported_receipts(&self) -> &[Address] {
        &self.supported
    }

    pub fn is_supported(&self, receipt: Address) -> bool {
        self.supported.contains(&receipt)
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn access_mut(&mut self) -> &mut AccessControl {
        &mut self.access
    }

    pub fn balance_of(&self, state: &ChainState, receipt: Address) -> U256 {
        state.tokens.balance_of(receipt, self.address)
    }

    /// Sum of every supported receipt balance valued by its adapter.
    ///
    /// Receipts without a registered adapter are skipped so valuation stays
    /// live with orphaned dust. Returns zero while no router is configured.
    pub fn total_value_in_pool_units(
        &self,
        state: &ChainState,
        adapters: &impl AdapterLookup,
    ) -> Result<U256, LedgerError> {
        if self.router(state).is_none() {
            return Ok(U256::ZERO);
        }

        let mut total = U256::ZERO;
        for &receipt in &self.supported {
            let Some(adapter) = adapters.adapter_for(receipt) else {
                continue;
            };
            let balance = self.balance_of(state, receipt);
            if balance.is_zero() {
                continue;
            }
            let value = adapter
                .strategy_share_value_in_pool_units(state, receipt, balance)
                .map_err(|source| LedgerError::Valuation { receipt, source })?;
            total += value;
        }
        Ok(total)
    }

    /// Move `amount` of `receipt` to `recipient`. Router only.
    pub fn transfer_out(
        &self,
        state: &mut ChainState,
        caller: Address,
        receipt: Address,
        amount: U256,
        recipient: Address,
    ) -> Result<(), LedgerError> {
        self.ensure_router(state, caller)?;
        if !self.is_supported(receipt) {
            return Err(LedgerError::ReceiptNotSupported { receipt });
        }
        state
            .tokens
            .transfer(receipt, self.address, recipient, amount)?;
        Ok(())
    }

    /// Hand transfer capability to `router`, revoking it from the previous one.
    pub fn set_router(
        &mut self,
        state: &mut ChainState,
        caller: Address,
        router: Address,
    ) -> Result<(), LedgerError> {
        self.access.ensure(Role::Admin, caller)?;
        if router.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }

        let previous = state.set_ledger_router(self.address, router);
        info!(ledger = %self.address, %router, "ledger router set");
        state.emit(Event::RouterSet {
            ledger: self.address,
            previous,
            router,
        });
        Ok(())
    }

    pub fn add_supported_receipt(
        &mut self,
        state: &ChainState,
        caller: Address,
        receipt: Address,
    ) -> Result<(), LedgerError> {
        self.ensure_router(state, caller)?;
        if receipt.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        if !self.is_supported(receipt) {
            self.supported.push(receipt);
        }
        Ok(())
    }

    pub fn remove_supported_receipt(
        &mut self,
        state: &ChainState,
        caller: Address,
        receipt: Address,
    ) -> Result<(), LedgerError> {
        self.ensure_router(state, caller)?;
        self.supported.retain(|supported| *supported != receipt);
        Ok(())
    }

    /// Sweep an unsupported token out of custody. Admin only.
    ///
    /// Refuses supported receipts and the pooled unit.
    pub fn rescue_token(
        &self,
        state: &mut ChainState,
        caller: Address,
        token: Address,
        amount: U256,
        recipient: Address,
    ) -> Result<(), LedgerError> {
        self.access.ensure(Role::Admin, caller)?;
        if recipient.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        if self.is_supported(token) || token == self.pool_token {
            return Err(LedgerError::CannotRescueRestricted { token });
        }

        state.tokens.transfer(token, self.address, recipient, amount)?;
        info!(%token, %amount, %recipient, "rescued token from ledger");
        state.emit(Event::Rescued {
            token,
            amount,
            recipient,
        });
        Ok(())
    }

    /// Sweep stray native balance. Admin only.
    pub fn rescue_native(
        &self,
        state: &mut ChainState,
        caller: Address,
        amount: U256,
        recipient: Address,
    ) -> Result<(), LedgerError> {
        self.rescue_token(state, caller, NATIVE_TOKEN, amount, recipient)
    }

    fn ensure_router(&self, state: &ChainState, caller: Address) -> Result<(), LedgerError> {
        match self.router(state) {
            Some(router) if router == caller => Ok(()),
            _ => Err(LedgerError::NotRouter { caller }),
        }
    }
}
