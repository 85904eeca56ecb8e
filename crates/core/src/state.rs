//! The transactional environment every operation runs against.
//!
//! [`ChainState`] bundles token balances, deployed backends, and the event
//! log. Callers take a [`Checkpoint`] before a multi-step operation and
//! [`ChainState::revert_to`] it on failure, which is how every value-moving
//! entry point achieves all-or-nothing semantics.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};

use crate::backend::TokenizedVault;
use crate::error::{BackendError, TokenError};
use crate::events::Event;
use crate::token::TokenBook;

/// Full copy of a [`ChainState`], restorable with [`ChainState::revert_to`].
#[derive(Debug, Clone)]
pub struct Checkpoint(ChainState);

#[derive(Debug, Clone, Default)]
pub struct ChainState {
    pub tokens: TokenBook,
    vaults: BTreeMap<Address, TokenizedVault>,
    /// Router allowed to move custody out of each ledger, keyed by ledger address
    ledger_routers: BTreeMap<Address, Address>,
    events: Vec<Event>,
}

impl ChainState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.clone())
    }

    pub fn revert_to(&mut self, checkpoint: Checkpoint) {
        *self = checkpoint.0;
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Drain the event log.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Router currently allowed to move receipts out of `ledger`.
    pub fn ledger_router(&self, ledger: Address) -> Option<Address> {
        self.ledger_routers.get(&ledger).copied()
    }

    /// Returns the router that held the capability before.
    pub(crate) fn set_ledger_router(
        &mut self,
        ledger: Address,
        router: Address,
    ) -> Option<Address> {
        self.ledger_routers.insert(ledger, router)
    }

    pub fn deploy_vault(&mut self, vault: TokenizedVault) -> Result<Address, BackendError> {
        let address = vault.address;
        if self.vaults.contains_key(&address) {
            return Err(BackendError::VaultAlreadyDeployed { vault: address });
        }
        self.vaults.insert(address, vault);
        Ok(address)
    }

    pub fn vault(&self, address: Address) -> Result<&TokenizedVault, BackendError> {
        self.vaults
            .get(&address)
            .ok_or(BackendError::UnknownVault { vault: address })
    }

    pub fn vault_mut(&mut self, address: Address) -> Result<&mut TokenizedVault, BackendError> {
        self.vaults
            .get_mut(&address)
            .ok_or(BackendError::UnknownVault { vault: address })
    }

    pub fn vaults(&self) -> impl Iterator<Item = &TokenizedVault> {
        self.vaults.values()
    }

    pub fn vault_deposit(
        &mut self,
        vault: Address,
        caller: Address,
        assets: U256,
        receiver: Address,
    ) -> Result<U256, BackendError> {
        let backend = self
            .vaults
            .get(&vault)
            .ok_or(BackendError::UnknownVault { vault })?;
        backend.deposit(&mut self.tokens, caller, assets, receiver)
    }

    pub fn vault_redeem(
        &mut self,
        vault: Address,
        caller: Address,
        shares: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<U256, BackendError> {
        let backend = self
            .vaults
            .get(&vault)
            .ok_or(BackendError::UnknownVault { vault })?;
        backend.redeem(&mut self.tokens, caller, shares, receiver, owner)
    }

    pub fn set_paused(&mut self, vault: Address, paused: bool) -> Result<(), BackendError> {
        self.vault_mut(vault)?.paused = paused;
        Ok(())
    }

    pub fn set_liquidity_cap(
        &mut self,
        vault: Address,
        cap: Option<U256>,
    ) -> Result<(), BackendError> {
        self.vault_mut(vault)?.liquidity_cap = cap;
        Ok(())
    }

    pub fn set_valuation_available(
        &mut self,
        vault: Address,
        available: bool,
    ) -> Result<(), BackendError> {
        self.vault_mut(vault)?.valuation_available = available;
        Ok(())
    }

    /// Credit `amount` of the vault's asset as earned yield.
    pub fn accrue_yield(&mut self, vault: Address, amount: U256) -> Result<(), BackendError> {
        let asset = self.vault(vault)?.asset;
        self.tokens.mint(asset, vault, amount)?;
        Ok(())
    }

    /// Destroy `amount` of the vault's assets, lowering its share price.
    pub fn realize_loss(&mut self, vault: Address, amount: U256) -> Result<(), BackendError> {
        let asset = self.vault(vault)?.asset;
        self.tokens.burn(asset, vault, amount)?;
        Ok(())
    }

    /// Run `call` with `spender` approved for exactly `amount` of `owner`'s
    /// `token`, resetting the approval to zero afterwards on every path.
    pub fn with_exact_approval<T, E>(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
        call: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        self.tokens.approve(token, owner, spender, amount);
        let result = call(self);
        self.tokens.approve(token, owner, spender, U256::ZERO);
        result
    }

    /// Move `amount` of `token` between holders without an allowance.
    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        self.tokens.transfer(token, from, to, amount)
    }
}

/// Run `op` against `owner` and `state`, restoring both if it fails.
pub(crate) fn atomically<S: Clone, T, E>(
    owner: &mut S,
    state: &mut ChainState,
    op: impl FnOnce(&mut S, &mut ChainState) -> Result<T, E>,
) -> Result<T, E> {
    let checkpoint = state.checkpoint();
    let snapshot = owner.clone();
    let result = op(owner, state);
    if result.is_err() {
        *owner = snapshot;
        state.revert_to(checkpoint);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> Address {
        Address::repeat_byte(0xa5)
    }

    #[test]
    fn test_revert_restores_balances_and_events() {
        let holder = Address::repeat_byte(0x01);
        let mut state = ChainState::new();
        state.tokens.mint(asset(), holder, U256::from(10u64)).unwrap();

        let checkpoint = state.checkpoint();
        state.tokens.mint(asset(), holder, U256::from(5u64)).unwrap();
        state.emit(Event::SurplusHeld {
            amount: U256::from(5u64),
        });
        state.revert_to(checkpoint);

        assert_eq!(state.tokens.balance_of(asset(), holder), U256::from(10u64));
        assert!(state.events().is_empty());
    }

    #[test]
    fn test_exact_approval_resets_on_error() {
        let owner = Address::repeat_byte(0x01);
        let spender = Address::repeat_byte(0x02);
        let mut state = ChainState::new();

        let result: Result<(), &str> =
            state.with_exact_approval(asset(), owner, spender, U256::from(7u64), |state| {
                assert_eq!(
                    state.tokens.allowance(asset(), owner, spender),
                    U256::from(7u64)
                );
                Err("boom")
            });

        assert!(result.is_err());
        assert_eq!(state.tokens.allowance(asset(), owner, spender), U256::ZERO);
    }

    #[test]
    fn test_duplicate_vault_rejected() {
        let mut state = ChainState::new();
        let vault = TokenizedVault::new(Address::repeat_byte(0xf1), asset());
        state.deploy_vault(vault.clone()).unwrap();
        assert!(matches!(
            state.deploy_vault(vault),
            Err(BackendError::VaultAlreadyDeployed { .. })
        ));
    }

    #[test]
    fn test_yield_and_loss_move_vault_assets() {
        let mut state = ChainState::new();
        let vault = state
            .deploy_vault(TokenizedVault::new(Address::repeat_byte(0xf1), asset()))
            .unwrap();

        state.accrue_yield(vault, U256::from(100u64)).unwrap();
        state.realize_loss(vault, U256::from(40u64)).unwrap();
        assert_eq!(
            state.vault(vault).unwrap().total_assets(&state.tokens),
            U256::from(60u64)
        );
    }

    #[test]
    fn test_atomically_restores_owner() {
        let mut state = ChainState::new();
        let mut counter = 1u32;
        let result: Result<(), &str> = atomically(&mut counter, &mut state, |counter, state| {
            *counter = 2;
            state.emit(Event::SurplusHeld { amount: U256::from(1u64) });
            Err("fail")
        });
        assert!(result.is_err());
        assert_eq!(counter, 1);
        assert!(state.events().is_empty());
    }
}
