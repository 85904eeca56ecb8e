//! ERC-20 style balances and allowances for every token in the system.
//!
//! The pooled unit, every backend receipt, the pooled share, and the native
//! balance all live in one [`TokenBook`], keyed by token address.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::error::TokenError;

/// Token identity under which native balance is tracked.
pub const NATIVE_TOKEN: Address = Address::new([0xee; 20]);

/// Balances, supplies, and allowances across all tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenBook {
    balances: HashMap<(Address, Address), U256>,
    supplies: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
}

impl TokenBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `holder` in `token`.
    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .get(&(token, holder))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Total minted supply of `token`.
    pub fn total_supply(&self, token: Address) -> U256 {
        self.supplies.get(&token).copied().unwrap_or(U256::ZERO)
    }

    /// Allowance granted by `owner` to `spender` in `token`.
    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Set the allowance of `spender` over `owner`'s `token` to exactly `amount`.
    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        if amount.is_zero() {
            self.allowances.remove(&(token, owner, spender));
        } else {
            self.allowances.insert((token, owner, spender), amount);
        }
    }

    /// Non-zero allowances granted by `owner`, as `(token, spender, amount)`.
    pub fn allowances_granted_by(&self, owner: Address) -> Vec<(Address, Address, U256)> {
        let mut granted: Vec<_> = self
            .allowances
            .iter()
            .filter(|((_, granter, _), amount)| *granter == owner && !amount.is_zero())
            .map(|((token, _, spender), amount)| (*token, *spender, *amount))
            .collect();
        granted.sort();
        granted
    }

    /// Move `amount` of `token` from `from` to `to`.
    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        if from.is_zero() || to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }

        let have = self.balance_of(token, from);
        if have < amount {
            return Err(TokenError::InsufficientBalance {
                token,
                holder: from,
                have,
                need: amount,
            });
        }

        if amount.is_zero() || from == to {
            return Ok(());
        }

        self.set_balance(token, from, have - amount);
        let to_balance = self.balance_of(token, to);
        self.set_balance(token, to, to_balance + amount);
        Ok(())
    }

    /// Move `amount` of `from`'s `token` on behalf of `spender`, consuming allowance.
    ///
    /// A holder moving its own balance needs no allowance.
    pub fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        if spender != from {
            self.spend_allowance(token, from, spender, amount)?;
        }
        self.transfer(token, from, to, amount)
    }

    /// Reduce an allowance by `amount`, failing if it is too small.
    pub fn spend_allowance(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        let have = self.allowance(token, owner, spender);
        if have < amount {
            return Err(TokenError::InsufficientAllowance {
                token,
                owner,
                spender,
                have,
                need: amount,
            });
        }
        self.approve(token, owner, spender, have - amount);
        Ok(())
    }

    /// Create `amount` of `token` for `to`.
    pub fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let balance = self.balance_of(token, to);
        self.set_balance(token, to, balance + amount);
        let supply = self.total_supply(token);
        self.supplies.insert(token, supply + amount);
        Ok(())
    }

    /// Destroy `amount` of `from`'s `token`.
    pub fn burn(&mut self, token: Address, from: Address, amount: U256) -> Result<(), TokenError> {
        let have = self.balance_of(token, from);
        if have < amount {
            return Err(TokenError::InsufficientBalance {
                token,
                holder: from,
                have,
                need: amount,
            });
        }
        self.set_balance(token, from, have - amount);
        let supply = self.total_supply(token);
        self.supplies.insert(token, supply.saturating_sub(amount));
        Ok(())
    }

    fn set_balance(&mut self, token: Address, holder: Address, amount: U256) {
        if amount.is_zero() {
            self.balances.remove(&(token, holder));
        } else {
            self.balances.insert((token, holder), amount);
        }
    }
}
