//! External tokenized-vault backends.
//!
//! A [`TokenizedVault`] is an ERC-4626 style yield source: it takes the pooled
//! unit as its asset and issues its own receipt token, whose identity is the
//! vault address. Assets held by the vault are its balance in the token book,
//! so yield and losses are modelled by minting or burning asset tokens to the
//! vault address.
//!
//! # Key Concepts
//!
//! - **Virtual offset**: conversions add one virtual asset and
//!   `10^decimals_offset` virtual shares, so an empty vault never divides by zero
//!   and donations cannot inflate the first depositor's price.
//! - **Liquidity ceiling**: an optional cap on idle assets that can be paid out,
//!   standing in for a lending market's borrowed-out funds.
//! - **Pause / valuation switches**: operator-facing failure modes that adapters
//!   surface as transient or loud errors.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::math::{self, mul_div, pow10, RoundingDirection};
use crate::token::TokenBook;

/// Virtual assets added to every conversion (1).
pub const VAULT_VIRTUAL_ASSETS: U256 = U256::from_limbs([1, 0, 0, 0]);

/// Static description and switches of a tokenized vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizedVault {
    /// Vault address, also the receipt token identity
    pub address: Address,
    /// Underlying asset (the pooled unit)
    pub asset: Address,
    /// Share decimals minus asset decimals
    pub decimals_offset: u8,
    /// Deposits and redemptions revert while set
    pub paused: bool,
    /// Maximum assets payable in one redemption, if constrained
    pub liquidity_cap: Option<U256>,
    /// Share pricing reverts while unset
    pub valuation_available: bool,
}

impl TokenizedVault {
    /// An unpaused, fully liquid vault for `asset`.
    pub fn new(address: Address, asset: Address) -> Self {
        Self {
            address,
            asset,
            decimals_offset: 0,
            paused: false,
            liquidity_cap: None,
            valuation_available: true,
        }
    }

    /// Set the decimals offset used for virtual shares.
    pub fn with_decimals_offset(mut self, decimals_offset: u8) -> Self {
        self.decimals_offset = decimals_offset;
        self
    }

    /// Virtual shares for this vault (10^decimals_offset)
    pub fn virtual_shares(&self) -> U256 {
        pow10(self.decimals_offset)
    }

    /// Assets held by the vault.
    pub fn total_assets(&self, tokens: &TokenBook) -> U256 {
        tokens.balance_of(self.asset, self.address)
    }

    /// Receipt shares outstanding.
    pub fn total_supply(&self, tokens: &TokenBook) -> U256 {
        tokens.total_supply(self.address)
    }

    /// Convert assets to vault shares
    pub fn to_shares(&self, tokens: &TokenBook, assets: U256, rounding: RoundingDirection) -> U256 {
        mul_div(
            assets,
            self.total_supply(tokens) + self.virtual_shares(),
            self.total_assets(tokens) + VAULT_VIRTUAL_ASSETS,
            rounding,
        )
    }

    /// Convert vault shares to assets
    pub fn to_assets(&self, tokens: &TokenBook, shares: U256, rounding: RoundingDirection) -> U256 {
        mul_div(
            shares,
            self.total_assets(tokens) + VAULT_VIRTUAL_ASSETS,
            self.total_supply(tokens) + self.virtual_shares(),
            rounding,
        )
    }

    /// Assets that can be paid out right now.
    pub fn available_liquidity(&self, tokens: &TokenBook) -> U256 {
        let total = self.total_assets(tokens);
        match self.liquidity_cap {
            Some(cap) => math::min(cap, total),
            None => total,
        }
    }

    /// Shares minted for depositing `assets`.
    pub fn preview_deposit(&self, tokens: &TokenBook, assets: U256) -> U256 {
        self.to_shares(tokens, assets, RoundingDirection::Down)
    }

    /// Assets required to mint exactly `shares`.
    pub fn preview_mint(&self, tokens: &TokenBook, shares: U256) -> U256 {
        self.to_assets(tokens, shares, RoundingDirection::Up)
    }

    /// Shares burned to withdraw exactly `assets`.
    pub fn preview_withdraw(&self, tokens: &TokenBook, assets: U256) -> U256 {
        self.to_shares(tokens, assets, RoundingDirection::Up)
    }

    /// Assets paid for redeeming `shares`.
    pub fn preview_redeem(&self, tokens: &TokenBook, shares: U256) -> U256 {
        self.to_assets(tokens, shares, RoundingDirection::Down)
    }

    /// Price `shares` in assets, failing loudly when pricing is switched off.
    pub fn share_value(&self, tokens: &TokenBook, shares: U256) -> Result<U256, BackendError> {
        if !self.valuation_available {
            return Err(BackendError::ValuationUnavailable {
                vault: self.address,
            });
        }
        Ok(self.preview_redeem(tokens, shares))
    }

    /// Pull `assets` from `caller` (via allowance) and mint shares to `receiver`.
    pub fn deposit(
        &self,
        tokens: &mut TokenBook,
        caller: Address,
        assets: U256,
        receiver: Address,
    ) -> Result<U256, BackendError> {
        if self.paused {
            return Err(BackendError::Paused {
                vault: self.address,
            });
        }

        let shares = self.preview_deposit(tokens, assets);
        if shares.is_zero() {
            return Err(BackendError::ZeroShares {
                vault: self.address,
            });
        }

        tokens.transfer_from(self.asset, self.address, caller, self.address, assets)?;
        tokens.mint(self.address, receiver, shares)?;
        Ok(shares)
    }

    /// Burn `owner`'s `shares` and pay the assets to `receiver`.
    pub fn redeem(
        &self,
        tokens: &mut TokenBook,
        caller: Address,
        shares: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<U256, BackendError> {
        if self.paused {
            return Err(BackendError::Paused {
                vault: self.address,
            });
        }

        let assets = self.preview_redeem(tokens, shares);
        if assets.is_zero() {
            return Err(BackendError::ZeroAssets {
                vault: self.address,
            });
        }

        let available = self.available_liquidity(tokens);
        if assets > available {
            return Err(BackendError::InsufficientLiquidity {
                vault: self.address,
                requested: assets,
                available,
            });
        }

        if caller != owner {
            tokens.spend_allowance(self.address, owner, caller, shares)?;
        }
        tokens.burn(self.address, owner, shares)?;
        tokens.transfer(self.asset, self.address, receiver, assets)?;
        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TokenError;

    fn asset() -> Address {
        Address::repeat_byte(0xa5)
    }

    fn vault() -> TokenizedVault {
        TokenizedVault::new(Address::repeat_byte(0xf1), asset())
    }

    fn funded_book(depositor: Address, amount: u64) -> TokenBook {
        let mut tokens = TokenBook::new();
        tokens.mint(asset(), depositor, U256::from(amount)).unwrap();
        tokens.approve(asset(), depositor, vault().address, U256::from(amount));
        tokens
    }

    #[test]
    fn test_empty_vault_conversion_is_one_to_one() {
        let tokens = TokenBook::new();
        let vault = vault();
        assert_eq!(
            vault.to_shares(&tokens, U256::from(1_000u64), RoundingDirection::Down),
            U256::from(1_000u64)
        );
    }

    #[test]
    fn test_deposit_and_redeem() {
        let user = Address::repeat_byte(0x01);
        let mut tokens = funded_book(user, 1_000);
        let vault = vault();

        let shares = vault
            .deposit(&mut tokens, user, U256::from(1_000u64), user)
            .unwrap();
        assert_eq!(shares, U256::from(1_000u64));
        assert_eq!(vault.total_assets(&tokens), U256::from(1_000u64));

        let assets = vault
            .redeem(&mut tokens, user, shares, user, user)
            .unwrap();
        assert_eq!(assets, U256::from(1_000u64));
        assert_eq!(tokens.balance_of(asset(), user), U256::from(1_000u64));
    }

    #[test]
    fn test_yield_raises_share_price() {
        let user = Address::repeat_byte(0x01);
        let mut tokens = funded_book(user, 1_000);
        let vault = vault();
        vault
            .deposit(&mut tokens, user, U256::from(1_000u64), user)
            .unwrap();

        tokens.mint(asset(), vault.address, U256::from(100u64)).unwrap();

        let value = vault.share_value(&tokens, U256::from(1_000u64)).unwrap();
        assert!(value > U256::from(1_000u64));
        assert!(value <= U256::from(1_100u64));
    }

    #[test]
    fn test_paused_vault_rejects_deposit() {
        let user = Address::repeat_byte(0x01);
        let mut tokens = funded_book(user, 1_000);
        let mut vault = vault();
        vault.paused = true;

        let result = vault.deposit(&mut tokens, user, U256::from(1_000u64), user);
        assert!(matches!(result, Err(BackendError::Paused { .. })));
    }

    #[test]
    fn test_liquidity_cap_limits_redeem() {
        let user = Address::repeat_byte(0x01);
        let mut tokens = funded_book(user, 1_000);
        let mut vault = vault();
        let shares = vault
            .deposit(&mut tokens, user, U256::from(1_000u64), user)
            .unwrap();

        vault.liquidity_cap = Some(U256::from(500u64));
        let result = vault.redeem(&mut tokens, user, shares, user, user);
        assert!(matches!(
            result,
            Err(BackendError::InsufficientLiquidity { .. })
        ));
    }

    #[test]
    fn test_valuation_unavailable() {
        let tokens = TokenBook::new();
        let mut vault = vault();
        vault.valuation_available = false;
        assert!(matches!(
            vault.share_value(&tokens, U256::from(1u64)),
            Err(BackendError::ValuationUnavailable { .. })
        ));
    }

    #[test]
    fn test_deposit_without_allowance_fails() {
        let user = Address::repeat_byte(0x01);
        let mut tokens = TokenBook::new();
        tokens.mint(asset(), user, U256::from(10u64)).unwrap();
        let result = vault().deposit(&mut tokens, user, U256::from(10u64), user);
        assert!(matches!(
            result,
            Err(BackendError::Token(TokenError::InsufficientAllowance { .. }))
        ));
    }
}
