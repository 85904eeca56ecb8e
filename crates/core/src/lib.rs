//! Multi-backend vault routing core
//!
//! This crate routes a single pooled share unit's capital across several
//! independently operated yield backends while keeping value conservation,
//! bounded retry semantics, and protection against backend misbehavior.
//!
//! # Overview
//!
//! Components, leaves first:
//! - **Adapters** ([`StrategyAdapter`]): convert between the pooled unit and one
//!   backend's receipt unit
//! - **Collateral ledger** ([`CollateralLedger`]): custodies every receipt and
//!   lets only the current router move it
//! - **Router** ([`Router`]): Auto and Solver routing, exchanges, backend
//!   configuration, and the shortfall liability
//! - **Share unit** ([`PooledVault`]): ERC-4626 style accounting over net
//!   managed assets, withdrawal fees, and router replacement
//!
//! Every operation runs against a [`ChainState`] (token balances, deployed
//! backends, event log) and either completes or leaves it exactly as before.
//!
//! # Example
//!
//! ```rust,ignore
//! use multivault_core::testing::{user, DeploymentBuilder};
//! use alloy_primitives::U256;
//!
//! let mut deployment = DeploymentBuilder::new().with_backends(3).build()?;
//! let alice = user(1);
//! deployment.fund(alice, U256::from(1_000_000u64))?;
//!
//! let shares = deployment.deposit(alice, U256::from(1_000_000u64))?;
//! let paid = deployment.redeem(alice, shares)?;
//! ```

pub mod access;
pub mod adapter;
pub mod backend;
pub mod error;
pub mod events;
pub mod ledger;
pub mod math;
pub mod router;
pub mod settings;
pub mod state;
pub mod token;
pub mod vault;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use access::{AccessControl, Role};
pub use adapter::{AdapterHandle, Erc4626Adapter, StrategyAdapter};
pub use backend::TokenizedVault;
pub use error::{
    AccessError, AdapterError, BackendError, LedgerError, RouterError, TokenError, VaultError,
};
pub use events::{Event, RoutingMode};
pub use ledger::{AdapterLookup, CollateralLedger};
pub use state::{ChainState, Checkpoint};
pub use token::{TokenBook, NATIVE_TOKEN};

// Router exports
pub use router::{
    BackendConfig, BackendStatus, ExchangeOutcome, LegOutcome, RouteOutcome, Router, SolverLeg,
};

// Settings exports
pub use settings::{
    RouterSettings, VaultSettings, MAX_REINVEST_INCENTIVE_BPS, MAX_SLIPPAGE_BPS,
    MAX_WITHDRAWAL_FEE_BPS,
};

// Share unit exports
pub use vault::PooledVault;

// Allocation re-exports
pub use multivault_allocation::{
    AllocationCalculator, AllocationSnapshot, DeterministicVaultSelector, ONE_HUNDRED_PERCENT_BPS,
};
