//! Allocation math and deterministic backend selection.
//!
//! This crate holds the pure computations the router relies on when it has to
//! decide where capital goes: current allocation fractions, deficits and
//! surpluses against targets, and a seedless top-K selector that always picks
//! the same backend for the same inputs.
//!
//! All fractions are expressed in millionths ([`ONE_HUNDRED_PERCENT_BPS`] is
//! 100%).

mod calculator;
mod error;
mod selector;
mod snapshot;

pub use calculator::{AllocationCalculator, ONE_HUNDRED_PERCENT_BPS};
pub use error::{AllocationError, Result};
pub use selector::DeterministicVaultSelector;
pub use snapshot::{bps_to_fraction, fraction_to_bps, AllocationEntry, AllocationSnapshot};
