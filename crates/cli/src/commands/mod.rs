//! Command implementations.

pub mod inspect;
pub mod run;

pub use inspect::run_inspect;
pub use run::run_scenario;
