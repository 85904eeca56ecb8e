//! Output formatting for CLI results.

pub mod detail;
pub mod table;

pub use detail::{format_report_summary, format_scenario_detail};
pub use table::{format_backends_table, format_steps_table};
