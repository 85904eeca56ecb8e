//! Detailed output for accounting state and scenario configuration.

use colored::Colorize;

use crate::output::table::format_bps;
use crate::report::{Accounting, Report};
use crate::scenario::Scenario;

fn format_amount(value: Option<impl std::fmt::Display>) -> String {
    value.map_or_else(|| "unavailable".to_string(), |value| value.to_string())
}

fn header(output: &mut String, title: &str) {
    output.push_str(&format!("{}\n", "=".repeat(60)));
    output.push_str(&format!("{}\n", title.bold()));
    output.push_str(&format!("{}\n\n", "=".repeat(60)));
}

pub fn format_accounting(accounting: &Accounting) -> String {
    let mut output = String::new();

    output.push_str(&format!("{}\n", "Accounting".cyan().bold()));
    output.push_str(&format!("  Total supply:     {}\n", accounting.total_supply));
    output.push_str(&format!(
        "  Gross managed:    {}\n",
        format_amount(accounting.gross_managed)
    ));
    output.push_str(&format!(
        "  Net managed:      {}\n",
        format_amount(accounting.net_managed)
    ));
    let shortfall = if accounting.shortfall.is_zero() {
        accounting.shortfall.to_string().normal()
    } else {
        accounting.shortfall.to_string().red()
    };
    output.push_str(&format!("  Shortfall:        {shortfall}\n"));
    output.push_str(&format!("  Fees held:        {}\n", accounting.accumulated_fees));
    output.push_str(&format!("  Router idle:      {}\n", accounting.router_idle));
    output.push_str(&format!(
        "  Withdrawal fee:   {}\n",
        format_bps(accounting.withdrawal_fee_bps)
    ));
    output.push_str(&format!(
        "  Default backend:  {}\n",
        format_amount(accounting.default_backend)
    ));

    output
}

pub fn format_report_summary(report: &Report) -> String {
    let mut output = String::new();

    header(
        &mut output,
        report.name.as_deref().unwrap_or("Scenario report"),
    );

    let failed = report.failed_steps();
    let replayed = format!("{} steps replayed", report.steps.len());
    if failed == 0 {
        output.push_str(&format!("{}\n\n", replayed.green()));
    } else {
        output.push_str(&format!(
            "{}, {}\n\n",
            replayed,
            format!("{failed} failed").red()
        ));
    }

    output.push_str(&format_accounting(&report.accounting));
    output
}

pub fn format_scenario_detail(scenario: &Scenario) -> String {
    let mut output = String::new();

    header(
        &mut output,
        scenario.name.as_deref().unwrap_or("Scenario"),
    );

    output.push_str(&format!("{}\n", "Router".cyan().bold()));
    output.push_str(&format!(
        "  Dust tolerance:    {}\n",
        scenario.router.dust_tolerance
    ));
    output.push_str(&format!(
        "  Max slippage:      {}\n",
        format_bps(scenario.router.max_slippage_bps)
    ));
    output.push_str(&format!(
        "  Max backends:      {}\n\n",
        scenario.router.max_backend_count
    ));

    output.push_str(&format!("{}\n", "Share unit".cyan().bold()));
    output.push_str(&format!(
        "  Withdrawal fee:    {}\n",
        format_bps(scenario.vault.withdrawal_fee_bps)
    ));
    output.push_str(&format!(
        "  Reinvest bonus:    {}\n",
        format_bps(scenario.vault.reinvest_incentive_bps)
    ));
    output.push_str(&format!(
        "  Decimals offset:   {}\n\n",
        scenario.vault.decimals_offset
    ));

    output.push_str(&format!(
        "{} {}\n",
        "Steps:".cyan().bold(),
        scenario.steps.len()
    ));

    output
}
