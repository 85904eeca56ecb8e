//! Table formatting for backend allocations and step outcomes.

use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use crate::report::{BackendReport, StepReport};

#[derive(Tabled)]
struct BackendRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Custody")]
    custody: String,
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

fn truncate_address(addr: &str) -> String {
    if addr.len() > 10 {
        format!("{}...{}", &addr[..6], &addr[addr.len() - 4..])
    } else {
        addr.to_string()
    }
}

fn truncate_detail(detail: &str, max_len: usize) -> String {
    if detail.chars().count() > max_len {
        let kept: String = detail.chars().take(max_len - 3).collect();
        format!("{kept}...")
    } else {
        detail.to_string()
    }
}

/// Millionths as a percentage with two decimals.
pub fn format_bps(bps: u32) -> String {
    format!("{}.{:02}%", bps / 10_000, (bps % 10_000) / 100)
}

pub fn format_backends_table(backends: &[BackendReport]) -> String {
    if backends.is_empty() {
        return "No backends configured.".to_string();
    }

    let rows: Vec<BackendRow> = backends
        .iter()
        .enumerate()
        .map(|(index, backend)| BackendRow {
            index,
            name: backend.name.clone(),
            address: truncate_address(&backend.address.to_string()),
            status: format!("{:?}", backend.status),
            target: format_bps(backend.target_bps),
            current: backend
                .current_bps
                .map_or_else(|| "-".to_string(), format_bps),
            value: backend
                .value
                .map_or_else(|| "unavailable".to_string(), |value| value.to_string()),
            custody: backend.custody.to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::left()));

    table.to_string()
}

pub fn format_steps_table(steps: &[StepReport]) -> String {
    if steps.is_empty() {
        return "No steps replayed.".to_string();
    }

    let rows: Vec<StepRow> = steps
        .iter()
        .map(|step| StepRow {
            index: step.index,
            step: step.step.clone(),
            result: if step.ok { "ok" } else { "failed" }.to_string(),
            detail: truncate_detail(&step.detail, 60),
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::left()));

    table.to_string()
}
