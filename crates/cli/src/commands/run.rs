//! Scenario replay.

use anyhow::{bail, Result};
use tracing::{debug, warn};

use crate::cli::{OutputFormat, RunArgs};
use crate::output::{format_backends_table, format_report_summary, format_steps_table};
use crate::report::{Report, StepReport};
use crate::scenario::{apply, Scenario};

pub fn run_scenario(args: &RunArgs, format: OutputFormat) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let mut deployment = scenario.deploy()?;

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let label = step.to_string();
        match apply(&mut deployment, step) {
            Ok(detail) => {
                debug!(index, step = %label, %detail, "step applied");
                steps.push(StepReport {
                    index,
                    step: label,
                    ok: true,
                    detail,
                });
            }
            Err(error) if args.strict => {
                bail!("step {index} ({label}) failed: {error:#}");
            }
            Err(error) => {
                warn!(index, step = %label, error = %format!("{error:#}"), "step failed");
                steps.push(StepReport {
                    index,
                    step: label,
                    ok: false,
                    detail: format!("{error:#}"),
                });
            }
        }
    }

    let events = args.events.then(|| deployment.state.events().to_vec());
    let report = Report::collect(&scenario, &deployment, steps, events);

    match format {
        OutputFormat::Table => {
            println!("{}", format_report_summary(&report));
            println!("{}", format_backends_table(&report.backends));
            println!("{}", format_steps_table(&report.steps));
            if let Some(events) = &report.events {
                println!();
                for event in events {
                    println!("  {}", event.name());
                }
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
    }

    Ok(())
}
