//! Scenario configuration without replay.

use anyhow::Result;
use serde::Serialize;

use crate::cli::{InspectArgs, OutputFormat};
use crate::output::{format_backends_table, format_scenario_detail};
use crate::report::{BackendReport, Report};
use crate::scenario::Scenario;

#[derive(Serialize)]
struct Inspection<'a> {
    scenario: &'a Scenario,
    backends: Vec<BackendReport>,
}

pub fn run_inspect(args: &InspectArgs, format: OutputFormat) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let deployment = scenario.deploy()?;
    let report = Report::collect(&scenario, &deployment, Vec::new(), None);

    match format {
        OutputFormat::Table => {
            println!("{}", format_scenario_detail(&scenario));
            println!("{}", format_backends_table(&report.backends));
        }
        OutputFormat::Json => {
            let inspection = Inspection {
                scenario: &scenario,
                backends: report.backends,
            };
            let json = serde_json::to_string_pretty(&inspection)?;
            println!("{}", json);
        }
    }

    Ok(())
}
