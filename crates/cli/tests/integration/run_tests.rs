//! Scenario replay tests.

use predicates::prelude::*;
use serde_json::Value;

use super::helpers::{fixture_path, multivault_cmd, run_json};

fn custody(report: &Value, index: usize) -> &str {
    report["backends"][index]["custody"].as_str().unwrap()
}

#[test]
fn test_run_json_accounting() {
    let report = run_json("scenario", &[]);

    assert_eq!(report["name"], "three-backend-demo");
    let accounting = &report["accounting"];
    assert_eq!(accounting["total_supply"], "90000");
    assert_eq!(accounting["gross_managed"], "90000");
    assert_eq!(accounting["net_managed"], "90000");
    assert_eq!(accounting["shortfall"], "0");
    assert_eq!(accounting["accumulated_fees"], "10");
    assert_eq!(accounting["router_idle"], "0");
    assert_eq!(accounting["withdrawal_fee_bps"], 1000);
}

#[test]
fn test_run_routes_deposits_to_underweight_backends() {
    let report = run_json("scenario", &[]);

    // Deposits land on alpha, beta, gamma in turn; the withdrawal falls back
    // from the failing alpha to beta, and the exchange moves 1000 beta -> gamma.
    assert_eq!(custody(&report, 0), "50000");
    assert_eq!(custody(&report, 1), "19000");
    assert_eq!(custody(&report, 2), "21000");
    assert_eq!(report["backends"][0]["status"], "active");
    assert_eq!(report["backends"][0]["current_bps"], 555_555);
}

#[test]
fn test_run_reports_every_step() {
    let report = run_json("scenario", &[]);
    let steps = report["steps"].as_array().unwrap();

    assert_eq!(steps.len(), 8);
    assert!(steps.iter().all(|step| step["ok"] == true));
    assert_eq!(steps[1]["detail"], "minted 50000 shares");
    assert_eq!(steps[5]["detail"], "burned 10000 shares");
    assert!(report.get("events").is_none());
}

#[test]
fn test_run_with_events() {
    let report = run_json("scenario", &["--events"]);
    let events = report["events"].as_array().unwrap();

    assert!(!events.is_empty());
}

#[test]
fn test_run_table_output() {
    multivault_cmd()
        .arg("run")
        .arg(fixture_path("scenario"))
        .assert()
        .success()
        .stdout(predicate::str::contains("three-backend-demo"))
        .stdout(predicate::str::contains("8 steps replayed"))
        .stdout(predicate::str::contains("alpha"))
        .stdout(predicate::str::contains("50.00%"))
        .stdout(predicate::str::contains("Total supply"));
}

#[test]
fn test_run_from_env() {
    multivault_cmd()
        .env("MULTIVAULT_SCENARIO", fixture_path("scenario"))
        .args(["--format", "json", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_supply\": \"90000\""));
}

#[test]
fn test_failed_step_is_recorded() {
    let report = run_json("failing_scenario", &[]);
    let steps = report["steps"].as_array().unwrap();

    assert_eq!(steps[2]["ok"], false);
    assert_eq!(steps[3]["ok"], true);
    assert_eq!(report["accounting"]["total_supply"], "1001");
    assert_eq!(report["backends"][1]["status"], "withdraw_only");
    assert_eq!(custody(&report, 1), "0");
}

#[test]
fn test_strict_stops_at_first_failure() {
    multivault_cmd()
        .args(["run", "--strict"])
        .arg(fixture_path("failing_scenario"))
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "step 2 (user 1 redeems 5000 shares) failed",
        ));
}

#[test]
fn test_failed_step_table_output() {
    multivault_cmd()
        .arg("run")
        .arg(fixture_path("failing_scenario"))
        .assert()
        .success()
        .stdout(predicate::str::contains("1 failed"))
        .stdout(predicate::str::contains("WithdrawOnly"));
}
