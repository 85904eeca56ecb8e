//! Configuration report tests.

use predicates::prelude::*;
use serde_json::Value;

use super::helpers::{fixture_path, multivault_cmd};

#[test]
fn test_inspect_table_output() {
    multivault_cmd()
        .arg("inspect")
        .arg(fixture_path("scenario"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Router"))
        .stdout(predicate::str::contains("Withdrawal fee:    0.10%"))
        .stdout(predicate::str::contains("gamma"))
        .stdout(predicate::str::contains("20.00%"));
}

#[test]
fn test_inspect_does_not_replay() {
    let output = multivault_cmd()
        .args(["--format", "json", "inspect"])
        .arg(fixture_path("scenario"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let inspection: Value = serde_json::from_slice(&output.stdout).unwrap();
    let backends = inspection["backends"].as_array().unwrap();
    assert_eq!(backends.len(), 3);
    assert!(backends.iter().all(|backend| backend["custody"] == "0"));
    assert_eq!(inspection["scenario"]["steps"].as_array().unwrap().len(), 8);
}
