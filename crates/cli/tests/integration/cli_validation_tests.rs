//! CLI argument validation tests.
//!
//! These tests verify that the CLI properly validates arguments and scenario
//! files and provides helpful error messages.

use std::io::Write;

use predicates::prelude::*;

use super::helpers::{fixture_path, multivault_cmd};

#[test]
fn test_help_output() {
    multivault_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("multivault"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("inspect"));
}

#[test]
fn test_run_help_mentions_env() {
    multivault_cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MULTIVAULT_SCENARIO"))
        .stdout(predicate::str::contains("--strict"));
}

#[test]
fn test_invalid_command() {
    multivault_cmd()
        .arg("invalid_command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_run_missing_scenario() {
    multivault_cmd()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_invalid_format() {
    multivault_cmd()
        .args(["--format", "xml", "run"])
        .arg(fixture_path("scenario"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_unreadable_scenario() {
    multivault_cmd()
        .args(["run", "/nonexistent/scenario.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read scenario"));
}

#[test]
fn test_unknown_action() {
    multivault_cmd()
        .arg("run")
        .arg(fixture_path("malformed_scenario"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse scenario"));
}

#[test]
fn test_invalid_targets_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"backends": [
            {{"name": "alpha", "target_bps": 600000}},
            {{"name": "beta", "target_bps": 600000}}
        ]}}"#
    )
    .unwrap();

    multivault_cmd()
        .arg("inspect")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to build deployment"));
}
