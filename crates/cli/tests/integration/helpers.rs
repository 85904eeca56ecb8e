//! Test helper utilities for CLI integration tests.

#![allow(deprecated)] // Command::cargo_bin deprecation

use assert_cmd::Command;
use serde_json::Value;

/// Create a CLI command with no scenario in the environment.
pub fn multivault_cmd() -> Command {
    let mut cmd = Command::cargo_bin("multivault").unwrap();
    cmd.env_remove("MULTIVAULT_SCENARIO");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Absolute path of a fixture file.
pub fn fixture_path(name: &str) -> String {
    format!(
        "{}/tests/fixtures/{}.json",
        env!("CARGO_MANIFEST_DIR"),
        name
    )
}

/// Run a fixture with `--format json` and parse the report.
pub fn run_json(name: &str, extra: &[&str]) -> Value {
    let output = multivault_cmd()
        .args(["--format", "json", "run"])
        .arg(fixture_path(name))
        .args(extra)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}
