//! CLI integration tests

use std::process::{Command, Output};

fn sentinelctl(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "sentinel-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = sentinelctl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("perf-sentinel"), "Should show app name");
    for command in [
        "status",
        "ingest",
        "anomalies",
        "insights",
        "alerts",
        "thresholds",
        "models",
        "experiment",
        "config",
    ] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = sentinelctl(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("sentinelctl"), "Should show binary name");
}

/// Test ingest command help
#[test]
fn test_ingest_help() {
    let output = sentinelctl(&["ingest", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Ingest help should succeed");
    assert!(stdout.contains("--metric"), "Should show metric option");
    assert!(stdout.contains("--value"), "Should show value option");
    assert!(stdout.contains("--file"), "Should show file option");
}

/// Test anomalies list subcommand help
#[test]
fn test_anomalies_list_help() {
    let output = sentinelctl(&["anomalies", "list", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Anomalies list help should succeed");
    assert!(stdout.contains("--metric"), "Should show metric option");
    assert!(stdout.contains("--limit"), "Should show limit option");
}

/// Test alerts list subcommand help
#[test]
fn test_alerts_list_help() {
    let output = sentinelctl(&["alerts", "list", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Alerts list help should succeed");
    assert!(stdout.contains("--status"), "Should show status option");
}

/// Test models list subcommand help
#[test]
fn test_models_list_help() {
    let output = sentinelctl(&["models", "list", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Models list help should succeed");
    assert!(
        stdout.contains("--active-only"),
        "Should show active-only option"
    );
}

/// Test experiment significance subcommand help
#[test]
fn test_experiment_significance_help() {
    let output = sentinelctl(&["experiment", "significance", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Significance help should succeed");
    assert!(stdout.contains("--control-impressions"));
    assert!(stdout.contains("--treatment-clicks"));
    assert!(stdout.contains("--confidence"));
    assert!(stdout.contains("--mde"));
}

/// Test format and api-url options
#[test]
fn test_global_options() {
    let output = sentinelctl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("SENTINEL_API_URL"), "Should show env var");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = sentinelctl(&["invalid-command"]);

    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test missing required argument error handling
#[test]
fn test_missing_argument() {
    let output = sentinelctl(&["alerts", "ack"]);

    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should show error about missing argument"
    );
}

/// Test that ingest needs either a file or a metric/value pair
#[test]
fn test_ingest_requires_input() {
    let output = sentinelctl(&["ingest"]);
    assert!(!output.status.success(), "Ingest without input should fail");
}
