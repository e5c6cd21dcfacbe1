//! CLI parsing tests for the citegraph command

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a Command for the citegraph binary
#[allow(deprecated)]
fn citegraph() -> Command {
    Command::cargo_bin("citegraph").expect("Failed to find citegraph binary")
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_shows_all_commands() {
    citegraph()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("outgoing"))
        .stdout(predicate::str::contains("incoming"))
        .stdout(predicate::str::contains("convert"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_flag() {
    citegraph()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("citegraph"));
}

#[test]
fn test_global_options_in_help() {
    citegraph()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--data-dir"))
        .stdout(predicate::str::contains("--verbose"))
        .stdout(predicate::str::contains("--quiet"));
}

// ============================================================================
// Build Command Tests
// ============================================================================

#[test]
fn test_build_help() {
    citegraph()
        .args(["build", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--all"))
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn test_build_rejects_unknown_vocabulary() {
    citegraph()
        .args(["build", "arxiv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not implemented for vocabulary"));
}

#[test]
fn test_build_all_conflicts_with_names() {
    citegraph()
        .args(["build", "pmid", "--all"])
        .assert()
        .failure();
}

// ============================================================================
// Query Command Tests
// ============================================================================

#[test]
fn test_outgoing_requires_identifier() {
    citegraph().arg("outgoing").assert().failure();
}

#[test]
fn test_incoming_help_mentions_json() {
    citegraph()
        .args(["incoming", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_config_subcommands() {
    citegraph()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("path"));
}
