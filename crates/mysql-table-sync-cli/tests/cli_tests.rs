//! CLI integration tests for mysql-table-sync.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for error conditions that need no live server.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the mysql-table-sync binary.
fn cmd() -> Command {
    Command::cargo_bin("mysql-table-sync").unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("transfer"))
        .stdout(predicate::str::contains("transfer-all"))
        .stdout(predicate::str::contains("list-databases"))
        .stdout(predicate::str::contains("list-tables"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_transfer_subcommand_help() {
    cmd()
        .args(["transfer", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("Source database"))
        .stdout(predicate::str::contains("Target database"));
}

#[test]
fn test_transfer_all_subcommand_help() {
    cmd()
        .args(["transfer-all", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--tables"))
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("every table"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mysql-table-sync"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_verbosity_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

// =============================================================================
// Config Error Tests
// =============================================================================

#[test]
fn test_missing_config_fails() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_fails() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("YAML error"));
}

#[test]
fn test_missing_required_fields_fails() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    // Valid YAML but no server section
    writeln!(file, "transfer:").unwrap();
    writeln!(file, "  batch_size: 100").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .failure();
}

#[test]
fn test_zero_batch_size_in_config_fails() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "server:").unwrap();
    writeln!(file, "  host: localhost").unwrap();
    writeln!(file, "  user: root").unwrap();
    writeln!(file, "  password: secret").unwrap();
    writeln!(file, "transfer:").unwrap();
    writeln!(file, "  batch_size: 0").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("batch_size"));
}

// =============================================================================
// Argument Validation Tests
// =============================================================================

#[test]
fn test_transfer_requires_three_arguments() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "server:").unwrap();
    writeln!(file, "  host: localhost").unwrap();
    writeln!(file, "  user: root").unwrap();
    writeln!(file, "  password: secret").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "transfer", "shop"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_transfer_all_requires_source_and_target() {
    cmd()
        .args(["transfer-all", "shop"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_list_tables_requires_database() {
    cmd()
        .args(["list-tables"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}
