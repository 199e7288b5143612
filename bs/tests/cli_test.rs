//! CLI tests for the `bs` binary

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn bs(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("bs").expect("binary builds");
    cmd.env("NO_COLOR", "1").arg("--config").arg(config);
    cmd
}

fn setup() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = dir.path().join("batchsync.yml");
    fs::write(&config, "profiles:\n  paths: [builtin]\n").unwrap();
    (dir, config)
}

#[test]
fn test_profiles_lists_builtins() {
    let (_dir, config) = setup();
    bs(&config)
        .arg("profiles")
        .assert()
        .success()
        .stdout(predicate::str::contains("customers"))
        .stdout(predicate::str::contains("agents"))
        .stdout(predicate::str::contains("policies"))
        .stdout(predicate::str::contains("payments"));
}

#[test]
fn test_check_reports_rejected_rows() {
    let (dir, config) = setup();
    let input = dir.path().join("customers.csv");
    fs::write(
        &input,
        "Policy No,Name,Mobile,Email,Amount Due\n\
         P1,Ada,5551234567,ada@x.io,\"1,200\"\n\
         P2,,5551234,bob@x.io,100\n",
    )
    .unwrap();
    let report = dir.path().join("errors.csv");

    bs(&config)
        .args(["check", "--profile", "customers", "--error-report"])
        .arg(&report)
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 valid, 1 rejected of 2 rows"))
        .stdout(predicate::str::contains("Name is required"));

    let written = fs::read_to_string(&report).unwrap();
    assert!(written.starts_with("row,key,status,reason\n"));
    assert!(written.contains("3,P2,skipped,Name is required"));
}

#[test]
fn test_check_missing_columns_fails() {
    let (dir, config) = setup();
    let input = dir.path().join("customers.csv");
    fs::write(&input, "Policy No,Name\nP1,Ada\n").unwrap();

    bs(&config)
        .args(["check", "--profile", "customers"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing required columns: mobile, email, amount_due"));
}

#[test]
fn test_check_monthly_profile_with_month() {
    let (dir, config) = setup();
    let input = dir.path().join("policies.csv");
    fs::write(&input, "Policy No,Owner 1 First Name,Owner 1 Surname\nP1,Ada,Lovelace\n").unwrap();

    bs(&config)
        .args(["check", "--profile", "policies", "--month", "2", "--year", "2024"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 valid, 0 rejected of 1 rows"));
}

#[test]
fn test_check_monthly_profile_without_scope_fails() {
    let (dir, config) = setup();
    let input = dir.path().join("policies.csv");
    fs::write(&input, "Policy No,Owner 1 First Name,Owner 1 Surname\nP1,Ada,Lovelace\n").unwrap();

    bs(&config)
        .args(["check", "--profile", "policies"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("needs a scope value for 'data_as_of_date'"));
}

#[test]
fn test_import_without_remote_fails() {
    let (dir, config) = setup();
    let input = dir.path().join("payments.csv");
    fs::write(&input, "Policy No,Payment Date,Payment Amount\nP1,2025-01-15,100\n").unwrap();

    bs(&config)
        .args(["import", "--profile", "payments"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("remote.base-url is not configured"));
}

#[test]
fn test_unknown_profile_fails() {
    let (dir, config) = setup();
    let input = dir.path().join("rows.csv");
    fs::write(&input, "a\n1\n").unwrap();

    bs(&config)
        .args(["check", "--profile", "invoices"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown profile 'invoices'"));
}
