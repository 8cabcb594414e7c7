//! CLI smoke tests for the `imx` binary.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("imx")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("full"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("contacts"))
        .stdout(predicate::str::contains("stats"));
}

#[test]
fn version_prints() {
    Command::cargo_bin("imx")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("imx"));
}

#[test]
fn stats_without_snapshot_fails_cleanly() {
    let tmp = tempfile::tempdir().unwrap();
    Command::cargo_bin("imx")
        .unwrap()
        .args(["--output-dir", tmp.path().to_str().unwrap(), "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no snapshot"));
}

#[test]
fn full_with_missing_database_fails_cleanly() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("absent.db");
    Command::cargo_bin("imx")
        .unwrap()
        .args([
            "--database",
            missing.to_str().unwrap(),
            "--output-dir",
            tmp.path().to_str().unwrap(),
            "--no-oracle",
            "full",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
