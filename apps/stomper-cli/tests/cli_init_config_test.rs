//! Integration tests for the `stomper init-config` and `stats` commands.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn init_config_writes_a_starter_toml() {
    let temp_dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("stomper").unwrap();

    cmd.current_dir(temp_dir.path())
        .arg("init-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote"));

    let config_path = temp_dir.path().join("stomper.toml");
    assert!(config_path.exists());
    let content = std::fs::read_to_string(config_path).unwrap();
    assert!(content.contains("quality_tools"));
}

#[test]
fn init_config_refuses_to_overwrite_an_existing_file() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("stomper.toml"), "quality_tools = [\"ruff\"]\n").unwrap();

    let mut cmd = Command::cargo_bin("stomper").unwrap();
    cmd.current_dir(temp_dir.path()).arg("init-config").assert().failure();
}

#[test]
fn stats_on_a_fresh_project_reports_zero_history() {
    let temp_dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("stomper").unwrap();

    cmd.current_dir(temp_dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("total attempts: 0"));
}
