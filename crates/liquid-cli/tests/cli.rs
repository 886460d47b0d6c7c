//! Command-line behaviour that needs no running cluster

use assert_cmd::Command;
use predicates::prelude::*;

fn liquid() -> Command {
    let mut cmd = Command::cargo_bin("liquid").unwrap();
    cmd.env_remove("VAULT_TOKEN").env_remove("LIQUID_CONFIG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    liquid()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("collectionsgc"))
        .stdout(predicate::str::contains("nomad-address"));
}

#[test]
fn test_missing_settings_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    liquid()
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .arg("halt")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to load settings"));
}

#[test]
fn test_invalid_settings_fail() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("liquid.toml");
    std::fs::write(&path, "[liquid]\nhttp_protocol = \"ftp\"\n").unwrap();

    liquid()
        .arg("--config")
        .arg(&path)
        .arg("halt")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("configuration error"));
}

#[test]
fn test_missing_vault_token_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("liquid.toml");
    std::fs::write(&path, "[liquid]\ndomain = \"example.org\"\n").unwrap();

    liquid()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&path)
        .arg("nomad-address")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no Vault token"));
}
