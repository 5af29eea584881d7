//! Binary-level checks that need no network

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn askgenie(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("askgenie").unwrap();
    cmd.env("ASKGENIE_SQLITE_PATH", tmp.path().join("askgenie.db"))
        .env("ASKGENIE_OWNER_ID", "cli-test")
        .env_remove("ASKGENIE_PERSISTENCE_BACKEND")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(tmp.path().join("missing.yaml"));
    cmd
}

#[test]
fn test_help_lists_commands() {
    let tmp = TempDir::new().unwrap();
    askgenie(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("usage"))
        .stdout(predicate::str::contains("health"));
}

#[test]
fn test_history_list_empty() {
    let tmp = TempDir::new().unwrap();
    askgenie(&tmp)
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No chat history found."));
}

#[test]
fn test_usage_fresh_owner() {
    let tmp = TempDir::new().unwrap();
    askgenie(&tmp)
        .arg("usage")
        .assert()
        .success()
        .stdout(predicate::str::contains("Messages used:  0"))
        .stdout(predicate::str::contains("cli-test"));
}

#[test]
fn test_usage_grant_premium() {
    let tmp = TempDir::new().unwrap();
    askgenie(&tmp)
        .args(["usage", "--grant-premium"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Premium granted to cli-test"))
        .stdout(predicate::str::contains("premium"));
}

#[test]
fn test_history_show_unknown_session_fails() {
    let tmp = TempDir::new().unwrap();
    askgenie(&tmp)
        .args(["history", "show", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown session"));
}

#[test]
fn test_invalid_endpoint_fails_validation() {
    let tmp = TempDir::new().unwrap();
    askgenie(&tmp)
        .env("ASKGENIE_ANSWER_ENDPOINT", "not a url")
        .arg("health")
        .assert()
        .failure()
        .stderr(predicate::str::contains("answer.endpoint"));
}
