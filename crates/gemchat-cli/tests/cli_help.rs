use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("gemchat")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("format"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("test-connection"));
}

#[test]
fn test_auth_help_shows_subcommands() {
    cargo_bin_cmd!("gemchat")
        .args(["auth", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("signup"))
        .stdout(predicate::str::contains("signin"))
        .stdout(predicate::str::contains("google"))
        .stdout(predicate::str::contains("signout"))
        .stdout(predicate::str::contains("reset"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_chat_help_shows_transcript_flag() {
    cargo_bin_cmd!("gemchat")
        .args(["chat", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--transcript"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("gemchat")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1"));
}
