// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::specs::prelude::Env;
use assert_cmd::Command;

#[test]
fn unknown_subcommand_exits_2() {
    Command::cargo_bin("runicorn")
        .expect("binary built")
        .arg("teleport")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn missing_required_args_exit_2() {
    let env = Env::new();
    env.runicorn().arg("delete").assert().failure().code(2);
}

#[test]
fn malformed_run_id_exits_2_without_touching_storage() {
    let env = Env::new();
    env.runicorn()
        .args(["delete", "not-a-run-id"])
        .assert()
        .failure()
        .code(2);
    // The invalid request never created storage artifacts
    assert!(!env.storage.path().join("runicorn.db").exists());
}

#[test]
fn delete_of_absent_run_is_idempotent() {
    let env = Env::new();
    let output = env
        .runicorn()
        .args(["delete", "20240101_000000_abc123"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    assert!(stdout.contains("soft-deleted 0 runs"));
}

#[test]
fn export_with_no_matches_exits_1() {
    let env = Env::new();
    let out = env.home.path().join("bundle.zip");
    env.runicorn()
        .args(["export", "--out"])
        .arg(&out)
        .assert()
        .failure()
        .code(1);
}
