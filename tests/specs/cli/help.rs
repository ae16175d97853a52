// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::specs::prelude::Env;
use assert_cmd::Command;

#[test]
fn help_lists_every_subcommand() {
    let output = Command::cargo_bin("runicorn")
        .expect("binary built")
        .arg("--help")
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();

    for subcommand in
        ["viewer", "config", "export", "import", "export-data", "manage", "rate-limit", "delete"]
    {
        assert!(stdout.contains(subcommand), "help is missing {:?}", subcommand);
    }
}

#[test]
fn version_prints_the_crate_version() {
    let output = Command::cargo_bin("runicorn")
        .expect("binary built")
        .arg("--version")
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn config_show_renders_defaults() {
    let env = Env::new();
    let output = env.runicorn().args(["config", "show"]).assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();

    assert!(stdout.contains("viewer:"));
    assert!(stdout.contains("port: 8000"));
    assert!(stdout.contains("zombie_threshold_hours: 48"));
}
