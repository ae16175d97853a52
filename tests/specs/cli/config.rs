// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::specs::prelude::Env;

#[test]
fn config_path_points_into_the_isolated_home() {
    let env = Env::new();
    let output = env.runicorn().args(["config", "path"]).assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();

    assert!(stdout.trim().ends_with("runicorn/config.yaml"));
    assert!(stdout.contains(env.home.path().to_str().expect("utf8 path")));
}

#[test]
fn config_set_round_trips_through_show() {
    let env = Env::new();
    env.runicorn()
        .args(["config", "set", "viewer.port", "9123"])
        .assert()
        .success();

    let output = env.runicorn().args(["config", "show"]).assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    assert!(stdout.contains("port: 9123"));
}

#[test]
fn config_set_rejects_unknown_keys_with_exit_2() {
    let env = Env::new();
    env.runicorn()
        .args(["config", "set", "viewer.theme", "dark"])
        .assert()
        .failure()
        .code(2);
}
