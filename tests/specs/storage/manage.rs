// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::specs::prelude::Env;

#[test]
fn manage_list_shows_seeded_runs() {
    let env = Env::new();
    env.seed_run("vision/resnet", "20240101_000000_aaaaaa", &[(1.0, 1, 0.9), (2.0, 2, 0.7)]);
    env.seed_run("nlp", "20240102_000000_bbbbbb", &[(1.0, 1, 3.1)]);

    env.runicorn().args(["manage", "rebuild"]).assert().success();

    let output = env.runicorn().args(["manage", "list"]).assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();

    assert!(stdout.contains("20240101_000000_aaaaaa"));
    assert!(stdout.contains("vision/resnet"));
    assert!(stdout.contains("20240102_000000_bbbbbb"));
    assert!(stdout.contains("2 runs"));
}

#[test]
fn manage_list_counts_metrics() {
    let env = Env::new();
    env.seed_run("p", "20240101_000000_aaaaaa", &[(1.0, 1, 0.9), (2.0, 2, 0.8), (3.0, 3, 0.7)]);

    env.runicorn().args(["manage", "rebuild"]).assert().success();
    let output = env.runicorn().args(["manage", "list"]).assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();

    let line = stdout
        .lines()
        .find(|l| l.contains("20240101_000000_aaaaaa"))
        .expect("run line present");
    assert!(line.contains("finished"));
    assert!(line.contains('3'));
}

#[test]
fn delete_then_list_hides_the_run() {
    let env = Env::new();
    env.seed_run("p", "20240101_000000_aaaaaa", &[(1.0, 1, 0.5)]);
    env.runicorn().args(["manage", "rebuild"]).assert().success();

    let output = env
        .runicorn()
        .args(["delete", "20240101_000000_aaaaaa", "--reason", "spec cleanup"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    assert!(stdout.contains("soft-deleted 1 runs"));

    let output = env.runicorn().args(["manage", "list"]).assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    assert!(!stdout.contains("20240101_000000_aaaaaa"));

    // Still there with --all, and the files never moved
    let output = env.runicorn().args(["manage", "list", "--all"]).assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    assert!(stdout.contains("20240101_000000_aaaaaa"));
}

#[test]
fn export_data_emits_csv() {
    let env = Env::new();
    env.seed_run("p", "20240101_000000_aaaaaa", &[(1.0, 1, 0.5), (2.0, 2, 0.25)]);

    let output = env
        .runicorn()
        .args(["export-data", "--run", "20240101_000000_aaaaaa", "--format", "csv"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "timestamp,step,name,value,stage");
    assert_eq!(lines[1], "1,1,loss,0.5,");
    assert_eq!(lines[2], "2,2,loss,0.25,");
}
