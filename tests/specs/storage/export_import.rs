// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::specs::prelude::Env;

/// `export` then `import` into an empty storage reproduces the listing.
#[test]
fn export_import_round_trips_the_listing() {
    let source = Env::new();
    source.seed_run("vision/resnet", "20240101_000000_aaaaaa", &[(1.0, 1, 0.9)]);
    source.seed_run("vision/vit", "20240102_000000_bbbbbb", &[(1.0, 1, 0.8), (2.0, 2, 0.6)]);
    source.runicorn().args(["manage", "rebuild"]).assert().success();

    let bundle = source.home.path().join("bundle.zip");
    source
        .runicorn()
        .args(["export", "--out"])
        .arg(&bundle)
        .assert()
        .success();
    assert!(bundle.is_file());

    let target = Env::new();
    target.runicorn().arg("import").arg(&bundle).assert().success();

    let listing = |env: &Env| -> Vec<String> {
        let output = env.runicorn().args(["manage", "list"]).assert().success();
        let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
        let mut lines: Vec<String> = stdout
            .lines()
            .filter(|l| l.contains("2024"))
            .map(str::to_string)
            .collect();
        lines.sort();
        lines
    };
    assert_eq!(listing(&source), listing(&target));
}

#[test]
fn export_can_select_by_path() {
    let env = Env::new();
    env.seed_run("keep/this", "20240101_000000_aaaaaa", &[(1.0, 1, 0.9)]);
    env.seed_run("drop/that", "20240102_000000_bbbbbb", &[(1.0, 1, 0.8)]);
    env.runicorn().args(["manage", "rebuild"]).assert().success();

    let bundle = env.home.path().join("partial.zip");
    env.runicorn()
        .args(["export", "--path", "keep", "--out"])
        .arg(&bundle)
        .assert()
        .success();

    let target = Env::new();
    target.runicorn().arg("import").arg(&bundle).assert().success();
    let output = target.runicorn().args(["manage", "list"]).assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();

    assert!(stdout.contains("20240101_000000_aaaaaa"));
    assert!(!stdout.contains("20240102_000000_bbbbbb"));
}

#[test]
fn import_refuses_to_clobber_without_force() {
    let env = Env::new();
    env.seed_run("p", "20240101_000000_aaaaaa", &[(1.0, 1, 0.9)]);
    env.runicorn().args(["manage", "rebuild"]).assert().success();

    let bundle = env.home.path().join("bundle.zip");
    env.runicorn()
        .args(["export", "--out"])
        .arg(&bundle)
        .assert()
        .success();

    // Importing over the same storage collides with the existing run
    env.runicorn()
        .arg("import")
        .arg(&bundle)
        .assert()
        .failure()
        .code(1);

    env.runicorn()
        .args(["import", "--force"])
        .arg(&bundle)
        .assert()
        .success();
}
