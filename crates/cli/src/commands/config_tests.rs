// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn apply_known_keys() {
    let mut config = Config::default();
    apply_key(&mut config, "viewer.port", "9100").unwrap();
    apply_key(&mut config, "storage.zombie_threshold_hours", "12").unwrap();
    apply_key(&mut config, "security.enable_rate_limit", "false").unwrap();
    apply_key(&mut config, "enhanced_logging.tqdm_mode", "strip").unwrap();

    assert_eq!(config.viewer.port, 9100);
    assert_eq!(config.storage.zombie_threshold_hours, 12);
    assert!(!config.security.enable_rate_limit);
    assert_eq!(config.enhanced_logging.tqdm_mode, "strip");
}

#[parameterized(
    unknown_key = { "viewer.theme", "dark" },
    bad_port = { "viewer.port", "not-a-port" },
    bad_bool = { "security.enable_rate_limit", "maybe" },
    bad_int = { "remote.ssh_timeout", "soon" },
)]
fn rejects_with_usage_error(key: &str, value: &str) {
    let mut config = Config::default();
    let err = apply_key(&mut config, key, value).unwrap_err();
    assert_eq!(err.code, 2);
}
