// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::connect::{ConnectParams, SshAuth};
use crate::known_hosts::KnownHosts;
use std::time::Duration;

fn params(auth: SshAuth) -> TunnelParams {
    TunnelParams {
        connect: ConnectParams {
            host: "gpu-box".to_string(),
            port: 2222,
            username: "ml".to_string(),
            auth,
            connect_timeout: Duration::from_secs(30),
            keepalive: Duration::from_secs(30),
        },
        local_port: 18000,
        remote_port: 8000,
    }
}

#[test]
fn password_auth_never_uses_the_openssh_binary() {
    // BatchMode=yes cannot answer a password prompt
    assert!(!openssh::is_usable(&SshAuth::Password("pw".to_string())));
}

#[test]
fn passphrase_protected_key_never_uses_the_openssh_binary() {
    assert!(!openssh::is_usable(&SshAuth::KeyFile {
        path: "/k".into(),
        passphrase: Some("pp".to_string()),
    }));
}

#[test]
fn openssh_args_carry_policy_flags() {
    let dir = tempfile::tempdir().unwrap();
    let kh = KnownHosts::new(&dir.path().join("known_hosts"));
    let params = params(SshAuth::KeyFile { path: "/home/ml/.ssh/id_ed25519".into(), passphrase: None });

    let args = openssh::build_args(&params, &kh);
    let joined = args.join(" ");

    assert!(joined.contains("-N -L 127.0.0.1:18000:127.0.0.1:8000"));
    assert!(joined.contains("-p 2222"));
    assert!(joined.contains("BatchMode=yes"));
    assert!(joined.contains("StrictHostKeyChecking=yes"));
    assert!(joined.contains(&format!("UserKnownHostsFile={}", kh.path().display())));
    assert!(joined.contains("ExitOnForwardFailure=yes"));
    assert!(joined.contains("-i /home/ml/.ssh/id_ed25519"));
    assert!(args.last().map(String::as_str) == Some("ml@gpu-box"));
}

#[test]
fn agent_auth_omits_identity_flag() {
    let dir = tempfile::tempdir().unwrap();
    let kh = KnownHosts::new(&dir.path().join("known_hosts"));
    let args = openssh::build_args(&params(SshAuth::Agent), &kh);
    assert!(!args.iter().any(|a| a == "-i"));
}

#[test]
fn tunnel_handle_stop_is_idempotent() {
    let token = CancellationToken::new();
    let mut handle = TunnelHandle::new(1234, "async-native", Shutdown::Token(token.clone()));
    handle.stop();
    assert!(token.is_cancelled());
    handle.stop(); // second stop is a no-op
}
