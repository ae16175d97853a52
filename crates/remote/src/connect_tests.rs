// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn pool_key_shape() {
    let params = ConnectParams {
        host: "gpu-box".to_string(),
        port: 2222,
        username: "ml".to_string(),
        auth: SshAuth::Agent,
        connect_timeout: Duration::from_secs(30),
        keepalive: Duration::from_secs(30),
    };
    assert_eq!(params.pool_key(), "ml@gpu-box:2222");
}

#[test]
fn auth_debug_never_prints_secrets() {
    let password = SshAuth::Password("hunter2".to_string());
    let rendered = format!("{:?}", password);
    assert!(!rendered.contains("hunter2"));

    let key = SshAuth::KeyFile {
        path: PathBuf::from("/home/ml/.ssh/id_ed25519"),
        passphrase: Some("secret-phrase".to_string()),
    };
    let rendered = format!("{:?}", key);
    assert!(rendered.contains("id_ed25519"));
    assert!(!rendered.contains("secret-phrase"));
}

#[parameterized(
    rsa = { ssh2::HostKeyType::Rsa, "ssh-rsa" },
    ed25519 = { ssh2::HostKeyType::Ed25519, "ssh-ed25519" },
    ecdsa256 = { ssh2::HostKeyType::Ecdsa256, "ecdsa-sha2-nistp256" },
)]
fn key_type_names(key_type: ssh2::HostKeyType, expected: &str) {
    assert_eq!(host_key_type_name(key_type), expected);
}

#[test]
fn exec_output_success() {
    assert!(ExecOutput { stdout: String::new(), stderr: String::new(), code: 0 }.success());
    assert!(!ExecOutput { stdout: String::new(), stderr: String::new(), code: 1 }.success());
}

#[test]
fn unknown_connection_id_is_an_error() {
    let pool = ConnectionPool::new(4);
    assert!(matches!(
        pool.get("conn-nope"),
        Err(RemoteError::ConnectionNotFound(_))
    ));
}

#[test]
fn error_codes_for_http_mapping() {
    let prompt = HostKeyPrompt {
        host: "h".to_string(),
        port: 22,
        key_type: "ssh-ed25519".to_string(),
        fingerprint_sha256: "SHA256:abc".to_string(),
        public_key: "QUJD".to_string(),
        reason: "unknown".to_string(),
        expected_fingerprint_sha256: None,
        expected_public_key: None,
    };
    let err = RemoteError::HostKeyConfirmationRequired(Box::new(prompt));
    assert_eq!(err.code(), "HOST_KEY_CONFIRMATION_REQUIRED");

    let err = RemoteError::SessionNotFound("s".to_string());
    assert_eq!(err.code(), "SESSION_NOT_FOUND");
}
