// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    plain = { "Python 3.11.8", Some("3.11.8") },
    trailing = { "Python 3.12.0rc1", Some("3.12.0") },
    padded = { "  Python 3.8.10  ", Some("3.8.10") },
    not_python = { "bash: python: command not found", None },
    empty = { "", None },
)]
fn python_version_parsing(line: &str, expected: Option<&str>) {
    assert_eq!(parse_python_version(line).as_deref(), expected);
}

#[test]
fn conda_env_list_parsing() {
    let output = "\
# conda environments:
#
base                  *  /opt/conda
ml                       /opt/conda/envs/ml
torch-212                /opt/conda/envs/torch-212
";
    let envs = parse_conda_env_list(output);
    assert_eq!(
        envs,
        vec![
            ("base".to_string(), "/opt/conda".to_string(), true),
            ("ml".to_string(), "/opt/conda/envs/ml".to_string(), false),
            ("torch-212".to_string(), "/opt/conda/envs/torch-212".to_string(), false),
        ]
    );
}

#[test]
fn conda_parser_ignores_garbage() {
    assert!(parse_conda_env_list("WARNING: something\nnot a path line\n").is_empty());
}

#[parameterized(
    exact_floor = { "0.5.0", true },
    above = { "0.6.2", true },
    major_above = { "1.0.0", true },
    below = { "0.4.9", false },
    dev_suffix = { "0.5.0.dev1", true },
    garbage = { "not-a-version", false },
)]
fn compatibility_floor(version: &str, expected: bool) {
    assert_eq!(version_compatible(version), expected);
}

#[test]
fn python_for_env_paths() {
    let conda = PythonEnv {
        name: "ml".to_string(),
        kind: PythonEnvKind::Conda,
        python_version: None,
        path: "/opt/conda/envs/ml".to_string(),
        is_default: false,
        runicorn_version: None,
    };
    assert_eq!(python_for_env(&conda), "/opt/conda/envs/ml/bin/python");

    let system = PythonEnv {
        name: "system".to_string(),
        kind: PythonEnvKind::System,
        python_version: None,
        path: "/usr/bin/python3".to_string(),
        is_default: true,
        runicorn_version: None,
    };
    assert_eq!(python_for_env(&system), "/usr/bin/python3");
}
