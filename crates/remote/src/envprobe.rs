// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote Python environment discovery
//!
//! Enumerates the system interpreter, conda environments, and virtualenvs
//! in well-known locations, and reports the remote `runicorn` package
//! version per environment. Raw version strings are returned; the client
//! decides how to categorize compatibility.

use crate::connect::SshConnection;
use crate::RemoteError;
use serde::Serialize;
use tracing::debug;

/// Minimum compatible remote `runicorn` major.minor.
pub const MIN_COMPAT: (u32, u32) = (0, 5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PythonEnvKind {
    System,
    Conda,
    Venv,
}

#[derive(Debug, Clone, Serialize)]
pub struct PythonEnv {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PythonEnvKind,
    pub python_version: Option<String>,
    pub path: String,
    #[serde(rename = "isDefault")]
    pub is_default: bool,
    /// Remote `runicorn` package version, when installed.
    pub runicorn_version: Option<String>,
}

/// Probe the remote host for usable Python environments.
pub fn probe_environments(connection: &SshConnection) -> Result<Vec<PythonEnv>, RemoteError> {
    let mut envs = Vec::new();

    // System interpreter
    if let Ok(out) = connection.exec("command -v python3 && python3 --version 2>&1") {
        if out.success() {
            let mut lines = out.stdout.lines();
            let path = lines.next().unwrap_or("python3").to_string();
            let version = lines.next().and_then(parse_python_version);
            envs.push(PythonEnv {
                name: "system".to_string(),
                kind: PythonEnvKind::System,
                python_version: version,
                path,
                is_default: true,
                runicorn_version: None,
            });
        }
    }

    // Conda environments
    if let Ok(out) = connection.exec("conda env list 2>/dev/null") {
        if out.success() {
            for (name, path, is_default) in parse_conda_env_list(&out.stdout) {
                envs.push(PythonEnv {
                    name,
                    kind: PythonEnvKind::Conda,
                    python_version: None,
                    path,
                    is_default,
                    runicorn_version: None,
                });
            }
        }
    }

    // Virtualenvs in the usual places
    for base in ["~/.virtualenvs", "~/venvs"] {
        let cmd = format!("ls -1 {} 2>/dev/null", base);
        if let Ok(out) = connection.exec(&cmd) {
            for name in out.stdout.lines().filter(|l| !l.is_empty()) {
                envs.push(PythonEnv {
                    name: name.to_string(),
                    kind: PythonEnvKind::Venv,
                    python_version: None,
                    path: format!("{}/{}", base, name),
                    is_default: false,
                    runicorn_version: None,
                });
            }
        }
    }

    // Fill in versions per environment
    for env in envs.iter_mut() {
        let python = python_for_env(env);
        if env.python_version.is_none() {
            if let Ok(out) = connection.exec(&format!("{} --version 2>&1", python)) {
                env.python_version = parse_python_version(&out.stdout);
            }
        }
        let probe = format!(
            "{} -c 'import runicorn, sys; sys.stdout.write(runicorn.__version__)' 2>/dev/null",
            python
        );
        if let Ok(out) = connection.exec(&probe) {
            let version = out.stdout.trim();
            if out.success() && !version.is_empty() {
                env.runicorn_version = Some(version.to_string());
            }
        }
    }

    debug!(count = envs.len(), "remote environment probe complete");
    Ok(envs)
}

/// Interpreter invocation for an environment.
pub fn python_for_env(env: &PythonEnv) -> String {
    match env.kind {
        PythonEnvKind::System => env.path.clone(),
        PythonEnvKind::Conda => format!("{}/bin/python", env.path),
        PythonEnvKind::Venv => format!("{}/bin/python", env.path),
    }
}

/// Extract `X.Y.Z` from `Python X.Y.Z`.
pub fn parse_python_version(line: &str) -> Option<String> {
    let rest = line.trim().strip_prefix("Python ")?;
    let version: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if version.is_empty() {
        None
    } else {
        Some(version)
    }
}

/// Parse `conda env list` text output into `(name, path, is_default)`.
///
/// Lines look like `base  *  /opt/conda` or `ml       /opt/conda/envs/ml`;
/// the `*` marks the active environment.
pub fn parse_conda_env_list(output: &str) -> Vec<(String, String, bool)> {
    let mut envs = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [name, "*", path] => envs.push((name.to_string(), path.to_string(), true)),
            [name, path] if path.starts_with('/') => {
                envs.push((name.to_string(), path.to_string(), false));
            }
            _ => {}
        }
    }
    envs
}

/// Whether a remote `runicorn` version satisfies [`MIN_COMPAT`].
pub fn version_compatible(version: &str) -> bool {
    let mut parts = version.split('.');
    let major: u32 = match parts.next().and_then(|p| p.parse().ok()) {
        Some(v) => v,
        None => return false,
    };
    let minor: u32 = parts
        .next()
        .map(|p| {
            p.chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse()
                .unwrap_or(0)
        })
        .unwrap_or(0);
    (major, minor) >= MIN_COMPAT
}

#[cfg(test)]
#[path = "envprobe_tests.rs"]
mod tests;
