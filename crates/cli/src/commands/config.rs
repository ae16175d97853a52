// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runicorn config`: show, locate, and edit the config file

use crate::context::Context;
use crate::exit_error::ExitError;
use clap::{Args, Subcommand};
use rn_core::Config;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as YAML
    Show,
    /// Print the config file location
    Path,
    /// Set one key (dotted form, e.g. `viewer.port 9000`)
    Set { key: String, value: String },
}

pub fn run(args: ConfigArgs, ctx: Context) -> Result<(), ExitError> {
    crate::logging::init(&ctx.config.viewer.log_level);
    match args.command {
        ConfigCommand::Show => {
            let yaml = serde_yaml::to_string(&ctx.config)
                .map_err(|e| ExitError::general(e.to_string()))?;
            print!("{}", yaml);
            println!("# storage_root: {}", ctx.storage_root.display());
            Ok(())
        }
        ConfigCommand::Path => {
            let path =
                Config::default_path().map_err(|e| ExitError::general(e.to_string()))?;
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommand::Set { key, value } => set_key(&key, &value),
    }
}

/// Load the on-disk file (not the env-merged view), apply one key, write
/// back. Env and flags would otherwise leak into the file.
fn set_key(key: &str, value: &str) -> Result<(), ExitError> {
    let path = Config::default_path().map_err(|e| ExitError::general(e.to_string()))?;
    let mut config =
        Config::load_file(&path).map_err(|e| ExitError::general(e.to_string()))?;

    apply_key(&mut config, key, value)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ExitError::general(e.to_string()))?;
    }
    let yaml =
        serde_yaml::to_string(&config).map_err(|e| ExitError::general(e.to_string()))?;
    std::fs::write(&path, yaml).map_err(|e| ExitError::general(e.to_string()))?;
    println!("{} = {}", key, value);
    Ok(())
}

fn apply_key(config: &mut Config, key: &str, value: &str) -> Result<(), ExitError> {
    let parse_u16 = |v: &str| {
        v.parse::<u16>()
            .map_err(|_| ExitError::usage(format!("expected a port number, got {v:?}")))
    };
    let parse_u64 = |v: &str| {
        v.parse::<u64>()
            .map_err(|_| ExitError::usage(format!("expected an integer, got {v:?}")))
    };
    let parse_bool = |v: &str| match v {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ExitError::usage(format!("expected a boolean, got {other:?}"))),
    };

    match key {
        "storage.user_root_dir" => config.storage.user_root_dir = Some(value.into()),
        "storage.zombie_threshold_hours" => {
            config.storage.zombie_threshold_hours = parse_u64(value)?;
        }
        "storage.recycle_retention_days" => {
            config.storage.recycle_retention_days = parse_u64(value)?;
        }
        "viewer.host" => config.viewer.host = value.to_string(),
        "viewer.port" => config.viewer.port = parse_u16(value)?,
        "viewer.log_level" => config.viewer.log_level = value.to_string(),
        "remote.ssh_timeout" => config.remote.ssh_timeout = parse_u64(value)?,
        "remote.keepalive" => config.remote.keepalive = parse_u64(value)?,
        "remote.max_connections" => {
            config.remote.max_connections = parse_u64(value)? as usize;
        }
        "assets.archive_dir" => config.assets.archive_dir = Some(value.into()),
        "assets.max_snapshot_size_mb" => {
            config.assets.max_snapshot_size_mb = parse_u64(value)?;
        }
        "assets.enable_deduplication" => {
            config.assets.enable_deduplication = parse_bool(value)?;
        }
        "enhanced_logging.capture_console" => {
            config.enhanced_logging.capture_console = parse_bool(value)?;
        }
        "enhanced_logging.tqdm_mode" => {
            config.enhanced_logging.tqdm_mode = value.to_string();
        }
        "security.enable_rate_limit" => {
            config.security.enable_rate_limit = parse_bool(value)?;
        }
        "security.rate_limit_per_minute" => {
            config.security.rate_limit_per_minute = parse_u64(value)? as u32;
        }
        other => {
            return Err(ExitError::usage(format!("unknown config key: {other:?}")));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
