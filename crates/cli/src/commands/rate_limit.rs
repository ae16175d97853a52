// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runicorn rate-limit`: inspect and edit the rate-limit policy file
//!
//! The running Viewer hot-reloads the file, so edits take effect without a
//! restart.

use crate::context::Context;
use crate::exit_error::ExitError;
use clap::{Args, Subcommand};
use rn_core::Config;
use rn_server::{ratelimit::BucketPolicy, RateLimitPolicy};
use std::path::PathBuf;

#[derive(Args)]
pub struct RateLimitArgs {
    #[command(subcommand)]
    pub command: RateLimitCommand,
}

#[derive(Subcommand)]
pub enum RateLimitCommand {
    /// Print the effective policy as JSON
    Show,
    /// Set the default bucket
    SetDefault {
        #[arg(long)]
        max_requests: u32,
        #[arg(long, default_value = "60")]
        window_seconds: u64,
        #[arg(long)]
        burst_size: Option<u32>,
    },
    /// Set one endpoint's bucket
    Set {
        /// Endpoint path, e.g. `/api/remote/connect`
        endpoint: String,
        #[arg(long)]
        max_requests: u32,
        #[arg(long, default_value = "60")]
        window_seconds: u64,
        #[arg(long)]
        burst_size: Option<u32>,
    },
    /// Restore the built-in defaults
    Reset,
}

pub fn run(args: RateLimitArgs, ctx: Context) -> Result<(), ExitError> {
    crate::logging::init(&ctx.config.viewer.log_level);
    let path = Config::rate_limit_path().map_err(|e| ExitError::general(e.to_string()))?;

    match args.command {
        RateLimitCommand::Show => {
            let policy = load(&path)?;
            let json = serde_json::to_string_pretty(&policy)
                .map_err(|e| ExitError::general(e.to_string()))?;
            println!("{}", json);
            Ok(())
        }
        RateLimitCommand::SetDefault { max_requests, window_seconds, burst_size } => {
            let mut policy = load(&path)?;
            policy.default = BucketPolicy { max_requests, window_seconds, burst_size };
            save(&path, &policy)
        }
        RateLimitCommand::Set { endpoint, max_requests, window_seconds, burst_size } => {
            if !endpoint.starts_with('/') {
                return Err(ExitError::usage(format!(
                    "endpoint must start with '/', got {endpoint:?}"
                )));
            }
            let mut policy = load(&path)?;
            policy
                .endpoints
                .insert(endpoint, BucketPolicy { max_requests, window_seconds, burst_size });
            save(&path, &policy)
        }
        RateLimitCommand::Reset => save(&path, &RateLimitPolicy::default()),
    }
}

fn load(path: &PathBuf) -> Result<RateLimitPolicy, ExitError> {
    if !path.exists() {
        return Ok(RateLimitPolicy::default());
    }
    let text = std::fs::read_to_string(path).map_err(|e| ExitError::general(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| ExitError::general(e.to_string()))
}

fn save(path: &PathBuf, policy: &RateLimitPolicy) -> Result<(), ExitError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ExitError::general(e.to_string()))?;
    }
    let json = serde_json::to_vec_pretty(policy).map_err(|e| ExitError::general(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| ExitError::general(e.to_string()))?;
    println!("wrote {}", path.display());
    Ok(())
}
