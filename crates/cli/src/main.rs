// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `runicorn`: the Viewer CLI
//!
//! Exit codes: 0 success, 1 general failure, 2 invalid arguments (clap's
//! default for usage errors).

mod commands;
mod context;
mod exit_error;
mod logging;

use clap::{Parser, Subcommand};
use exit_error::ExitError;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "runicorn", version, about = "Self-hosted experiment tracking")]
struct Cli {
    /// Storage root override (wins over config and environment)
    #[arg(long, global = true, value_name = "PATH")]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Viewer server
    Viewer(commands::viewer::ViewerArgs),
    /// Show or edit configuration
    Config(commands::config::ConfigArgs),
    /// Bundle runs into a portable archive
    Export(commands::export::ExportArgs),
    /// Import a bundle produced by `export`
    Import(commands::import::ImportArgs),
    /// Dump one run's metric series as CSV or JSON
    ExportData(commands::export_data::ExportDataArgs),
    /// Storage maintenance: list, stats, rebuild, sweep, gc, verify
    Manage(commands::manage::ManageArgs),
    /// Show or edit the rate-limit policy
    RateLimit(commands::rate_limit::RateLimitArgs),
    /// Soft-delete runs (optionally purge permanently)
    Delete(commands::delete::DeleteArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            ExitCode::from(err.code.clamp(0, 255) as u8)
        }
    }
}

fn run(cli: Cli) -> Result<(), ExitError> {
    let ctx = context::Context::load(cli.storage)?;

    match cli.command {
        Commands::Viewer(args) => commands::viewer::run(args, ctx),
        Commands::Config(args) => commands::config::run(args, ctx),
        Commands::Export(args) => commands::export::run(args, ctx),
        Commands::Import(args) => commands::import::run(args, ctx),
        Commands::ExportData(args) => commands::export_data::run(args, ctx),
        Commands::Manage(args) => commands::manage::run(args, ctx),
        Commands::RateLimit(args) => commands::rate_limit::run(args, ctx),
        Commands::Delete(args) => commands::delete::run(args, ctx),
    }
}
