// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runicorn delete`: soft-delete runs, optionally purging them

use crate::context::Context;
use crate::exit_error::ExitError;
use clap::Args;
use rn_core::{RunId, SystemClock};
use rn_storage::RecycleBin;

#[derive(Args)]
pub struct DeleteArgs {
    /// Runs to delete
    #[arg(required = true)]
    pub run_ids: Vec<String>,

    /// Skip the recycle bin and delete the directories now
    #[arg(long)]
    pub purge: bool,

    /// Reason recorded on the tombstone
    #[arg(long)]
    pub reason: Option<String>,
}

pub fn run(args: DeleteArgs, ctx: Context) -> Result<(), ExitError> {
    crate::logging::init(&ctx.config.viewer.log_level);

    let ids: Vec<String> = args
        .run_ids
        .iter()
        .map(|raw| {
            RunId::parse(raw)
                .map(|id| id.to_string())
                .map_err(|e| ExitError::usage(e.to_string()))
        })
        .collect::<Result<_, _>>()?;

    let pool = ctx.open_pool()?;
    // The mirror may be cold (fresh checkout, manual runs); index first so
    // soft delete can find its rows
    rn_storage::reconcile(
        &ctx.layout(),
        &pool,
        &SystemClock,
        ctx.config.storage.zombie_threshold_hours,
    )
    .map_err(|e| ExitError::general(e.to_string()))?;

    let bin = RecycleBin::new(ctx.layout(), pool);
    let deleted = bin
        .soft_delete(&ids, args.reason.as_deref(), &SystemClock)
        .map_err(|e| ExitError::general(e.to_string()))?;
    println!("soft-deleted {} runs", deleted);

    if args.purge {
        let store = ctx.open_store()?;
        let report = bin
            .purge_runs(&ids, &store)
            .map_err(|e| ExitError::general(e.to_string()))?;
        println!(
            "purged {} runs ({} blobs freed)",
            report.removed_runs, report.gc.deleted
        );
    }
    Ok(())
}
