// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runicorn manage`: storage maintenance

use crate::context::Context;
use crate::exit_error::ExitError;
use clap::{Args, Subcommand};
use rn_archive::scan_live_digests;
use rn_core::{format_elapsed, SystemClock};
use rn_storage::db::experiments::{self, DeletedFilter, RunFilter};

#[derive(Args)]
pub struct ManageArgs {
    #[command(subcommand)]
    pub command: ManageCommand,
}

#[derive(Subcommand)]
pub enum ManageCommand {
    /// List mirrored runs
    List {
        /// Restrict to a path prefix
        #[arg(long)]
        path: Option<String>,
        /// Include soft-deleted runs
        #[arg(long)]
        all: bool,
    },
    /// Storage statistics: runs, blobs, bytes
    Stats,
    /// Drop the mirror database and reindex from the filesystem
    Rebuild,
    /// Run one zombie sweep now
    Sweep,
    /// Delete blobs referenced by no asset manifest
    Gc,
    /// Re-hash every referenced blob, quarantining corrupt ones
    Verify,
}

pub fn run(args: ManageArgs, ctx: Context) -> Result<(), ExitError> {
    crate::logging::init(&ctx.config.viewer.log_level);
    match args.command {
        ManageCommand::List { path, all } => list(&ctx, path, all),
        ManageCommand::Stats => stats(&ctx),
        ManageCommand::Rebuild => rebuild(&ctx),
        ManageCommand::Sweep => sweep(&ctx),
        ManageCommand::Gc => gc(&ctx),
        ManageCommand::Verify => verify(&ctx),
    }
}

fn list(ctx: &Context, path: Option<String>, all: bool) -> Result<(), ExitError> {
    let pool = ctx.open_pool()?;
    let filter = RunFilter {
        path,
        deleted: if all { DeletedFilter::All } else { DeletedFilter::Live },
        per_page: 1000,
        ..Default::default()
    };
    let (rows, total) = pool
        .with_read(|conn| experiments::list(conn, &filter))
        .map_err(|e| ExitError::general(e.to_string()))?;

    println!("{:<24} {:<28} {:<12} {:>8} {:>10}", "RUN", "PATH", "STATUS", "METRICS", "DURATION");
    for row in &rows {
        let duration = row
            .duration_seconds
            .map(|s| format_elapsed(s as u64))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:<28} {:<12} {:>8} {:>10}",
            row.run_id, row.path, row.status, row.metric_count, duration
        );
    }
    println!("{} runs", total);
    Ok(())
}

fn stats(ctx: &Context) -> Result<(), ExitError> {
    let pool = ctx.open_pool()?;
    let store = ctx.open_store()?;

    let (_, total) = pool
        .with_read(|conn| {
            experiments::list(
                conn,
                &RunFilter { deleted: DeletedFilter::All, per_page: 1, ..Default::default() },
            )
        })
        .map_err(|e| ExitError::general(e.to_string()))?;
    let blob_stats = store.stats().map_err(|e| ExitError::general(e.to_string()))?;

    println!("storage root: {}", ctx.storage_root.display());
    println!("runs:         {}", total);
    println!("blobs:        {}", blob_stats.blobs);
    println!("blob bytes:   {}", blob_stats.total_bytes);
    Ok(())
}

fn rebuild(ctx: &Context) -> Result<(), ExitError> {
    let layout = ctx.layout();
    // The mirror is only a cache; dropping it loses nothing
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(
            layout.db_path().with_file_name(format!("runicorn.db{}", suffix)),
        );
    }
    let pool = ctx.open_pool()?;
    let report = rn_storage::reconcile(
        &layout,
        &pool,
        &SystemClock,
        ctx.config.storage.zombie_threshold_hours,
    )
    .map_err(|e| ExitError::general(e.to_string()))?;
    println!("rebuilt mirror: {} runs indexed", report.upserted);
    Ok(())
}

fn sweep(ctx: &Context) -> Result<(), ExitError> {
    let pool = ctx.open_pool()?;
    rn_storage::reconcile(
        &ctx.layout(),
        &pool,
        &SystemClock,
        ctx.config.storage.zombie_threshold_hours,
    )
    .map_err(|e| ExitError::general(e.to_string()))
    .map(|report| {
        println!("{} zombie runs marked interrupted", report.zombies);
    })
}

fn gc(ctx: &Context) -> Result<(), ExitError> {
    let store = ctx.open_store()?;
    let live = scan_live_digests(&ctx.storage_root)
        .map_err(|e| ExitError::general(e.to_string()))?;
    let report = store.gc(&live).map_err(|e| ExitError::general(e.to_string()))?;
    println!(
        "scanned {} blobs, deleted {} ({} bytes freed)",
        report.scanned, report.deleted, report.freed_bytes
    );
    Ok(())
}

fn verify(ctx: &Context) -> Result<(), ExitError> {
    let store = ctx.open_store()?;
    let live = scan_live_digests(&ctx.storage_root)
        .map_err(|e| ExitError::general(e.to_string()))?;

    let mut ok = 0usize;
    let mut corrupt = 0usize;
    let mut missing = 0usize;
    for digest in &live {
        match store.verify(digest) {
            Ok(()) => ok += 1,
            Err(rn_archive::ArchiveError::CorruptBlob { .. }) => corrupt += 1,
            Err(rn_archive::ArchiveError::BlobNotFound(_)) => missing += 1,
            Err(e) => return Err(ExitError::general(e.to_string())),
        }
    }
    println!("verified {} blobs: {} ok, {} corrupt, {} missing", live.len(), ok, corrupt, missing);
    if corrupt > 0 || missing > 0 {
        return Err(ExitError::general("blob verification found problems"));
    }
    Ok(())
}
