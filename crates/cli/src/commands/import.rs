// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runicorn import`: unpack an export bundle into the storage root

use crate::commands::export::BUNDLE_MANIFEST;
use crate::context::Context;
use crate::exit_error::ExitError;
use clap::Args;
use rn_core::SystemClock;
use std::path::PathBuf;

#[derive(Args)]
pub struct ImportArgs {
    /// Bundle produced by `runicorn export`
    pub bundle: PathBuf,

    /// Overwrite run directories that already exist
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: ImportArgs, ctx: Context) -> Result<(), ExitError> {
    crate::logging::init(&ctx.config.viewer.log_level);

    std::fs::create_dir_all(&ctx.storage_root)
        .map_err(|e| ExitError::general(e.to_string()))?;
    let imported = unpack(&args, &ctx).map_err(|e| ExitError::general(e.to_string()))?;

    // Index what just landed
    let pool = ctx.open_pool()?;
    rn_storage::reconcile(
        &ctx.layout(),
        &pool,
        &SystemClock,
        ctx.config.storage.zombie_threshold_hours,
    )
    .map_err(|e| ExitError::general(e.to_string()))?;

    println!("imported {} files into {}", imported, ctx.storage_root.display());
    Ok(())
}

fn unpack(args: &ImportArgs, ctx: &Context) -> anyhow::Result<usize> {
    let file = std::fs::File::open(&args.bundle)?;
    let mut bundle = zip::ZipArchive::new(file)?;

    let mut written = 0usize;
    for i in 0..bundle.len() {
        let mut entry = bundle.by_index(i)?;
        if entry.name() == BUNDLE_MANIFEST || entry.is_dir() {
            continue;
        }
        // enclosed_name rejects absolute paths and traversal
        let Some(rel) = entry.enclosed_name() else {
            anyhow::bail!("bundle entry escapes the storage root: {:?}", entry.name());
        };
        let target = ctx.storage_root.join(rel);
        if target.exists() && !args.force {
            anyhow::bail!(
                "refusing to overwrite {} (use --force)",
                target.display()
            );
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
        written += 1;
    }
    Ok(written)
}
