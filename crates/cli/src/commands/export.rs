// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runicorn export`: bundle run directories into a portable ZIP
//!
//! The bundle holds each run directory verbatim under its hierarchical
//! path, plus a manifest. `import` into an empty storage reproduces the
//! listing row-for-row after one reconciliation.

use crate::context::Context;
use crate::exit_error::ExitError;
use clap::Args;
use rn_core::{RunId, RunPath};
use rn_storage::RunLocation;
use serde_json::json;
use std::path::PathBuf;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Manifest entry name inside every bundle.
pub const BUNDLE_MANIFEST: &str = "runicorn-export.json";

#[derive(Args)]
pub struct ExportArgs {
    /// Output bundle path
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    /// Export only runs under this path prefix
    #[arg(long)]
    pub path: Option<String>,

    /// Specific run IDs (default: everything selected by --path)
    pub run_ids: Vec<String>,
}

pub fn run(args: ExportArgs, ctx: Context) -> Result<(), ExitError> {
    crate::logging::init(&ctx.config.viewer.log_level);

    let filter_path = args
        .path
        .as_deref()
        .map(RunPath::parse)
        .transpose()
        .map_err(|e| ExitError::usage(e.to_string()))?;
    let filter_ids: Vec<RunId> = args
        .run_ids
        .iter()
        .map(|raw| RunId::parse(raw).map_err(|e| ExitError::usage(e.to_string())))
        .collect::<Result<_, _>>()?;

    let layout = ctx.layout();
    let selected: Vec<RunLocation> = layout
        .discover_runs()
        .into_iter()
        .filter(|run| {
            if !filter_ids.is_empty() {
                return filter_ids.contains(&run.run_id);
            }
            match &filter_path {
                Some(prefix) => run.path.starts_with(prefix),
                None => true,
            }
        })
        .collect();
    if selected.is_empty() {
        return Err(ExitError::general("no runs matched the selection"));
    }

    write_bundle(&args.out, &selected).map_err(|e| ExitError::general(e.to_string()))?;
    println!("exported {} runs to {}", selected.len(), args.out.display());
    Ok(())
}

fn write_bundle(out: &PathBuf, runs: &[RunLocation]) -> anyhow::Result<()> {
    let file = std::fs::File::create(out)?;
    let mut bundle = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for run in runs {
        let prefix = format!("{}/{}", run.path, run.run_id);
        for entry in walkdir::WalkDir::new(&run.dir).follow_links(false) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(&run.dir)?;
            let name = format!(
                "{}/{}",
                prefix,
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            );
            bundle.start_file(name, options)?;
            let mut input = std::fs::File::open(entry.path())?;
            std::io::copy(&mut input, &mut bundle)?;
        }
    }

    let manifest = json!({
        "version": 1,
        "runs": runs
            .iter()
            .map(|r| json!({ "run_id": r.run_id.as_str(), "path": r.path.as_str() }))
            .collect::<Vec<_>>(),
    });
    bundle.start_file(BUNDLE_MANIFEST, options)?;
    use std::io::Write as _;
    bundle.write_all(&serde_json::to_vec_pretty(&manifest)?)?;
    bundle.finish()?;
    Ok(())
}
