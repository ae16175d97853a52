// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runicorn export-data`: dump one run's metric series

use crate::context::Context;
use crate::exit_error::ExitError;
use clap::{Args, ValueEnum};
use rn_core::RunId;
use rn_engine::RunEvents;
use rn_storage::RunDir;
use serde_json::json;
use std::io::Write as _;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Csv,
    Json,
}

#[derive(Args)]
pub struct ExportDataArgs {
    /// Run to export
    #[arg(long, value_name = "RUN_ID")]
    pub run: String,

    #[arg(long, value_enum, default_value = "csv")]
    pub format: Format,

    /// Output file (default: stdout)
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

pub fn run(args: ExportDataArgs, ctx: Context) -> Result<(), ExitError> {
    crate::logging::init(&ctx.config.viewer.log_level);

    let run_id = RunId::parse(&args.run).map_err(|e| ExitError::usage(e.to_string()))?;
    let location = ctx
        .layout()
        .find_run(&run_id)
        .ok_or_else(|| ExitError::general(format!("run not found: {run_id}")))?;
    let events = RunEvents::parse_file(&RunDir::new(&location.dir).events_path())
        .map_err(|e| ExitError::general(e.to_string()))?;

    let rendered = match args.format {
        Format::Csv => render_csv(&events),
        Format::Json => render_json(&events)?,
    };

    match args.out {
        Some(path) => {
            std::fs::write(&path, rendered).map_err(|e| ExitError::general(e.to_string()))?;
            println!("wrote {} points to {}", events.points.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(rendered.as_bytes())
                .map_err(|e| ExitError::general(e.to_string()))?;
        }
    }
    Ok(())
}

fn render_csv(events: &RunEvents) -> String {
    let mut out = String::from("timestamp,step,name,value,stage\n");
    for point in &events.points {
        let value = point.value.map(|v| v.to_string()).unwrap_or_default();
        let stage = point.stage.as_deref().unwrap_or("");
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            point.ts, point.step, events.metric_names[point.name_idx], value, stage
        ));
    }
    out
}

fn render_json(events: &RunEvents) -> Result<String, ExitError> {
    let points: Vec<_> = events
        .points
        .iter()
        .map(|p| {
            json!({
                "timestamp": p.ts,
                "step": p.step,
                "name": events.metric_names[p.name_idx],
                "value": p.value,
                "stage": p.stage,
            })
        })
        .collect();
    serde_json::to_string_pretty(&json!({ "points": points }))
        .map_err(|e| ExitError::general(e.to_string()))
}
