/// Export driver: resolves districts, builds composite or slope-class jobs,
/// and submits them to the local backend.
///
/// Typical use:
///   geoexport --catalog data/catalog.json --preset composites_s2 --output exports
///   geoexport --catalog data/catalog.json --config my_run.json --plan plan.json
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use geoexport_core::backend::{Catalog, LocalBackend, Task, TaskState};
use geoexport_core::config::{PipelineConfig, PRESETS};
use geoexport_core::logging::init_logging;
use geoexport_core::pipeline::{run, RunSummary};

#[derive(Parser, Debug)]
#[command(name = "geoexport", about = "Submit district composite / slope-class exports")]
struct Args {
    /// Built-in product preset
    #[arg(long, default_value = "composites_s2", conflicts_with = "config")]
    preset: String,

    /// Pipeline config JSON (overrides --preset)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Local backend catalog JSON
    #[arg(long, env = "GEOEXPORT_CATALOG")]
    catalog: PathBuf,

    /// Output root; exports land in <output>/<folder>/
    #[arg(short, long, default_value = "exports")]
    output: PathBuf,

    /// Replace the configured target district names
    #[arg(long = "target")]
    targets: Vec<String>,

    /// Write the submitted jobs to this file instead of running them
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Plan<'a> {
    summary: &'a RunSummary,
    tasks: &'a [Task],
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Cannot load config {}", path.display()))?,
        None => match PipelineConfig::preset(&args.preset) {
            Some(cfg) => cfg,
            None => bail!("Unknown preset '{}' (expected one of: {})", args.preset, PRESETS.join(", ")),
        },
    };
    if !args.targets.is_empty() {
        cfg.boundary.targets = args.targets.clone();
    }
    Ok(cfg)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let cfg = load_config(&args)?;
    let catalog = Catalog::from_json_file(&args.catalog)
        .with_context(|| format!("Cannot read catalog {}", args.catalog.display()))?;
    let mut backend = LocalBackend::new(catalog, &args.output);

    let summary = run(&mut backend, &cfg).context("Pipeline failed")?;

    if let Some(path) = &args.plan {
        let plan = Plan { summary: &summary, tasks: backend.tasks() };
        fs::write(path, serde_json::to_string_pretty(&plan)?)
            .with_context(|| format!("Write failed: {}", path.display()))?;
        info!(path = %path.display(), tasks = backend.tasks().len(), "plan written");
        return Ok(());
    }

    let completed = backend.run_pending();
    eprintln!(
        "[geoexport] {} regions, {} submitted, {} skipped, {} completed",
        summary.regions.len(),
        summary.submitted(),
        summary.skipped(),
        completed
    );
    let failed: Vec<&Task> = backend
        .tasks()
        .iter()
        .filter(|t| matches!(t.state, TaskState::Failed { .. }))
        .collect();
    for task in &failed {
        if let TaskState::Failed { message } = &task.state {
            eprintln!("  [fail] {} ({}): {}", task.id, task.job.file_name_prefix, message);
        }
    }
    if !failed.is_empty() {
        bail!("{} of {} exports failed", failed.len(), backend.tasks().len());
    }
    Ok(())
}
