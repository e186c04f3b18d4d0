//! Pipeline entry point: regions → collections → reduction → dispatch.
//!
//! Strictly sequential. The only blocking calls are the backend size checks;
//! submissions return as soon as the backend has queued them.
use serde::Serialize;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::collection::seasonal_collection;
use crate::config::{CompositeConfig, ElevationSource, LoopOrder, PipelineConfig, Product, SlopeConfig};
use crate::error::Result;
use crate::export::{file_base, DispatchOutcome, ExportDispatcher};
use crate::expr::ImageCollectionExpr;
use crate::reduce::{median_composite, slope_classes};
use crate::region::{select_regions, Region};

/// What happened to one (region[, year]) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRecord {
    pub region: String,
    pub year: Option<i32>,
    pub outcome: DispatchOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub regions: Vec<String>,
    pub records: Vec<ExportRecord>,
}

impl RunSummary {
    pub fn submitted(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_submitted()).count()
    }

    pub fn skipped(&self) -> usize {
        self.records.len() - self.submitted()
    }
}

/// (region, year) pairs in the configured enumeration order.
pub fn composite_pairs<'r>(regions: &'r [Region], years: &[i32], order: LoopOrder) -> Vec<(&'r Region, i32)> {
    match order {
        LoopOrder::RegionMajor => regions.iter().flat_map(|r| years.iter().map(move |&y| (r, y))).collect(),
        LoopOrder::YearMajor => years.iter().flat_map(|&y| regions.iter().map(move |r| (r, y))).collect(),
    }
}

/// Run `cfg` against `backend`. Returns once every job has been submitted
/// or skipped; export completion is left to the backend.
pub fn run<B: Backend>(backend: &mut B, cfg: &PipelineConfig) -> Result<RunSummary> {
    cfg.validate()?;
    let regions = select_regions(backend, &cfg.boundary)?;
    let dispatcher = ExportDispatcher::new(&cfg.export);
    let records = match &cfg.product {
        Product::Composite(c) => run_composites(backend, &dispatcher, &regions, c)?,
        Product::SlopeClasses(s) => run_slope_classes(backend, &dispatcher, &regions, s)?,
    };
    let summary = RunSummary { regions: regions.into_iter().map(|r| r.name).collect(), records };
    info!(
        backend = backend.name(),
        submitted = summary.submitted(),
        skipped = summary.skipped(),
        "pipeline finished"
    );
    Ok(summary)
}

fn run_composites<B: Backend>(
    backend: &mut B,
    dispatcher: &ExportDispatcher<'_>,
    regions: &[Region],
    cfg: &CompositeConfig,
) -> Result<Vec<ExportRecord>> {
    let mut records = Vec::new();
    for (region, year) in composite_pairs(regions, &cfg.years, cfg.order) {
        let collection = seasonal_collection(cfg, &region.geometry, year)?;
        let outcome = dispatcher.dispatch_composite(
            backend,
            region,
            year,
            &collection,
            |ic| median_composite(cfg, ic, &region.geometry),
            cfg,
        )?;
        records.push(ExportRecord { region: region.name.clone(), year: Some(year), outcome });
    }
    Ok(records)
}

fn run_slope_classes<B: Backend>(
    backend: &mut B,
    dispatcher: &ExportDispatcher<'_>,
    regions: &[Region],
    cfg: &SlopeConfig,
) -> Result<Vec<ExportRecord>> {
    // The slope image does not depend on the region, so a tile collection is
    // checked for emptiness once rather than per region.
    if let ElevationSource::Mosaic { collection } = &cfg.elevation {
        if backend.size(&ImageCollectionExpr::new(collection))? == 0 {
            warn!(collection = %collection, "elevation collection is empty; skipping every region");
            return Ok(regions
                .iter()
                .map(|r| ExportRecord {
                    region: r.name.clone(),
                    year: None,
                    outcome: DispatchOutcome::Skipped {
                        file_base: file_base(&r.name, None, &cfg.suffix),
                        reason: "elevation collection is empty".into(),
                    },
                })
                .collect());
        }
    }
    let image = slope_classes(cfg);
    regions
        .iter()
        .map(|region| {
            let outcome = dispatcher.dispatch_region(backend, region, &image, cfg)?;
            Ok(ExportRecord { region: region.name.clone(), year: None, outcome })
        })
        .collect()
}
