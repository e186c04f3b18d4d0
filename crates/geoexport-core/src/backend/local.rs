//! In-process backend over a JSON catalog of small rasters.
//!
//! Evaluates the same expression graph a hosted backend would, on rasters
//! that share one grid per collection. Exports are queued on `submit` and
//! written by [`LocalBackend::run_pending`].
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
#[cfg(feature = "threading")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Backend, Feature, TaskId};
use crate::error::{GeoExportError, Result};
use crate::export::ExportJob;
use crate::expr::{FeatureCollectionExpr, Filterable, ImageCollectionExpr, ImageExpr};
use crate::geometry::BBox;
use crate::io;
use crate::raster::Raster;
use crate::terrain::slope_degrees;

// ── Catalog ───────────────────────────────────────────────────────────────────

/// One time-stamped element of an image collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogImage {
    pub id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    pub raster: Raster,
}

impl Filterable for CatalogImage {
    fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    fn footprint(&self) -> Option<BBox> {
        Some(self.raster.bbox())
    }

    fn date(&self) -> Option<NaiveDate> {
        Some(self.date)
    }
}

/// Everything the local backend can look up, keyed by dataset id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub feature_collections: BTreeMap<String, Vec<Feature>>,
    #[serde(default)]
    pub image_collections: BTreeMap<String, Vec<CatalogImage>>,
    #[serde(default)]
    pub images: BTreeMap<String, Raster>,
}

impl Catalog {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

// ── Tasks ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    Ready,
    Completed { path: PathBuf },
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub job: ExportJob,
    pub state: TaskState,
}

// ── Backend ───────────────────────────────────────────────────────────────────

pub struct LocalBackend {
    catalog: Catalog,
    output_root: PathBuf,
    tasks: Vec<Task>,
}

impl LocalBackend {
    /// Exports land under `output_root/<folder>/`.
    pub fn new(catalog: Catalog, output_root: impl Into<PathBuf>) -> Self {
        Self { catalog, output_root: output_root.into(), tasks: Vec::new() }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    fn collection(&self, id: &str) -> Result<&[CatalogImage]> {
        self.catalog
            .image_collections
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| GeoExportError::UnknownDataset(id.to_string()))
    }

    /// Elements passing every filter, in catalog order.
    fn matching<'a>(&'a self, expr: &ImageCollectionExpr) -> Result<Vec<&'a CatalogImage>> {
        Ok(self
            .collection(&expr.source)?
            .iter()
            .filter(|img| expr.filters.iter().all(|f| f.matches(*img)))
            .collect())
    }

    /// Filtered elements with the mask and band selection applied.
    pub fn materialize(&self, expr: &ImageCollectionExpr) -> Result<Vec<Raster>> {
        self.matching(expr)?
            .into_iter()
            .map(|img| {
                let mut raster = img.raster.clone();
                if let Some(mask) = &expr.mask {
                    let qa_index = raster
                        .bands
                        .iter()
                        .position(|b| b.name == mask.band)
                        .ok_or_else(|| GeoExportError::UnknownBand {
                            source_id: img.id.clone(),
                            band: mask.band.clone(),
                        })?;
                    let clear: Vec<bool> =
                        raster.bands[qa_index].data.iter().map(|&qa| mask.is_clear_sample(qa)).collect();
                    for band in &mut raster.bands {
                        for (v, &ok) in band.data.iter_mut().zip(&clear) {
                            if !ok {
                                *v = f32::NAN;
                            }
                        }
                    }
                }
                match &expr.bands {
                    Some(bands) => raster.select(bands, &img.id),
                    None => Ok(raster),
                }
            })
            .collect()
    }

    /// Materialize an image expression.
    pub fn evaluate(&self, expr: &ImageExpr) -> Result<Raster> {
        match expr {
            ImageExpr::Load { id } => self
                .catalog
                .images
                .get(id)
                .cloned()
                .ok_or_else(|| GeoExportError::UnknownDataset(id.clone())),
            ImageExpr::Median { collection } => median(&self.materialize(collection)?, &collection.source),
            ImageExpr::Mosaic { collection } => mosaic(&self.materialize(collection)?, &collection.source),
            ImageExpr::Select { image, bands } => self.evaluate(image)?.select(bands, "image"),
            ImageExpr::Slope { image } => slope_degrees(&self.evaluate(image)?),
            ImageExpr::Tan { image } => {
                let mut r = self.evaluate(image)?;
                r.map_values(|v| (v as f64).to_radians().tan() as f32);
                Ok(r)
            }
            ImageExpr::Multiply { image, factor } => {
                let mut r = self.evaluate(image)?;
                r.map_values(|v| (v as f64 * factor) as f32);
                Ok(r)
            }
            ImageExpr::Classify { image, thresholds } => {
                let mut r = self.evaluate(image)?;
                r.map_values(|v| thresholds.classify(v) as f32);
                Ok(r)
            }
            ImageExpr::ToInt { image } => {
                let mut r = self.evaluate(image)?;
                r.map_values(f32::trunc);
                Ok(r)
            }
            ImageExpr::Clip { image, geometry } => {
                let mut r = self.evaluate(image)?;
                r.clip(geometry);
                Ok(r)
            }
        }
    }

    /// Evaluate one job, crop it to the region's extent and write its
    /// artifact: always `<prefix>.json`, plus `<prefix>.tif` for single-band
    /// results.
    fn execute(&self, job: &ExportJob) -> Result<PathBuf> {
        let region = job.region.bbox();
        let raster = self.evaluate(&job.image)?.crop(&region).ok_or_else(|| {
            GeoExportError::EmptyInput(format!("region of {} does not overlap the image", job.file_name_prefix))
        })?;
        let pixels = (raster.width * raster.height) as f64;
        if pixels > job.max_pixels {
            return Err(GeoExportError::PixelBudgetExceeded { pixels, max_pixels: job.max_pixels });
        }
        let dir = self.output_root.join(&job.folder);
        fs::create_dir_all(&dir)?;
        let json_path = dir.join(format!("{}.json", job.file_name_prefix));
        io::write_raster(&json_path, &raster)?;
        if raster.bands.len() == 1 {
            io::write_raster(&dir.join(format!("{}.tif", job.file_name_prefix)), &raster)?;
        }
        Ok(json_path)
    }

    /// Run every queued task. Each task succeeds or fails on its own; a
    /// failure is recorded on the task and never stops the others.
    /// Returns the number of tasks that completed.
    pub fn run_pending(&mut self) -> usize {
        let ready: Vec<usize> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.state == TaskState::Ready)
            .map(|(i, _)| i)
            .collect();

        #[cfg(feature = "threading")]
        let results: Vec<(usize, Result<PathBuf>)> =
            ready.par_iter().map(|&i| (i, self.execute(&self.tasks[i].job))).collect();
        #[cfg(not(feature = "threading"))]
        let results: Vec<(usize, Result<PathBuf>)> =
            ready.iter().map(|&i| (i, self.execute(&self.tasks[i].job))).collect();

        let mut completed = 0;
        for (i, result) in results {
            let task = &mut self.tasks[i];
            task.state = match result {
                Ok(path) => {
                    completed += 1;
                    info!(task = %task.id, path = %path.display(), "export completed");
                    TaskState::Completed { path }
                }
                Err(e) => {
                    warn!(task = %task.id, error = %e, "export failed");
                    TaskState::Failed { message: e.to_string() }
                }
            };
        }
        completed
    }
}

impl Backend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    fn features(&self, expr: &FeatureCollectionExpr) -> Result<Vec<Feature>> {
        let features = self
            .catalog
            .feature_collections
            .get(&expr.dataset)
            .ok_or_else(|| GeoExportError::UnknownDataset(expr.dataset.clone()))?;
        Ok(features
            .iter()
            .filter(|f| expr.filters.iter().all(|flt| flt.matches(*f)))
            .cloned()
            .collect())
    }

    fn size(&self, expr: &ImageCollectionExpr) -> Result<usize> {
        let n = self.matching(expr)?.len();
        debug!(source = %expr.source, size = n, "sized collection");
        Ok(n)
    }

    /// A job writing to the same folder and prefix as an earlier task is
    /// queued as failed so it never overwrites that task's artifact.
    fn submit(&mut self, job: ExportJob) -> Result<TaskId> {
        let id = format!("task-{:04}", self.tasks.len() + 1);
        let state = match self
            .tasks
            .iter()
            .find(|t| t.job.folder == job.folder && t.job.file_name_prefix == job.file_name_prefix)
        {
            Some(earlier) => {
                let e = GeoExportError::DuplicateExport(format!(
                    "{}/{} already written by {}",
                    job.folder, job.file_name_prefix, earlier.id
                ));
                warn!(task = %id, error = %e, "export rejected");
                TaskState::Failed { message: e.to_string() }
            }
            None => TaskState::Ready,
        };
        self.tasks.push(Task { id: id.clone(), job, state });
        Ok(id)
    }
}

// ── Reductions ────────────────────────────────────────────────────────────────

fn check_grids(rasters: &[Raster], source: &str) -> Result<()> {
    let Some(first) = rasters.first() else {
        return Err(GeoExportError::EmptyInput(format!("collection {source} is empty after filters")));
    };
    for r in &rasters[1..] {
        if !r.same_grid(first) || r.bands.len() != first.bands.len() {
            return Err(GeoExportError::GridMismatch(format!(
                "elements of {source} do not share one grid and band set"
            )));
        }
    }
    Ok(())
}

/// Median of the finite values; mean of the two middle values when even.
fn median_of(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return f32::NAN;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Per-band, per-pixel median, skipping masked samples.
fn median(rasters: &[Raster], source: &str) -> Result<Raster> {
    check_grids(rasters, source)?;
    let mut out = rasters[0].clone();
    let mut samples = Vec::with_capacity(rasters.len());
    for b in 0..out.bands.len() {
        for i in 0..out.width * out.height {
            samples.clear();
            samples.extend(rasters.iter().map(|r| r.bands[b].data[i]).filter(|v| !v.is_nan()));
            out.bands[b].data[i] = median_of(&mut samples);
        }
    }
    Ok(out)
}

/// Later elements are drawn on top; masked samples show what lies beneath.
fn mosaic(rasters: &[Raster], source: &str) -> Result<Raster> {
    check_grids(rasters, source)?;
    let mut out = rasters[0].clone();
    for r in &rasters[1..] {
        for (dst, src) in out.bands.iter_mut().zip(&r.bands) {
            for (d, &s) in dst.data.iter_mut().zip(&src.data) {
                if !s.is_nan() {
                    *d = s;
                }
            }
        }
    }
    Ok(out)
}
