//! Export dispatch: naming, the empty-input short circuit, and job submission.
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{Backend, TaskId};
use crate::config::{CompositeConfig, ExportSettings, SlopeConfig};
use crate::error::Result;
use crate::expr::{ImageCollectionExpr, ImageExpr};
use crate::geometry::Geometry;
use crate::region::Region;

/// Everything a backend needs to write one raster artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    pub image: ImageExpr,
    /// Task name shown by the backend's job tracker.
    pub description: String,
    pub folder: String,
    pub file_name_prefix: String,
    pub region: Geometry,
    /// Output resolution in metres.
    pub scale: f64,
    pub crs: String,
    pub max_pixels: f64,
}

/// Replace path separators so a region name is safe inside a file name.
pub fn sanitize_name(name: &str) -> String {
    name.replace(['/', '\\'], "-")
}

/// `<sanitized>_<year>_<suffix>`, or `<sanitized>_<suffix>` without a year.
pub fn file_base(region_name: &str, year: Option<i32>, suffix: &str) -> String {
    let name = sanitize_name(region_name);
    match year {
        Some(y) => format!("{name}_{y}_{suffix}"),
        None => format!("{name}_{suffix}"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Submitted { task_id: TaskId, file_base: String },
    Skipped { file_base: String, reason: String },
}

impl DispatchOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, DispatchOutcome::Submitted { .. })
    }
}

/// Builds and submits export jobs under one set of export settings.
/// Holds no state between calls.
pub struct ExportDispatcher<'a> {
    settings: &'a ExportSettings,
}

impl<'a> ExportDispatcher<'a> {
    pub fn new(settings: &'a ExportSettings) -> Self {
        Self { settings }
    }

    pub fn job(&self, image: ImageExpr, region: &Region, base: &str, scale: f64) -> ExportJob {
        ExportJob {
            image,
            description: base.to_string(),
            folder: self.settings.folder.clone(),
            file_name_prefix: base.to_string(),
            region: region.geometry.clone(),
            scale,
            crs: self.settings.crs.clone(),
            max_pixels: self.settings.max_pixels,
        }
    }

    fn submit<B: Backend>(&self, backend: &mut B, job: ExportJob) -> Result<DispatchOutcome> {
        let file_base = job.file_name_prefix.clone();
        let task_id = backend.submit(job)?;
        info!(task = %task_id, file = %file_base, backend = backend.name(), "export submitted");
        Ok(DispatchOutcome::Submitted { task_id, file_base })
    }

    /// Export one (region, year) composite.
    ///
    /// With `skip_empty`, the collection is sized first and nothing is
    /// submitted when it is empty. `reduce` is only called once the
    /// collection is known to be non-empty (or the check is disabled).
    pub fn dispatch_composite<B: Backend>(
        &self,
        backend: &mut B,
        region: &Region,
        year: i32,
        collection: &ImageCollectionExpr,
        reduce: impl FnOnce(&ImageCollectionExpr) -> ImageExpr,
        product: &CompositeConfig,
    ) -> Result<DispatchOutcome> {
        let base = file_base(&region.name, Some(year), &product.suffix);
        if product.skip_empty {
            let n = backend.size(collection)?;
            debug!(region = %region.name, year, images = n, "collection size");
            if n == 0 {
                warn!(region = %region.name, year, "skipping export: no images after filters");
                return Ok(DispatchOutcome::Skipped {
                    file_base: base,
                    reason: "no images after filters".into(),
                });
            }
        }
        let job = self.job(reduce(collection), region, &base, product.scale);
        self.submit(backend, job)
    }

    /// Export one region's clip of a region-independent image.
    pub fn dispatch_region<B: Backend>(
        &self,
        backend: &mut B,
        region: &Region,
        image: &ImageExpr,
        product: &SlopeConfig,
    ) -> Result<DispatchOutcome> {
        let base = file_base(&region.name, None, &product.suffix);
        let job = self.job(image.clone().clip(&region.geometry), region, &base, product.scale);
        self.submit(backend, job)
    }
}
