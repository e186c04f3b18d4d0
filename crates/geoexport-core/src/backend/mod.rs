//! The seam between pipeline code and whatever evaluates expressions.
//!
//! A backend resolves boundary queries, sizes filtered collections (the only
//! blocking round-trip in a run), and accepts export jobs. Submission only
//! enqueues: completion is tracked by the backend, never by the caller.
pub mod local;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::export::ExportJob;
use crate::expr::{FeatureCollectionExpr, Filterable, ImageCollectionExpr};
use crate::geometry::{BBox, Geometry};

pub use local::{Catalog, CatalogImage, LocalBackend, Task, TaskState};

/// Backend-assigned export task identifier.
pub type TaskId = String;

/// A boundary feature: attribute table row plus polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    pub geometry: Geometry,
}

impl Feature {
    pub fn string_property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }
}

impl Filterable for Feature {
    fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    fn footprint(&self) -> Option<BBox> {
        Some(self.geometry.bbox())
    }

    fn date(&self) -> Option<NaiveDate> {
        None
    }
}

pub trait Backend {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Materialize a boundary query.
    fn features(&self, expr: &FeatureCollectionExpr) -> Result<Vec<Feature>>;

    /// Number of elements in a filtered collection. Blocks until the backend answers.
    fn size(&self, expr: &ImageCollectionExpr) -> Result<usize>;

    /// Enqueue an export job and return its task id without waiting for it.
    fn submit(&mut self, job: ExportJob) -> Result<TaskId>;
}
