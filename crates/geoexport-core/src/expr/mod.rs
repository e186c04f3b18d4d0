//! Deferred computation graphs.
//!
//! Expressions are plain values: building one performs no I/O and the same
//! inputs always build the same graph. A [`Backend`](crate::backend::Backend)
//! materializes them.
pub mod filter;
pub mod mask;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;
use crate::terrain::SlopeThresholds;
pub use filter::{Filter, Filterable};
pub use mask::QualityMask;

/// A filtered view of a boundary (vector) dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollectionExpr {
    pub dataset: String,
    pub filters: Vec<Filter>,
}

impl FeatureCollectionExpr {
    pub fn new(dataset: &str) -> Self {
        Self { dataset: dataset.into(), filters: Vec::new() }
    }

    pub fn filter(mut self, f: Filter) -> Self {
        self.filters.push(f);
        self
    }
}

/// A filtered, optionally masked and band-selected view of an image collection.
/// Filters apply in order, then the mask, then band selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageCollectionExpr {
    pub source: String,
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<QualityMask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bands: Option<Vec<String>>,
}

impl ImageCollectionExpr {
    pub fn new(source: &str) -> Self {
        Self { source: source.into(), filters: Vec::new(), mask: None, bands: None }
    }

    pub fn filter(mut self, f: Filter) -> Self {
        self.filters.push(f);
        self
    }

    pub fn filter_bounds(self, geometry: &Geometry) -> Self {
        self.filter(Filter::Bounds { geometry: geometry.clone() })
    }

    pub fn filter_date(self, start: NaiveDate, end: NaiveDate) -> Self {
        self.filter(Filter::Date { start, end })
    }

    pub fn map_mask(mut self, mask: QualityMask) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn select(mut self, bands: &[String]) -> Self {
        self.bands = Some(bands.to_vec());
        self
    }

    pub fn median(self) -> ImageExpr {
        ImageExpr::Median { collection: self }
    }

    pub fn mosaic(self) -> ImageExpr {
        ImageExpr::Mosaic { collection: self }
    }
}

/// A single-image computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ImageExpr {
    Load { id: String },
    Median { collection: ImageCollectionExpr },
    Mosaic { collection: ImageCollectionExpr },
    Select { image: Box<ImageExpr>, bands: Vec<String> },
    /// Terrain slope in degrees of the first band.
    Slope { image: Box<ImageExpr> },
    /// `tan` of every sample, input in degrees.
    Tan { image: Box<ImageExpr> },
    Multiply { image: Box<ImageExpr>, factor: f64 },
    /// Threshold classification into classes 1..=thresholds+1.
    Classify { image: Box<ImageExpr>, thresholds: SlopeThresholds },
    ToInt { image: Box<ImageExpr> },
    Clip { image: Box<ImageExpr>, geometry: Geometry },
}

impl ImageExpr {
    pub fn load(id: &str) -> Self {
        ImageExpr::Load { id: id.into() }
    }

    pub fn select(self, bands: &[String]) -> Self {
        ImageExpr::Select { image: Box::new(self), bands: bands.to_vec() }
    }

    pub fn slope(self) -> Self {
        ImageExpr::Slope { image: Box::new(self) }
    }

    pub fn tan(self) -> Self {
        ImageExpr::Tan { image: Box::new(self) }
    }

    pub fn multiply(self, factor: f64) -> Self {
        ImageExpr::Multiply { image: Box::new(self), factor }
    }

    pub fn classify(self, thresholds: &SlopeThresholds) -> Self {
        ImageExpr::Classify { image: Box::new(self), thresholds: thresholds.clone() }
    }

    pub fn to_int(self) -> Self {
        ImageExpr::ToInt { image: Box::new(self) }
    }

    pub fn clip(self, geometry: &Geometry) -> Self {
        ImageExpr::Clip { image: Box::new(self), geometry: geometry.clone() }
    }
}
