//! Immutable pipeline configuration and the built-in product presets.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dates::DateWindow;
use crate::error::{GeoExportError, Result};
use crate::expr::QualityMask;
use crate::terrain::SlopeThresholds;

// ── Boundary selection ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryConfig {
    pub dataset: String,
    pub country_property: String,
    pub country: String,
    pub name_property: String,
    /// Admin-level-2 names to export.
    pub targets: Vec<String>,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            dataset: "FAO/GAUL/2015/level2".into(),
            country_property: "ADM0_NAME".into(),
            country: "Rwanda".into(),
            name_property: "ADM2_NAME".into(),
            targets: vec!["Gatsibo".into(), "Musanze".into()],
        }
    }
}

// ── Export settings ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Destination folder in durable storage.
    pub folder: String,
    pub crs: String,
    /// Safety ceiling on exported pixel count.
    pub max_pixels: f64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self { folder: "EarthEngine".into(), crs: "EPSG:4326".into(), max_pixels: 1e13 }
    }
}

// ── Products ──────────────────────────────────────────────────────────────────

/// Enumeration order of (region, year) pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopOrder {
    RegionMajor,
    YearMajor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeConfig {
    pub collection: String,
    pub years: Vec<i32>,
    pub window: DateWindow,
    pub cloud_property: String,
    /// Images must have `cloud_property < max_cloud_pct`.
    pub max_cloud_pct: f64,
    pub bands: Vec<String>,
    #[serde(default)]
    pub quality_mask: Option<QualityMask>,
    /// Select bands on the collection before the median (true), or on the
    /// reduced image after it (false).
    pub select_before_reduce: bool,
    /// Size-check each (region, year) and skip empty collections.
    pub skip_empty: bool,
    pub order: LoopOrder,
    pub suffix: String,
    /// Output resolution in metres.
    pub scale: f64,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            collection: "COPERNICUS/S2_SR_HARMONIZED".into(),
            years: (2018..=2023).collect(),
            window: DateWindow::default(),
            cloud_property: "CLOUDY_PIXEL_PERCENTAGE".into(),
            max_cloud_pct: 20.0,
            bands: ["B2", "B3", "B4", "B5", "B8", "B11"].iter().map(|b| b.to_string()).collect(),
            quality_mask: Some(QualityMask::qa60()),
            select_before_reduce: true,
            skip_empty: true,
            order: LoopOrder::RegionMajor,
            suffix: "S2".into(),
            scale: 10.0,
        }
    }
}

/// Where elevation comes from: one image, or the mosaic of a tile collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElevationSource {
    Image {
        id: String,
        #[serde(default)]
        band: Option<String>,
    },
    Mosaic { collection: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlopeConfig {
    pub elevation: ElevationSource,
    pub thresholds: SlopeThresholds,
    pub suffix: String,
    pub scale: f64,
}

impl Default for SlopeConfig {
    fn default() -> Self {
        Self {
            elevation: ElevationSource::Mosaic { collection: "COPERNICUS/DEM/GLO30".into() },
            thresholds: SlopeThresholds::default(),
            suffix: "SlopeClass".into(),
            scale: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Product {
    Composite(CompositeConfig),
    SlopeClasses(SlopeConfig),
}

// ── Top level ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub boundary: BoundaryConfig,
    #[serde(default)]
    pub export: ExportSettings,
    pub product: Product,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::composites_s2()
    }
}

/// Names accepted by [`PipelineConfig::preset`].
pub const PRESETS: &[&str] = &[
    "composites_s2",
    "composites_s2_legacy",
    "slope_classes_glo30",
    "slope_classes_nasadem",
    "slope_dem_glo30",
];

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl PipelineConfig {
    fn with_product(product: Product) -> Self {
        Self { boundary: BoundaryConfig::default(), export: ExportSettings::default(), product }
    }

    /// May–July QA60-masked median composites, 2018–2023, one per district-year.
    pub fn composites_s2() -> Self {
        Self::with_product(Product::Composite(CompositeConfig::default()))
    }

    /// The first composite script: unharmonized collection, no QA mask,
    /// median before band selection, no size check, year-major order.
    pub fn composites_s2_legacy() -> Self {
        Self::with_product(Product::Composite(CompositeConfig {
            collection: "COPERNICUS/S2_SR".into(),
            quality_mask: None,
            select_before_reduce: false,
            skip_empty: false,
            order: LoopOrder::YearMajor,
            ..CompositeConfig::default()
        }))
    }

    pub fn slope_classes_glo30() -> Self {
        Self::with_product(Product::SlopeClasses(SlopeConfig::default()))
    }

    pub fn slope_classes_nasadem() -> Self {
        Self::with_product(Product::SlopeClasses(SlopeConfig {
            elevation: ElevationSource::Image {
                id: "NASA/NASADEM_HGT/001".into(),
                band: Some("elevation".into()),
            },
            ..SlopeConfig::default()
        }))
    }

    pub fn slope_dem_glo30() -> Self {
        Self::with_product(Product::SlopeClasses(SlopeConfig {
            suffix: "slope_DEM".into(),
            ..SlopeConfig::default()
        }))
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "composites_s2" => Some(Self::composites_s2()),
            "composites_s2_legacy" => Some(Self::composites_s2_legacy()),
            "slope_classes_glo30" => Some(Self::slope_classes_glo30()),
            "slope_classes_nasadem" => Some(Self::slope_classes_nasadem()),
            "slope_dem_glo30" => Some(Self::slope_dem_glo30()),
            _ => None,
        }
    }

    /// Load and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(GeoExportError::InvalidConfig(msg));
        if self.boundary.dataset.is_empty() {
            return invalid("boundary dataset is empty".into());
        }
        if !positive(self.export.max_pixels) {
            return invalid(format!("max_pixels must be positive, got {}", self.export.max_pixels));
        }
        match &self.product {
            Product::Composite(c) => {
                if c.years.is_empty() {
                    return invalid("composite product has no years".into());
                }
                if c.bands.is_empty() {
                    return invalid("composite product selects no bands".into());
                }
                if !positive(c.scale) {
                    return invalid(format!("scale must be positive, got {}", c.scale));
                }
                for &year in &c.years {
                    c.window.range(year)?;
                }
            }
            Product::SlopeClasses(s) => {
                s.thresholds.validate()?;
                if !positive(s.scale) {
                    return invalid(format!("scale must be positive, got {}", s.scale));
                }
            }
        }
        Ok(())
    }
}
