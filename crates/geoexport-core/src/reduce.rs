//! Reducers: per-region median composites and the region-independent
//! slope-class image.
use crate::config::{CompositeConfig, ElevationSource, SlopeConfig};
use crate::expr::{ImageCollectionExpr, ImageExpr};
use crate::geometry::Geometry;

/// Median of `collection`, clipped to `geom`.
/// When bands were not selected on the collection they are selected on the
/// reduced image instead.
pub fn median_composite(cfg: &CompositeConfig, collection: &ImageCollectionExpr, geom: &Geometry) -> ImageExpr {
    let median = collection.clone().median();
    let image = if collection.bands.is_some() { median } else { median.select(&cfg.bands) };
    image.clip(geom)
}

/// The elevation image named by `source`.
pub fn elevation(source: &ElevationSource) -> ImageExpr {
    match source {
        ElevationSource::Image { id, band: Some(band) } => ImageExpr::load(id).select(&[band.clone()]),
        ElevationSource::Image { id, band: None } => ImageExpr::load(id),
        ElevationSource::Mosaic { collection } => ImageCollectionExpr::new(collection).mosaic(),
    }
}

/// Slope (degrees) → percent slope (`tan · 100`) → integer classes.
pub fn slope_classes(cfg: &SlopeConfig) -> ImageExpr {
    elevation(&cfg.elevation)
        .slope()
        .tan()
        .multiply(100.0)
        .classify(&cfg.thresholds)
        .to_int()
}
