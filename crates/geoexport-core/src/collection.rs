//! Seasonal collection filter for one (geometry, year).
use crate::config::CompositeConfig;
use crate::error::Result;
use crate::expr::{Filter, ImageCollectionExpr};
use crate::geometry::Geometry;

/// Images intersecting `geom`, acquired inside the configured window of
/// `year`, with cloud cover strictly below the threshold. The quality mask
/// and band selection are attached when configured.
pub fn seasonal_collection(cfg: &CompositeConfig, geom: &Geometry, year: i32) -> Result<ImageCollectionExpr> {
    let (start, end) = cfg.window.range(year)?;
    let mut ic = ImageCollectionExpr::new(&cfg.collection)
        .filter_bounds(geom)
        .filter_date(start, end)
        .filter(Filter::lt(&cfg.cloud_property, cfg.max_cloud_pct));
    if let Some(mask) = &cfg.quality_mask {
        ic = ic.map_mask(mask.clone());
    }
    if cfg.select_before_reduce {
        ic = ic.select(&cfg.bands);
    }
    Ok(ic)
}
