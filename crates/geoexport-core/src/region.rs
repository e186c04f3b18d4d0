//! Region selection: named admin-level-2 boundaries for one country.
use tracing::{info, warn};

use crate::backend::Backend;
use crate::config::BoundaryConfig;
use crate::error::Result;
use crate::expr::{FeatureCollectionExpr, Filter};
use crate::geometry::Geometry;

/// A named boundary polygon, immutable once resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub geometry: Geometry,
}

/// The boundary query for `cfg`: country equality plus name membership.
pub fn boundary_query(cfg: &BoundaryConfig) -> FeatureCollectionExpr {
    FeatureCollectionExpr::new(&cfg.dataset)
        .filter(Filter::eq(&cfg.country_property, cfg.country.as_str()))
        .filter(Filter::in_list(&cfg.name_property, cfg.targets.iter().map(String::as_str)))
}

/// Resolve the configured target names into regions, in backend order.
///
/// Names with no matching feature are not an error; they are reported in a
/// warning and the selection simply comes back smaller (possibly empty).
pub fn select_regions<B: Backend>(backend: &B, cfg: &BoundaryConfig) -> Result<Vec<Region>> {
    let features = backend.features(&boundary_query(cfg))?;
    let regions: Vec<Region> = features
        .into_iter()
        .filter_map(|f| {
            let name = f.string_property(&cfg.name_property)?.to_string();
            Some(Region { name, geometry: f.geometry })
        })
        .collect();

    let missing: Vec<&str> = cfg
        .targets
        .iter()
        .filter(|t| !regions.iter().any(|r| &r.name == *t))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        warn!(dataset = %cfg.dataset, country = %cfg.country, ?missing, "target regions not found");
    }
    info!(count = regions.len(), "regions selected");
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Catalog, Feature, LocalBackend};
    use crate::geometry::BBox;
    use serde_json::json;

    fn feature(country: &str, name: &str) -> Feature {
        let mut f = Feature {
            properties: Default::default(),
            geometry: BBox::new(30.0, -2.0, 30.5, -1.5).to_geometry(),
        };
        f.properties.insert("ADM0_NAME".into(), json!(country));
        f.properties.insert("ADM2_NAME".into(), json!(name));
        f
    }

    fn backend() -> LocalBackend {
        let mut catalog = Catalog::default();
        catalog.feature_collections.insert(
            "FAO/GAUL/2015/level2".into(),
            vec![
                feature("Rwanda", "Gatsibo"),
                feature("Rwanda", "Nyagatare"),
                feature("Uganda", "Musanze"),
                feature("Rwanda", "Musanze"),
            ],
        );
        LocalBackend::new(catalog, std::env::temp_dir())
    }

    #[test]
    fn selects_targets_within_country() {
        let regions = select_regions(&backend(), &BoundaryConfig::default()).unwrap();
        let names: Vec<&str> = regions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Gatsibo", "Musanze"]);
    }

    #[test]
    fn unknown_names_yield_empty_selection() {
        let cfg = BoundaryConfig { targets: vec!["Atlantis".into()], ..BoundaryConfig::default() };
        let regions = select_regions(&backend(), &cfg).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn other_country_is_excluded() {
        let cfg = BoundaryConfig { country: "Uganda".into(), ..BoundaryConfig::default() };
        let regions = select_regions(&backend(), &cfg).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].name, "Musanze");
    }
}
