//! End-to-end runs of the export pipeline against a synthetic local catalog.
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::json;

use geoexport_core::backend::{Catalog, CatalogImage, Feature, LocalBackend, TaskState};
use geoexport_core::config::{CompositeConfig, PipelineConfig, Product};
use geoexport_core::export::DispatchOutcome;
use geoexport_core::geometry::BBox;
use geoexport_core::io::read_raster;
use geoexport_core::pipeline::{run, RunSummary};
use geoexport_core::raster::Raster;

const S2: &str = "COPERNICUS/S2_SR_HARMONIZED";
const S2_LEGACY: &str = "COPERNICUS/S2_SR";
const GLO30: &str = "COPERNICUS/DEM/GLO30";

fn gatsibo() -> BBox {
    BBox::new(30.0, -2.0, 30.5, -1.5)
}

fn rutsiro() -> BBox {
    BBox::new(29.0, -2.5, 29.4, -2.1)
}

fn district(name: &str, bbox: BBox) -> Feature {
    let mut properties = BTreeMap::new();
    properties.insert("ADM0_NAME".to_string(), json!("Rwanda"));
    properties.insert("ADM2_NAME".to_string(), json!(name));
    Feature { properties, geometry: bbox.to_geometry() }
}

fn scene(id: &str, date: (i32, u32, u32), cloud: f64, grid: BBox, size: usize, value: f32, qa: f32) -> CatalogImage {
    let mut raster = Raster::new(size, size, grid, &["B2", "B3", "B4", "B5", "B8", "B11", "QA60"], value);
    raster.bands[6].data = vec![qa; size * size];
    let mut properties = BTreeMap::new();
    properties.insert("CLOUDY_PIXEL_PERCENTAGE".to_string(), json!(cloud));
    CatalogImage {
        id: id.to_string(),
        date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        properties,
        raster,
    }
}

fn catalog() -> Catalog {
    let mut catalog = Catalog::default();
    catalog.feature_collections.insert(
        "FAO/GAUL/2015/level2".to_string(),
        vec![
            district("Gatsibo", gatsibo()),
            district("Rutsiro/East", rutsiro()),
            district("Musanze", BBox::new(29.5, -1.6, 29.8, -1.3)),
        ],
    );

    // Gatsibo's scenes extend past the district so clipping is visible.
    let wide = BBox::new(29.9, -2.1, 30.6, -1.4);
    let scenes = vec![
        scene("g-2020-a", (2020, 5, 12), 4.0, wide, 7, 10.0, 0.0),
        scene("g-2020-cloud", (2020, 6, 1), 8.0, wide, 7, 999.0, 1024.0),
        scene("g-2020-b", (2020, 7, 2), 12.0, wide, 7, 20.0, 0.0),
        // 2021: one too cloudy, one on the exclusive end date.
        scene("g-2021-cloudy", (2021, 6, 5), 50.0, wide, 7, 30.0, 0.0),
        scene("g-2021-late", (2021, 7, 31), 1.0, wide, 7, 30.0, 0.0),
        scene("r-2020", (2020, 6, 10), 3.0, rutsiro(), 4, 40.0, 0.0),
    ];
    catalog.image_collections.insert(S2.to_string(), scenes.clone());
    catalog.image_collections.insert(S2_LEGACY.to_string(), scenes);

    // A 6×6 tilted plane covering every district.
    let mut dem = Raster::new(6, 6, BBox::new(28.9, -2.6, 30.7, -1.2), &["DEM"], 0.0);
    for r in 0..6 {
        for c in 0..6 {
            dem.set(0, r, c, 1500.0 + 400.0 * c as f32);
        }
    }
    catalog.image_collections.insert(
        GLO30.to_string(),
        vec![CatalogImage {
            id: "glo30-tile".to_string(),
            date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            properties: BTreeMap::new(),
            raster: dem,
        }],
    );
    catalog
}

fn composite_config(years: Vec<i32>) -> PipelineConfig {
    let mut cfg = PipelineConfig::composites_s2();
    cfg.boundary.targets = vec!["Gatsibo".into(), "Rutsiro/East".into(), "Atlantis".into()];
    if let Product::Composite(c) = &mut cfg.product {
        c.years = years;
    }
    cfg
}

fn outcome<'a>(summary: &'a RunSummary, region: &str, year: i32) -> &'a DispatchOutcome {
    &summary
        .records
        .iter()
        .find(|r| r.region == region && r.year == Some(year))
        .unwrap()
        .outcome
}

#[test]
fn empty_years_are_skipped_and_names_sanitized() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = LocalBackend::new(catalog(), dir.path());
    let summary = run(&mut backend, &composite_config(vec![2020, 2021])).unwrap();

    assert_eq!(summary.regions, vec!["Gatsibo", "Rutsiro/East"]);
    assert_eq!(summary.records.len(), 4);
    assert_eq!(summary.submitted(), 2);
    assert_eq!(backend.tasks().len(), 2);

    assert!(matches!(
        outcome(&summary, "Rutsiro/East", 2020),
        DispatchOutcome::Submitted { file_base, .. } if file_base == "Rutsiro-East_2020_S2"
    ));
    assert!(matches!(
        outcome(&summary, "Gatsibo", 2021),
        DispatchOutcome::Skipped { file_base, .. } if file_base == "Gatsibo_2021_S2"
    ));
    for task in backend.tasks() {
        assert!(!task.job.file_name_prefix.contains(['/', '\\']));
        assert_eq!(task.job.scale, 10.0);
        assert_eq!(task.job.crs, "EPSG:4326");
        assert_eq!(task.job.max_pixels, 1e13);
        assert_eq!(task.job.folder, "EarthEngine");
    }
}

#[test]
fn composites_are_masked_medians_clipped_to_the_region() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = LocalBackend::new(catalog(), dir.path());
    run(&mut backend, &composite_config(vec![2020])).unwrap();
    assert_eq!(backend.run_pending(), 2);

    let out = dir.path().join("EarthEngine");
    let gatsibo = read_raster(&out.join("Gatsibo_2020_S2.json")).unwrap();
    assert_eq!(gatsibo.band_names(), vec!["B2", "B3", "B4", "B5", "B8", "B11"]);
    // Cropped from the 7×7 scene grid to the district's 5×5 window.
    assert_eq!((gatsibo.width, gatsibo.height), (5, 5));
    assert!((gatsibo.min_lon - 30.0).abs() < 1e-9 && (gatsibo.max_lat + 1.5).abs() < 1e-9);
    // Cloudy scene is masked out: median of 10 and 20.
    assert_eq!(gatsibo.get(2, 2, 2), 15.0);
    assert_eq!(gatsibo.valid_pixels(), 25);

    let rutsiro = read_raster(&out.join("Rutsiro-East_2020_S2.json")).unwrap();
    assert_eq!(rutsiro.get(0, 1, 1), 40.0);
    assert!(!out.join("Rutsiro-East_2020_S2.tif").exists());
}

#[test]
fn identical_inputs_yield_identical_jobs() {
    let jobs = || {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = LocalBackend::new(catalog(), dir.path());
        let summary = run(&mut backend, &composite_config(vec![2018, 2020, 2021])).unwrap();
        let jobs: Vec<_> = backend.tasks().iter().map(|t| t.job.clone()).collect();
        (summary, jobs)
    };
    assert_eq!(jobs(), jobs());
}

#[test]
fn legacy_variant_submits_without_size_check() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = LocalBackend::new(catalog(), dir.path());
    let mut cfg = PipelineConfig::composites_s2_legacy();
    cfg.boundary.targets = vec!["Gatsibo".into()];
    if let Product::Composite(c) = &mut cfg.product {
        *c = CompositeConfig { years: vec![2020, 2021], ..c.clone() };
    }
    let summary = run(&mut backend, &cfg).unwrap();
    assert_eq!(summary.submitted(), 2);

    // The empty 2021 job fails on its own; 2020 still completes.
    assert_eq!(backend.run_pending(), 1);
    let states: Vec<&TaskState> = backend.tasks().iter().map(|t| &t.state).collect();
    assert!(matches!(states[0], TaskState::Completed { .. }));
    assert!(matches!(states[1], TaskState::Failed { .. }));

    // Without the mask the cloudy scene takes part: median of 10, 999, 20.
    let g = read_raster(&dir.path().join("EarthEngine/Gatsibo_2020_S2.json")).unwrap();
    assert_eq!(g.get(2, 2, 2), 20.0);
}

#[test]
fn slope_classes_are_exported_per_region() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = LocalBackend::new(catalog(), dir.path());
    let mut cfg = PipelineConfig::slope_classes_glo30();
    cfg.boundary.targets = vec!["Gatsibo".into(), "Musanze".into()];
    let summary = run(&mut backend, &cfg).unwrap();
    assert_eq!(summary.submitted(), 2);
    assert!(backend.tasks().iter().all(|t| t.job.scale == 30.0));
    assert_eq!(backend.run_pending(), 2);

    let classes = read_raster(&dir.path().join("EarthEngine/Gatsibo_SlopeClass.tif")).unwrap();
    let valid: Vec<f32> = classes.bands[0].data.iter().copied().filter(|v| !v.is_nan()).collect();
    assert!(!valid.is_empty());
    assert!(valid.iter().all(|&c| (1.0..=6.0).contains(&c) && c.fract() == 0.0));
}

#[test]
fn slope_exports_cover_only_the_region_window() {
    let dir = tempfile::tempdir().unwrap();
    let mut cat = catalog();
    // 100×100 cells of 0.02° over the whole area.
    let mut dem = Raster::new(100, 100, BBox::new(29.0, -3.0, 31.0, -1.0), &["DEM"], 0.0);
    for r in 0..100 {
        for c in 0..100 {
            dem.set(0, r, c, 1000.0 + 50.0 * c as f32);
        }
    }
    cat.image_collections.get_mut(GLO30).unwrap()[0].raster = dem;
    cat.feature_collections
        .get_mut("FAO/GAUL/2015/level2")
        .unwrap()
        .push(district("Tiny", BBox::new(30.0, -2.0, 30.1, -1.9)));
    let mut backend = LocalBackend::new(cat, dir.path());
    let mut cfg = PipelineConfig::slope_classes_glo30();
    cfg.boundary.targets = vec!["Tiny".into()];
    run(&mut backend, &cfg).unwrap();
    assert_eq!(backend.run_pending(), 1);

    let classes = read_raster(&dir.path().join("EarthEngine/Tiny_SlopeClass.tif")).unwrap();
    assert_eq!((classes.width, classes.height), (5, 5));
    assert!((classes.min_lon - 30.0).abs() < 1e-6 && (classes.max_lon - 30.1).abs() < 1e-6);
    assert!((classes.min_lat + 2.0).abs() < 1e-6 && (classes.max_lat + 1.9).abs() < 1e-6);
    assert_eq!(classes.valid_pixels(), 25);
}

#[test]
fn colliding_file_names_fail_the_later_export() {
    let dir = tempfile::tempdir().unwrap();
    let mut cat = catalog();
    cat.feature_collections
        .get_mut("FAO/GAUL/2015/level2")
        .unwrap()
        .push(district("Rutsiro-East", rutsiro()));
    let mut backend = LocalBackend::new(cat, dir.path());
    let mut cfg = composite_config(vec![2020]);
    cfg.boundary.targets = vec!["Rutsiro/East".into(), "Rutsiro-East".into()];
    let summary = run(&mut backend, &cfg).unwrap();
    assert_eq!(summary.submitted(), 2);

    assert_eq!(backend.run_pending(), 1);
    assert!(matches!(backend.tasks()[0].state, TaskState::Completed { .. }));
    assert!(matches!(
        &backend.tasks()[1].state,
        TaskState::Failed { message } if message.contains("Rutsiro-East_2020_S2")
    ));
}

#[test]
fn empty_elevation_collection_skips_every_region() {
    let dir = tempfile::tempdir().unwrap();
    let mut cat = catalog();
    cat.image_collections.insert(GLO30.to_string(), Vec::new());
    let mut backend = LocalBackend::new(cat, dir.path());
    let mut cfg = PipelineConfig::slope_dem_glo30();
    cfg.boundary.targets = vec!["Gatsibo".into(), "Musanze".into()];
    let summary = run(&mut backend, &cfg).unwrap();
    assert_eq!(summary.submitted(), 0);
    assert_eq!(summary.skipped(), 2);
    assert!(backend.tasks().is_empty());
    assert!(matches!(
        &summary.records[0].outcome,
        DispatchOutcome::Skipped { file_base, .. } if file_base == "Gatsibo_slope_DEM"
    ));
}
