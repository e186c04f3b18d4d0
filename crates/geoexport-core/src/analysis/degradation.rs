//! Land-degradation scoring from a district's yearly composites.
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::indices::{ndvi, normalize, CompositeBands, Snapshot};
use super::trend::pixel_trend;
use super::{discover_composites, YearFile};
use crate::error::{GeoExportError, Result};
use crate::io::{read_raster, write_raster};
use crate::raster::Raster;

/// How the per-pixel score is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    /// `0.4·trend + 0.15·(dswi + bright + psri + redness)`.
    Trend,
    /// `0.35·trend + 0.15·(…)`, plus `0.1·slope` when a slope layer exists.
    TrendWithSlope,
}

impl Weighting {
    fn trend_weight(self) -> f32 {
        match self {
            Weighting::Trend => 0.4,
            Weighting::TrendWithSlope => 0.35,
        }
    }
}

const INDEX_WEIGHT: f32 = 0.15;
const SLOPE_WEIGHT: f32 = 0.1;
const NDVI_CHANGE_WEIGHT: f32 = 0.4;

/// Weighted score from an NDVI trend and a snapshot. A falling NDVI scores
/// high, so the trend is normalized inverted.
pub fn combine(trend: &[f32], snap: &Snapshot, slope: Option<&[f32]>, weighting: Weighting) -> Vec<f32> {
    let trend_n = normalize(trend, true);
    let slope_n = slope.map(|s| normalize(s, false));
    (0..trend_n.len())
        .map(|i| {
            let mut v = weighting.trend_weight() * trend_n[i]
                + INDEX_WEIGHT * (snap.dswi[i] + snap.bright[i] + snap.psri[i] + snap.redness[i]);
            if let Some(s) = &slope_n {
                v += SLOPE_WEIGHT * s[i];
            }
            v
        })
        .collect()
}

/// Five equal-width classes over [0, 1]; out-of-range scores are clamped
/// into classes 1 and 5, NaN is class 0.
pub fn classify_5(v: f32) -> f32 {
    const EDGES: [f32; 4] = [0.2, 0.4, 0.6, 0.8];
    if v.is_nan() {
        0.0
    } else {
        1.0 + EDGES.iter().filter(|&&e| v >= e).count() as f32
    }
}

/// Positive where a district degraded between `prev` and `curr`.
pub fn year_over_year(curr: &Snapshot, prev: &Snapshot) -> Vec<f32> {
    (0..curr.ndvi.len())
        .map(|i| {
            -NDVI_CHANGE_WEIGHT * (curr.ndvi[i] - prev.ndvi[i])
                + INDEX_WEIGHT
                    * ((curr.dswi[i] - prev.dswi[i])
                        + (curr.bright[i] - prev.bright[i])
                        + (curr.psri[i] - prev.psri[i])
                        + (curr.redness[i] - prev.redness[i]))
        })
        .collect()
}

fn load_stack(files: &[YearFile]) -> Result<Vec<Raster>> {
    let rasters = files.iter().map(|f| read_raster(&f.path)).collect::<Result<Vec<_>>>()?;
    if let Some((first, rest)) = rasters.split_first() {
        if let Some(bad) = rest.iter().position(|r| !r.same_grid(first)) {
            return Err(GeoExportError::GridMismatch(format!(
                "{} is not on the grid of {}",
                files[bad + 1].path.display(),
                files[0].path.display()
            )));
        }
    }
    Ok(rasters)
}

/// Pick `preferred` when present, otherwise the latest available year.
fn snapshot_index(files: &[YearFile], preferred: i32) -> Option<usize> {
    if let Some(i) = files.iter().position(|f| f.year == preferred) {
        return Some(i);
    }
    let (i, latest) = files.iter().enumerate().max_by_key(|(_, f)| f.year)?;
    info!(year = latest.year, "using latest available year for snapshot");
    Some(i)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DegradationOutputs {
    pub index: PathBuf,
    pub class: PathBuf,
    pub years: Vec<i32>,
    pub snapshot_year: i32,
    pub slope_used: bool,
}

/// Trend-based score and classes for one district.
///
/// Reads every `<district>_<year>_S2` composite in `data_dir` and writes
/// `<district>_degradation_index.tif` and `<district>_degradation_class.tif`
/// next to them. Returns `None` (with a warning) when no composites exist.
pub fn run_district(
    data_dir: &Path,
    district: &str,
    snapshot_year: i32,
    weighting: Weighting,
) -> Result<Option<DegradationOutputs>> {
    let files = discover_composites(data_dir, district)?;
    if files.is_empty() {
        warn!(district, dir = %data_dir.display(), "no composites for district");
        return Ok(None);
    }
    let rasters = load_stack(&files)?;
    let grid = &rasters[0];

    let years: Vec<i32> = files.iter().map(|f| f.year).collect();
    let ndvi_stack = rasters
        .iter()
        .map(|r| CompositeBands::from_raster(r).map(|b| ndvi(b.nir, b.red)))
        .collect::<Result<Vec<_>>>()?;
    let trend = pixel_trend(&years, &ndvi_stack)?;

    let si = snapshot_index(&files, snapshot_year)
        .ok_or_else(|| GeoExportError::EmptyInput(format!("no snapshot year for {district}")))?;
    let snap = Snapshot::from_composite(&rasters[si])?;

    let slope = match weighting {
        Weighting::Trend => None,
        Weighting::TrendWithSlope => load_slope(data_dir, district, grid)?,
    };

    let score = combine(&trend, &snap, slope.as_ref().map(|r| r.bands[0].data.as_slice()), weighting);
    let classes: Vec<f32> = score.iter().map(|&v| classify_5(v)).collect();

    let index = data_dir.join(format!("{district}_degradation_index.tif"));
    let class = data_dir.join(format!("{district}_degradation_class.tif"));
    write_raster(&index, &Raster::from_band("degradation_index", grid.width, grid.height, grid.bbox(), score)?)?;
    write_raster(&class, &Raster::from_band("degradation_class", grid.width, grid.height, grid.bbox(), classes)?)?;
    info!(district, index = %index.display(), class = %class.display(), "saved degradation rasters");

    Ok(Some(DegradationOutputs {
        index,
        class,
        years,
        snapshot_year: files[si].year,
        slope_used: slope.is_some(),
    }))
}

/// `<district>_Slope_deg.tif`, if present.
fn load_slope(data_dir: &Path, district: &str, grid: &Raster) -> Result<Option<Raster>> {
    let path = data_dir.join(format!("{district}_Slope_deg.tif"));
    if !path.exists() {
        warn!(district, path = %path.display(), "no slope layer; scoring without it");
        return Ok(None);
    }
    let slope = read_raster(&path)?;
    if slope.width != grid.width || slope.height != grid.height || slope.bands.is_empty() {
        return Err(GeoExportError::GridMismatch(format!(
            "{} is {}×{}, composites are {}×{}",
            path.display(),
            slope.width,
            slope.height,
            grid.width,
            grid.height
        )));
    }
    Ok(Some(slope))
}

/// Change maps between each pair of consecutive available years, written as
/// `<district>_degradation_<curr>_vs_<prev>.tif`.
pub fn run_district_yoy(data_dir: &Path, district: &str) -> Result<Vec<PathBuf>> {
    let files = discover_composites(data_dir, district)?;
    if files.is_empty() {
        warn!(district, dir = %data_dir.display(), "no composites for district");
        return Ok(Vec::new());
    }
    let rasters = load_stack(&files)?;
    let snaps = rasters.iter().map(Snapshot::from_composite).collect::<Result<Vec<_>>>()?;
    let grid = &rasters[0];

    let mut written = Vec::new();
    for i in 1..files.len() {
        let (prev, curr) = (files[i - 1].year, files[i].year);
        let change = year_over_year(&snaps[i], &snaps[i - 1]);
        let path = data_dir.join(format!("{district}_degradation_{curr}_vs_{prev}.tif"));
        let name = format!("degradation_{curr}_vs_{prev}");
        write_raster(&path, &Raster::from_band(&name, grid.width, grid.height, grid.bbox(), change)?)?;
        info!(district, path = %path.display(), "saved change raster");
        written.push(path);
    }
    Ok(written)
}
