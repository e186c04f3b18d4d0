//! Post-processing of exported composites: spectral indices, NDVI trend and
//! degradation scoring, plus local slope classification.
pub mod degradation;
pub mod indices;
pub mod trend;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::io::{geotiff, read_raster};
use crate::raster::Raster;
use crate::terrain::{classify_slope_degrees, SlopeThresholds};

/// Suffix of the per-year optical composites the analysis reads.
pub const COMPOSITE_SUFFIX: &str = "_S2";

/// The first `_`-separated token that is exactly four ASCII digits.
pub fn parse_year(file_name: &str) -> Option<i32> {
    file_name
        .split('_')
        .find(|t| t.len() == 4 && t.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|t| t.parse().ok())
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearFile {
    pub year: i32,
    pub path: PathBuf,
}

/// Composites `<district>_<year>_S2.{tif,json}` in `dir`, sorted by year.
/// A GeoTIFF wins over a JSON raster for the same year.
pub fn discover_composites(dir: &Path, district: &str) -> Result<Vec<YearFile>> {
    let prefix = format!("{district}_");
    let mut found: Vec<(YearFile, bool)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_tif = name.ends_with(&format!("{COMPOSITE_SUFFIX}.tif"));
        let is_json = name.ends_with(&format!("{COMPOSITE_SUFFIX}.json"));
        if !name.starts_with(&prefix) || !(is_tif || is_json) {
            continue;
        }
        match parse_year(&name[prefix.len()..]) {
            Some(year) => found.push((YearFile { year, path: path.clone() }, is_tif)),
            None => warn!(file = %path.display(), "no year in composite name; ignoring"),
        }
    }
    // tif before json within a year, then keep the first of each year
    found.sort_by(|(a, a_tif), (b, b_tif)| a.year.cmp(&b.year).then(b_tif.cmp(a_tif)));
    found.dedup_by_key(|(f, _)| f.year);
    let files: Vec<YearFile> = found.into_iter().map(|(f, _)| f).collect();
    debug!(district, years = ?files.iter().map(|f| f.year).collect::<Vec<_>>(), "composites found");
    Ok(files)
}

/// Classify a slope-in-degrees raster into percent-slope classes and write
/// it as a UInt8 GeoTIFF. Returns the classified raster.
pub fn classify_slope_file(input: &Path, output: &Path, thresholds: &SlopeThresholds) -> Result<Raster> {
    let classes = classify_slope_degrees(&read_raster(input)?, thresholds)?;
    geotiff::write_u8(output, &classes)?;
    Ok(classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;
    use crate::io::write_raster;

    #[test]
    fn year_is_first_four_digit_token() {
        assert_eq!(parse_year("Gatsibo_2019_S2.tif"), Some(2019));
        assert_eq!(parse_year("North-Amajyaruguru_2023_S2.json"), Some(2023));
        assert_eq!(parse_year("A_12345_2020_S2.tif"), Some(2020));
        assert_eq!(parse_year("Gatsibo_S2.tif"), None);
    }

    #[test]
    fn discovery_filters_sorts_and_prefers_tif() {
        let dir = tempfile::tempdir().unwrap();
        let r = Raster::new(1, 1, BBox::new(0.0, 0.0, 1.0, 1.0), &["v"], 0.0);
        for name in [
            "Musanze_2021_S2.tif",
            "Musanze_2019_S2.json",
            "Musanze_2021_S2.json",
            "Musanze_SlopeClass.tif",
            "Musanzee_2020_S2.tif",
            "Gatsibo_2020_S2.tif",
        ] {
            write_raster(&dir.path().join(name), &r).unwrap();
        }
        let files = discover_composites(dir.path(), "Musanze").unwrap();
        let years: Vec<i32> = files.iter().map(|f| f.year).collect();
        assert_eq!(years, vec![2019, 2021]);
        assert!(files[1].path.ends_with("Musanze_2021_S2.tif"));
    }

    #[test]
    fn slope_file_classes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("D_slope_NASA.tif");
        let output = dir.path().join("D_slope_class_NASA.tif");
        // 2° ≈ 3.5%, 8° ≈ 14.1%, 40° ≈ 83.9%
        let r = Raster::from_band("slope", 3, 1, BBox::new(0.0, 0.0, 3.0, 1.0), vec![2.0, 8.0, 40.0]).unwrap();
        write_raster(&input, &r).unwrap();
        let classes = classify_slope_file(&input, &output, &SlopeThresholds::default()).unwrap();
        assert_eq!(classes.bands[0].data, vec![1.0, 3.0, 6.0]);
        assert!(output.exists());
    }
}
