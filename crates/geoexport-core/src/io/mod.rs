//! Raster files on disk, dispatched on extension: `.json` is the serde form
//! of [`Raster`], `.tif`/`.tiff` is GeoTIFF.
pub mod geotiff;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{GeoExportError, Result};
use crate::raster::Raster;

enum Format {
    Json,
    GeoTiff,
}

fn format_of(path: &Path) -> Result<Format> {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("json") => Ok(Format::Json),
        Some("tif") | Some("tiff") => Ok(Format::GeoTiff),
        _ => Err(GeoExportError::UnsupportedRaster(format!(
            "{}: expected .json, .tif or .tiff",
            path.display()
        ))),
    }
}

pub fn read_raster(path: &Path) -> Result<Raster> {
    match format_of(path)? {
        Format::Json => Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?),
        Format::GeoTiff => geotiff::read(path),
    }
}

/// GeoTIFF output is single-band Float32.
pub fn write_raster(path: &Path, raster: &Raster) -> Result<()> {
    match format_of(path)? {
        Format::Json => Ok(serde_json::to_writer(BufWriter::new(File::create(path)?), raster)?),
        Format::GeoTiff => geotiff::write_f32(path, raster),
    }
}
