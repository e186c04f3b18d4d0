//! Library error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("Unknown band '{band}' in {source_id}")]
    UnknownBand { source_id: String, band: String },

    #[error("Raster grid mismatch: {0}")]
    GridMismatch(String),

    #[error("Invalid date window: {0}")]
    InvalidDateWindow(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Export of {pixels} pixels exceeds max_pixels {max_pixels}")]
    PixelBudgetExceeded { pixels: f64, max_pixels: f64 },

    #[error("Duplicate export destination: {0}")]
    DuplicateExport(String),

    #[error("Nothing to reduce: {0}")]
    EmptyInput(String),

    #[error("Unsupported raster layout: {0}")]
    UnsupportedRaster(String),
}

pub type Result<T> = std::result::Result<T, GeoExportError>;
