pub mod analysis;
pub mod backend;
pub mod collection;
pub mod config;
pub mod dates;
pub mod error;
pub mod export;
pub mod expr;
pub mod geometry;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod raster;
pub mod reduce;
pub mod region;
pub mod terrain;

pub use error::{GeoExportError, Result};
