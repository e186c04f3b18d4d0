/// Classify exported slope rasters (degrees) into percent-slope classes.
///
/// Reads `<District>_slope_NASA.tif` and writes `<District>_slope_class_NASA.tif`
/// (UInt8, class 0 = no data) in the same directory.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use geoexport_core::analysis::classify_slope_file;
use geoexport_core::logging::init_logging;
use geoexport_core::terrain::SlopeThresholds;

#[derive(Parser, Debug)]
#[command(name = "slope_classes", about = "Percent-slope classes from slope-in-degrees GeoTIFFs")]
struct Args {
    #[arg(long, env = "S2_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    #[arg(long = "district", default_values_t = ["Musanze".to_string(), "Gatsibo".to_string()])]
    districts: Vec<String>,

    /// Ascending percent-slope class bounds
    #[arg(long, value_delimiter = ',', default_values_t = [5.0f32, 10.0, 15.0, 20.0, 30.0])]
    thresholds: Vec<f32>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let thresholds = SlopeThresholds(args.thresholds.clone());
    thresholds.validate().context("Invalid --thresholds")?;

    for district in &args.districts {
        let input = args.data_dir.join(format!("{district}_slope_NASA.tif"));
        if !input.exists() {
            warn!(district = %district, path = %input.display(), "no slope raster; skipping");
            continue;
        }
        let output = args.data_dir.join(format!("{district}_slope_class_NASA.tif"));
        let classes = classify_slope_file(&input, &output, &thresholds)
            .with_context(|| format!("Cannot classify {}", input.display()))?;
        info!(
            district = %district,
            path = %output.display(),
            valid = classes.valid_pixels(),
            "saved classified slope raster"
        );
    }

    eprintln!("Classes:");
    for line in thresholds.legend() {
        eprintln!("  {line}");
    }
    Ok(())
}
