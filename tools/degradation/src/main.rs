/// Land-degradation scoring over exported district composites.
///
/// Reads `<District>_<YEAR>_S2.tif` (or `.json`) from the data directory and
/// writes, next to them:
///   trend       `<District>_degradation_index.tif`, `<District>_degradation_class.tif`
///   with-slope  same outputs, adding `<District>_Slope_deg.tif` when present
///   yoy         `<District>_degradation_<curr>_vs_<prev>.tif` per consecutive year pair
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use geoexport_core::analysis::degradation::{run_district, run_district_yoy, Weighting};
use geoexport_core::logging::init_logging;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Trend,
    WithSlope,
    Yoy,
}

#[derive(Parser, Debug)]
#[command(name = "degradation", about = "Score land degradation from yearly Sentinel-2 composites")]
struct Args {
    /// Directory holding the exported composites
    #[arg(long, env = "S2_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// District file prefixes to process
    #[arg(long = "district", default_values_t = ["Gatsibo".to_string(), "Musanze".to_string()])]
    districts: Vec<String>,

    #[arg(long, value_enum, default_value_t = Mode::Trend)]
    mode: Mode,

    /// Snapshot year for the stress indices; falls back to the latest available
    #[arg(long, default_value = "2023")]
    latest_year: i32,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    info!(dir = %args.data_dir.display(), "using data directory");

    for district in &args.districts {
        info!(district = %district, "processing district");
        match args.mode {
            Mode::Trend | Mode::WithSlope => {
                let weighting = match args.mode {
                    Mode::WithSlope => Weighting::TrendWithSlope,
                    _ => Weighting::Trend,
                };
                let out = run_district(&args.data_dir, district, args.latest_year, weighting)
                    .with_context(|| format!("Degradation failed for {district}"))?;
                if let Some(out) = out {
                    eprintln!("  saved {}", out.index.display());
                    eprintln!("  saved {}", out.class.display());
                }
            }
            Mode::Yoy => {
                let written = run_district_yoy(&args.data_dir, district)
                    .with_context(|| format!("Year-over-year failed for {district}"))?;
                for path in written {
                    eprintln!("  saved {}", path.display());
                }
            }
        }
    }
    Ok(())
}
