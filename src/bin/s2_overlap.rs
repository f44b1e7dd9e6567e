//! Find Sentinel-2 scenes overlapping the valid pixels of a sea-ice-thickness
//! raster

use anyhow::{Context, Result};
use clap::Parser;
use s2prep::core::footprint::FootprintParams;
use s2prep::core::overlap::OverlapParams;
use s2prep::core::search::{SearchParams, TimeDelta};
use s2prep::core::validity::ValidityRule;
use s2prep::io::catalog::{CloudCoverRange, JsonCatalog};
use s2prep::io::credentials::Credentials;
use s2prep::io::safe::ProcessingLevel;
use s2prep::pipeline::{run_overlap_search, OverlapSearchConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Select Sentinel-2 scenes overlapping valid raster pixels", long_about = None)]
struct Cli {
    /// Sea-ice-thickness raster; its name starts with YYYYMMDD?HHMM
    raster: PathBuf,

    /// Inclusive interval of valid pixel values
    #[arg(long, num_args = 2, value_names = ["LO", "HI"], allow_negative_numbers = true)]
    valid_interval: Option<Vec<f64>>,

    /// Explicit list of valid integer pixel values
    #[arg(long, num_args = 1.., allow_negative_numbers = true)]
    valid_values: Vec<i64>,

    /// Cloud cover percentage range MIN,MAX
    #[arg(long, default_value = "0,30")]
    cloud_cover: String,

    /// Search window half-width, as minutes=N, hours=N or days=N
    #[arg(long, default_value = "hours=1")]
    delta: String,

    /// Catalog credential file holding "username, password"
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// JSON export of catalog search results
    #[arg(long)]
    candidates: PathBuf,

    /// Processing level to search for (L1C or L2A)
    #[arg(long, default_value = "L1C")]
    processing_level: String,

    /// Minimum number of valid pixels inside a scene footprint
    #[arg(long, default_value_t = 2000)]
    min_pixels: usize,

    /// Minimum percentage of valid pixels inside a scene footprint
    #[arg(long, default_value_t = 20.0)]
    min_percent: f64,

    /// Keep every n-th border pixel of the footprint
    #[arg(long, default_value_t = 100)]
    stride: usize,

    /// Write the raster footprint as GeoJSON
    #[arg(long)]
    footprint_output: Option<PathBuf>,

    /// Write the validity mask as GeoTIFF
    #[arg(long)]
    mask_output: Option<PathBuf>,

    /// Write kept scenes and per-scene reports as JSON (stdout otherwise)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let interval = cli.valid_interval.as_ref().map(|v| (v[0], v[1]));
    let validity = ValidityRule::from_options(interval, &cli.valid_values)?;
    let search = SearchParams {
        delta: cli.delta.parse::<TimeDelta>()?,
        cloud_cover: cli.cloud_cover.parse::<CloudCoverRange>()?,
        level: cli.processing_level.parse::<ProcessingLevel>()?,
    };

    if let Some(path) = &cli.credentials {
        let credentials = Credentials::from_file(path)?;
        log::info!("Using catalog account {}", credentials.username);
    }

    let config = OverlapSearchConfig {
        raster: cli.raster.clone(),
        validity,
        footprint: FootprintParams { stride: cli.stride },
        search,
        overlap: OverlapParams {
            min_valid_pixels: cli.min_pixels,
            min_valid_percent: cli.min_percent,
        },
        footprint_output: cli.footprint_output.clone(),
        mask_output: cli.mask_output.clone(),
    };

    let catalog = JsonCatalog::new(&cli.candidates);
    let result = run_overlap_search(&config, &catalog)
        .with_context(|| format!("Scene selection failed for {}", cli.raster.display()))?;

    log::info!("{} scene(s) kept", result.kept.len());
    let json = serde_json::to_string_pretty(&result)?;
    match &cli.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Cannot write {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}
