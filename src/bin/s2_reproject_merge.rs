//! Reproject Sentinel-2 products onto a source raster grid and merge them

use anyhow::{Context, Result};
use clap::Parser;
use s2prep::core::mosaic::{MergeStrategy, MosaicParams};
use s2prep::core::resample::ResamplingKernel;
use s2prep::core::warp::ReprojectParams;
use s2prep::io::safe::{select_bands, ProcessingLevel};
use s2prep::pipeline::{run_reproject_merge, ReprojectMergeConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Reproject, stack and merge Sentinel-2 products", long_about = None)]
struct Cli {
    /// Sentinel-2 processing level (L1C or L2A)
    #[arg(long, default_value = "L1C")]
    processing_level: String,

    /// Raster whose grid the products are warped onto
    #[arg(long)]
    src_path: PathBuf,

    /// Folder of Sentinel-2 .SAFE products
    #[arg(long)]
    s2_source: PathBuf,

    /// Output folder; the mosaic is written as merged.tif
    #[arg(long)]
    destination: PathBuf,

    /// Bands to keep
    #[arg(long, alias = "names-list", num_args = 1.., default_value = "all")]
    bands: Vec<String>,

    /// Resampling method
    #[arg(long, default_value = "nearest")]
    resampling: String,

    /// Overlap resolution of the mosaic (first or last)
    #[arg(long, default_value = "last")]
    merge_strategy: String,

    /// Value of mosaic pixels no scene covers
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    nodata: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    // Configuration errors surface before any raster is opened
    let level = cli.processing_level.parse::<ProcessingLevel>()?;
    let kernel = cli.resampling.parse::<ResamplingKernel>()?;
    let strategy = cli.merge_strategy.parse::<MergeStrategy>()?;
    let bands = select_bands(level, &cli.bands)?;

    let config = ReprojectMergeConfig {
        level,
        src_path: cli.src_path.clone(),
        s2_source: cli.s2_source.clone(),
        destination: cli.destination.clone(),
        bands,
        reproject: ReprojectParams { kernel },
        mosaic: MosaicParams {
            nodata: cli.nodata,
            strategy,
        },
    };

    let summary = run_reproject_merge(&config).with_context(|| {
        format!(
            "Reprojection of products in {} failed",
            cli.s2_source.display()
        )
    })?;

    for (scene, error) in &summary.failed {
        log::warn!("Failed: {} ({})", scene, error);
    }
    log::info!(
        "{} product(s) merged into {}",
        summary.processed.len(),
        summary.mosaic.display()
    );
    Ok(())
}
