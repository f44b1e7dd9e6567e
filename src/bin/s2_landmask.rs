//! Mask land (or everything but land) out of a raster

use anyhow::{bail, Context, Result};
use clap::Parser;
use s2prep::core::landmask::{land_file_in, LandMaskParams};
use s2prep::pipeline::{run_land_mask, LandMaskConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Apply a land mask from coastline polygons", long_about = None)]
struct Cli {
    /// Raster to mask
    raster: PathBuf,

    /// Land polygon vector file
    #[arg(long, conflicts_with = "include_dir")]
    land_file: Option<PathBuf>,

    /// Folder holding land_polygons.shp and GSHHS_i_L1.shp
    #[arg(long, default_value = "include")]
    include_dir: PathBuf,

    /// Use the coarse GSHHS shoreline instead of detailed land polygons
    #[arg(long)]
    coarse: bool,

    /// Keep only land pixels instead of removing them
    #[arg(long)]
    keep_land: bool,

    /// Write a UInt16 mask with 1 where pixels are removed
    #[arg(long)]
    mask_only: bool,

    /// Output GeoTIFF
    #[arg(long)]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let land_file = match &cli.land_file {
        Some(path) => path.clone(),
        None => land_file_in(&cli.include_dir, !cli.coarse),
    };
    if !land_file.exists() {
        bail!("Land polygon file {} does not exist", land_file.display());
    }

    let config = LandMaskConfig {
        raster: cli.raster.clone(),
        land_file,
        params: LandMaskParams {
            keep_land: cli.keep_land,
            mask_only: cli.mask_only,
        },
        output: cli.output.clone(),
    };

    let written = run_land_mask(&config)
        .with_context(|| format!("Land masking failed for {}", cli.raster.display()))?;
    if written {
        log::info!("Land mask written to {}", cli.output.display());
    } else {
        log::info!("There are no lands within the raster, nothing written");
    }
    Ok(())
}
