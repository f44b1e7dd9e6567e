//! End-to-end workflows behind the command line tools

use crate::core::footprint::{Footprint, FootprintExtractor, FootprintParams};
use crate::core::landmask::{apply_land_mask, LandMaskParams, LandPolygons};
use crate::core::mosaic::{MosaicCompositor, MosaicParams};
use crate::core::overlap::{OverlapEvaluator, OverlapParams, OverlapReport};
use crate::core::search::{acquisition_time_from_filename, build_search_query, SearchParams};
use crate::core::validity::{build_validity_mask, ValidityRule};
use crate::core::warp::{stack_bands, to_toa_reflectance, ReprojectParams, Reprojector};
use crate::io::catalog::{SceneCandidate, SceneCatalog, SearchQuery};
use crate::io::raster::{RasterReader, RasterWriter};
use crate::io::safe::{select_bands, ProcessingLevel, SafeProduct};
use crate::types::{GeoGrid, GridTemplate, PixelType, PrepError, PrepResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the final mosaic inside the destination directory
pub const MERGED_FILE_NAME: &str = "merged.tif";

/// Inputs of the scene selection workflow
#[derive(Debug, Clone)]
pub struct OverlapSearchConfig {
    /// Sea-ice-thickness raster whose name starts with the acquisition time
    pub raster: PathBuf,
    pub validity: ValidityRule,
    pub footprint: FootprintParams,
    pub search: SearchParams,
    pub overlap: OverlapParams,
    /// Optional GeoJSON export of the raster footprint
    pub footprint_output: Option<PathBuf>,
    /// Optional GeoTIFF export of the validity mask
    pub mask_output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapSearchResult {
    pub query: SearchQuery,
    pub kept: Vec<SceneCandidate>,
    pub reports: Vec<OverlapReport>,
}

/// Footprint, catalog search and overlap filtering for one raster
pub fn run_overlap_search(
    config: &OverlapSearchConfig,
    catalog: &dyn SceneCatalog,
) -> PrepResult<OverlapSearchResult> {
    let extractor = FootprintExtractor::new(config.footprint.clone())?;
    let acquired = acquisition_time_from_filename(&config.raster)?;
    let grid = RasterReader::read_band(&config.raster, 1)?;

    log::info!("Creating footprint...");
    let footprint = extractor.extract(&grid)?;
    if let Some(path) = &config.footprint_output {
        footprint.write_geojson(path)?;
    }

    let query = build_search_query(&footprint, acquired, &config.search);
    let candidates = catalog.search(&query)?;
    log::info!("Catalog returned {} candidate(s)", candidates.len());

    let mask = build_validity_mask(&grid, &config.validity)?;
    if let Some(path) = &config.mask_output {
        RasterWriter::write_geotiff(&mask, path, None)?;
    }

    let evaluator = OverlapEvaluator::new(&mask, config.overlap.clone())?;
    let (kept, reports) = evaluator.filter(&candidates);

    Ok(OverlapSearchResult {
        query,
        kept,
        reports,
    })
}

/// Inputs of the reprojection and merge workflow
#[derive(Debug, Clone)]
pub struct ReprojectMergeConfig {
    pub level: ProcessingLevel,
    /// Raster whose grid the scenes are warped onto
    pub src_path: PathBuf,
    /// Folder holding the `.SAFE` products
    pub s2_source: PathBuf,
    pub destination: PathBuf,
    /// Requested bands; empty or `all` selects every band of the level
    pub bands: Vec<String>,
    pub reproject: ReprojectParams,
    pub mosaic: MosaicParams,
}

/// Outcome of a reprojection and merge run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub processed: Vec<String>,
    /// Scene name and the error that stopped it
    pub failed: Vec<(String, String)>,
    pub mosaic: PathBuf,
}

/// TOA-scale, warp and stack the selected bands of one product
pub fn process_scene(
    product: &SafeProduct,
    bands: &[String],
    template: &GridTemplate,
    reprojector: &Reprojector,
) -> PrepResult<GeoGrid> {
    log::info!("Reprojecting and stacking for S2 product: {}", product.name());
    let mut warped = Vec::with_capacity(bands.len());
    for band in bands {
        let path = product.band_file(band)?;
        log::info!("    Band {}", band);
        let dn = RasterReader::read_band(&path, 1)?;
        let toa = to_toa_reflectance(&dn)?;
        warped.push(reprojector.reproject(&toa, template)?);
    }
    stack_bands(&warped)
}

/// Warp every product onto the source grid and merge them into
/// `<destination>/merged.tif`.
///
/// A scene that fails is logged and reported while the others continue. The
/// run fails only when no scene succeeds. Scratch stacks live in a temporary
/// directory under the destination that is removed on return.
pub fn run_reproject_merge(config: &ReprojectMergeConfig) -> PrepResult<RunSummary> {
    let bands = select_bands(config.level, &config.bands)?;
    let template = RasterReader::read_template(&config.src_path)?;
    let products = SafeProduct::discover(&config.s2_source, config.level)?;
    if products.is_empty() {
        return Err(PrepError::Processing(format!(
            "No {} products found in {}",
            config.level,
            config.s2_source.display()
        )));
    }

    std::fs::create_dir_all(&config.destination)?;
    let scratch = tempfile::Builder::new()
        .prefix("tmp")
        .tempdir_in(&config.destination)?;
    let reprojector = Reprojector::new(config.reproject.clone());

    let mut processed = Vec::new();
    let mut failed = Vec::new();
    let mut stacks = Vec::new();

    for product in &products {
        let outcome = process_scene(product, &bands, &template, &reprojector).and_then(|stack| {
            let path = scratch
                .path()
                .join(format!("{}_stacked.tif", product.name()));
            RasterWriter::write_geotiff(&stack, &path, Some(PixelType::Float32))?;
            Ok(path)
        });
        match outcome {
            Ok(path) => {
                log::info!("    Done!");
                processed.push(product.name().to_string());
                stacks.push(path);
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", product.name(), e);
                failed.push((product.name().to_string(), e.to_string()));
            }
        }
    }

    if stacks.is_empty() {
        return Err(PrepError::Processing(format!(
            "None of the {} product(s) could be processed",
            products.len()
        )));
    }

    log::info!("Merging rasters...");
    let mosaic = merge_files(&stacks, &config.mosaic)?;
    let destination = config.destination.join(MERGED_FILE_NAME);
    RasterWriter::write_geotiff(&mosaic, &destination, Some(PixelType::Float32))?;

    log::info!(
        "Done merging, final product will be found in destination: {}",
        destination.display()
    );
    Ok(RunSummary {
        processed,
        failed,
        mosaic: destination,
    })
}

/// Read rasters from disk and merge them
pub fn merge_files<P: AsRef<Path>>(paths: &[P], params: &MosaicParams) -> PrepResult<GeoGrid> {
    let grids = paths
        .iter()
        .map(RasterReader::read)
        .collect::<PrepResult<Vec<_>>>()?;
    MosaicCompositor::new(params.clone()).merge(&grids)
}

/// Inputs of the land masking workflow
#[derive(Debug, Clone)]
pub struct LandMaskConfig {
    pub raster: PathBuf,
    pub land_file: PathBuf,
    pub params: LandMaskParams,
    pub output: PathBuf,
}

/// Mask a raster against land polygons and write the result.
///
/// Returns `false` without writing anything when no land touches the raster.
pub fn run_land_mask(config: &LandMaskConfig) -> PrepResult<bool> {
    let grid = RasterReader::read(&config.raster)?;
    let footprint: Footprint = FootprintExtractor::standard().extract(&grid)?;
    let land = LandPolygons::from_file(&config.land_file)?;

    match apply_land_mask(&grid, &footprint, &land, &config.params)? {
        Some(masked) => {
            RasterWriter::write_geotiff(&masked, &config.output, None)?;
            Ok(true)
        }
        None => Ok(false),
    }
}
