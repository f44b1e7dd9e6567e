use approx::assert_relative_eq;
use ndarray::Array2;
use s2prep::core::mosaic::MosaicParams;
use s2prep::core::warp::ReprojectParams;
use s2prep::io::raster::{RasterReader, RasterWriter};
use s2prep::io::safe::ProcessingLevel;
use s2prep::pipeline::{run_reproject_merge, ReprojectMergeConfig, MERGED_FILE_NAME};
use s2prep::types::{Crs, GeoGrid, GeoTransform, PixelType, PrepError};
use std::path::{Path, PathBuf};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn utm() -> Crs {
    Crs::from_epsg(32633)
}

/// 4x8 reference grid at 10 m
fn write_source(dir: &Path) -> PathBuf {
    let path = dir.join("20200301T1030_sit.tif");
    let grid = GeoGrid::single_band(
        Array2::from_elem((4, 8), 1.5),
        GeoTransform::north_up(500000.0, 7000040.0, 10.0, -10.0),
        utm(),
        None,
        PixelType::Float32,
    )
    .unwrap();
    RasterWriter::write_geotiff(&grid, &path, None).unwrap();
    path
}

/// L1C product whose bands cover four columns starting at `x0`
fn write_product(root: &Path, name: &str, x0: f64, dn: f64) {
    let img = root
        .join(format!("{}.SAFE", name))
        .join("GRANULE")
        .join("L1C_T33XWG_A000001")
        .join("IMG_DATA");
    for band in ["B02", "B03"] {
        let grid = GeoGrid::single_band(
            Array2::from_elem((4, 4), dn),
            GeoTransform::north_up(x0, 7000040.0, 10.0, -10.0),
            utm(),
            Some(0.0),
            PixelType::UInt16,
        )
        .unwrap();
        RasterWriter::write_geotiff(&grid, img.join(format!("T33XWG_20200301T102021_{}.tif", band)), None)
            .unwrap();
    }
}

fn config(src_path: PathBuf, s2_source: PathBuf, destination: PathBuf) -> ReprojectMergeConfig {
    ReprojectMergeConfig {
        level: ProcessingLevel::L1C,
        src_path,
        s2_source,
        destination,
        bands: vec!["B02".to_string(), "B03".to_string()],
        reproject: ReprojectParams::default(),
        mosaic: MosaicParams::default(),
    }
}

#[test]
fn test_reproject_and_merge_two_products() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path());
    let products = dir.path().join("products");
    write_product(&products, "S2A_MSIL1C_20200301T102021_WEST", 500000.0, 1000.0);
    write_product(&products, "S2B_MSIL1C_20200301T102021_EAST", 500040.0, 2000.0);
    // No GRANULE folder, fails on its own
    std::fs::create_dir_all(products.join("S2C_MSIL1C_20200301T102021_BROKEN.SAFE")).unwrap();
    let destination = dir.path().join("out");

    let summary = run_reproject_merge(&config(source, products, destination.clone())).unwrap();

    assert_eq!(summary.processed.len(), 2);
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].0.contains("BROKEN"));
    assert_eq!(summary.mosaic, destination.join(MERGED_FILE_NAME));

    let merged = RasterReader::read(&summary.mosaic).unwrap();
    assert_eq!(merged.band_count(), 2);
    assert_eq!((merged.rows(), merged.cols()), (4, 8));
    assert_eq!(merged.pixel_type(), PixelType::Float32);
    for band in 0..2 {
        for row in 0..4 {
            for col in 0..8 {
                let expected = if col < 4 { 0.1 } else { 0.2 };
                assert_relative_eq!(merged.band(band)[[row, col]], expected, epsilon = 1e-6);
            }
        }
    }

    // Scratch stacks are gone, only the mosaic remains
    let entries: Vec<_> = std::fs::read_dir(&destination).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_run_fails_when_no_scene_succeeds() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path());
    let products = dir.path().join("products");
    std::fs::create_dir_all(products.join("S2A_MSIL1C_EMPTY.SAFE")).unwrap();

    let result = run_reproject_merge(&config(source, products, dir.path().join("out")));
    assert!(result.is_err());
    assert!(!dir.path().join("out").join(MERGED_FILE_NAME).exists());
}

#[test]
fn test_unknown_band_is_config_error_before_io() {
    let mut cfg = config(
        PathBuf::from("/nonexistent/src.tif"),
        PathBuf::from("/nonexistent/products"),
        PathBuf::from("/nonexistent/out"),
    );
    cfg.bands = vec!["B10".to_string()];
    cfg.level = ProcessingLevel::L2A;

    match run_reproject_merge(&cfg) {
        Err(PrepError::Config(_)) => {}
        other => panic!("expected configuration error, got {:?}", other.map(|s| s.mosaic)),
    }
}
