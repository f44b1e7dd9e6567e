//! Core Sentinel-2 preparation modules

pub mod footprint;
pub mod geometry;
pub mod landmask;
pub mod mosaic;
pub mod overlap;
pub mod projection;
pub mod resample;
pub mod search;
pub mod validity;
pub mod warp;

// Re-export main types
pub use footprint::{Footprint, FootprintExtractor, FootprintParams};
pub use landmask::{apply_land_mask, LandMaskParams, LandPolygons};
pub use mosaic::{MergeStrategy, MosaicCompositor, MosaicParams};
pub use overlap::{OverlapEvaluator, OverlapParams, OverlapReport};
pub use projection::CoordinateTransformer;
pub use resample::ResamplingKernel;
pub use search::{acquisition_time_from_filename, build_search_query, SearchParams, TimeDelta};
pub use validity::{build_validity_mask, ValidityRule};
pub use warp::{stack_bands, to_toa_reflectance, ReprojectParams, Reprojector};
