//! s2prep: Sentinel-2 scene selection and preparation for sea-ice thickness
//! products
//!
//! Finds Sentinel-2 scenes overlapping the valid pixels of a sea-ice-thickness
//! raster, then converts them to TOA reflectance, warps them onto the raster's
//! grid and merges them into one mosaic.

pub mod types;
pub mod io;
pub mod core;
pub mod pipeline;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    BoundingBox, Crs, Extent, GeoGrid, GeoTransform, GridTemplate, PixelType, PrepError,
    PrepResult,
};

pub use io::{JsonCatalog, RasterReader, RasterWriter, SafeProduct, SceneCandidate};
pub use pipeline::{run_land_mask, run_overlap_search, run_reproject_merge, RunSummary};
