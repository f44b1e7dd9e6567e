//! Input/output: rasters, SAFE products, catalog and credentials

pub mod catalog;
pub mod credentials;
pub mod raster;
pub mod safe;

pub use catalog::{CloudCoverRange, JsonCatalog, SceneCandidate, SceneCatalog, SearchQuery};
pub use credentials::Credentials;
pub use raster::{RasterReader, RasterWriter};
pub use safe::{ProcessingLevel, SafeProduct};
