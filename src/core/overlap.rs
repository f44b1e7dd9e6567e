use crate::core::geometry::{parse_wkt_polygons, pixels_inside, transform_polygons};
use crate::core::projection::CoordinateTransformer;
use crate::core::validity::{MASK_INVALID, MASK_VALID};
use crate::io::catalog::SceneCandidate;
use crate::types::{GeoGrid, PrepError, PrepResult};
use serde::{Deserialize, Serialize};

/// Acceptance thresholds for a candidate scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapParams {
    /// Minimum number of valid mask pixels inside the footprint
    pub min_valid_pixels: usize,
    /// Minimum share of valid pixels among the in-bounds footprint pixels
    pub min_valid_percent: f64,
}

impl Default for OverlapParams {
    fn default() -> Self {
        Self {
            min_valid_pixels: 2000,
            min_valid_percent: 20.0,
        }
    }
}

/// Outcome of evaluating one candidate against the validity mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapReport {
    pub identifier: String,
    pub valid_pixels: usize,
    pub invalid_pixels: usize,
    pub percentage: f64,
    pub accepted: bool,
}

/// Valid share in percent; an empty clip counts as 0%
pub fn valid_percentage(valid: usize, invalid: usize) -> f64 {
    let total = valid + invalid;
    if total == 0 {
        0.0
    } else {
        valid as f64 / total as f64 * 100.0
    }
}

/// Filters catalog candidates by how many valid mask pixels they cover
pub struct OverlapEvaluator<'a> {
    mask: &'a GeoGrid,
    params: OverlapParams,
    to_mask_crs: CoordinateTransformer,
}

impl<'a> OverlapEvaluator<'a> {
    pub fn new(mask: &'a GeoGrid, params: OverlapParams) -> PrepResult<Self> {
        if !(params.min_valid_percent.is_finite()) {
            return Err(PrepError::Config(
                "Minimum valid percentage must be a finite number".to_string(),
            ));
        }
        let to_mask_crs = CoordinateTransformer::from_wgs84(mask.crs())?;
        Ok(Self {
            mask,
            params,
            to_mask_crs,
        })
    }

    /// Count valid and invalid mask pixels whose centre falls inside the
    /// footprint. Pixels outside the raster are not counted at all.
    pub fn count_pixels(&self, footprint_wkt: &str) -> PrepResult<(usize, usize)> {
        let geographic = parse_wkt_polygons(footprint_wkt)?;
        let projected = transform_polygons(&geographic, &self.to_mask_crs)?;
        let covered = pixels_inside(
            self.mask.transform(),
            self.mask.rows(),
            self.mask.cols(),
            &projected,
        )?;

        let mut valid = 0;
        let mut invalid = 0;
        for (inside, value) in covered.iter().zip(self.mask.band(0).iter()) {
            if !inside {
                continue;
            }
            if *value == MASK_VALID {
                valid += 1;
            } else if *value == MASK_INVALID {
                invalid += 1;
            }
        }
        Ok((valid, invalid))
    }

    pub fn evaluate(&self, candidate: &SceneCandidate) -> PrepResult<OverlapReport> {
        let (valid, invalid) = self.count_pixels(&candidate.footprint)?;
        let percentage = valid_percentage(valid, invalid);
        let accepted =
            percentage >= self.params.min_valid_percent && valid >= self.params.min_valid_pixels;

        log::info!("Product ID: {}", candidate.identifier);
        log::info!("Percentage of valid pixels: {:.2}%", percentage);
        log::info!("With {} valid pixels", valid);

        Ok(OverlapReport {
            identifier: candidate.identifier.clone(),
            valid_pixels: valid,
            invalid_pixels: invalid,
            percentage,
            accepted,
        })
    }

    /// Keep the candidates meeting both thresholds, in input order.
    ///
    /// A candidate whose footprint cannot be parsed or projected is rejected
    /// with a warning instead of aborting the batch.
    pub fn filter(&self, candidates: &[SceneCandidate]) -> (Vec<SceneCandidate>, Vec<OverlapReport>) {
        let mut kept = Vec::new();
        let mut reports = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let report = match self.evaluate(candidate) {
                Ok(report) => report,
                Err(e) => {
                    log::warn!("Rejecting {}: {}", candidate.identifier, e);
                    OverlapReport {
                        identifier: candidate.identifier.clone(),
                        valid_pixels: 0,
                        invalid_pixels: 0,
                        percentage: 0.0,
                        accepted: false,
                    }
                }
            };
            if report.accepted {
                kept.push(candidate.clone());
            }
            reports.push(report);
        }

        log::info!("Kept {} of {} candidate products", kept.len(), candidates.len());
        (kept, reports)
    }
}
