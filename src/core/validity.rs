use crate::types::{GeoGrid, PixelType, PrepError, PrepResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Mask value for pixels satisfying the validity rule
pub const MASK_VALID: f64 = 100.0;
/// Mask value for pixels failing the validity rule
pub const MASK_INVALID: f64 = 0.0;
/// Background written outside clipped regions; never produced by the builder
pub const MASK_BACKGROUND: f64 = 255.0;

/// Which source pixel values count as valid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidityRule {
    /// `lo <= value <= hi`
    Interval { lo: f64, hi: f64 },
    /// Value is one of an explicit set of integers
    Values(BTreeSet<i64>),
}

impl ValidityRule {
    /// Build the rule from the two mutually exclusive options.
    ///
    /// An interval of `(0, 0)` counts as not supplied.
    pub fn from_options(interval: Option<(f64, f64)>, values: &[i64]) -> PrepResult<Self> {
        let interval = interval.filter(|&(lo, hi)| !(lo == 0.0 && hi == 0.0));

        match (interval, values.is_empty()) {
            (Some(_), false) => Err(PrepError::Config(
                "Validity interval and validity values are mutually exclusive".to_string(),
            )),
            (None, true) => Err(PrepError::Config(
                "Need input for either a validity interval or validity values".to_string(),
            )),
            (Some((lo, hi)), true) => {
                if lo.is_nan() || hi.is_nan() || lo > hi {
                    return Err(PrepError::Config(format!(
                        "Invalid validity interval [{}, {}]",
                        lo, hi
                    )));
                }
                Ok(ValidityRule::Interval { lo, hi })
            }
            (None, false) => Ok(ValidityRule::Values(values.iter().copied().collect())),
        }
    }

    pub fn is_valid(&self, value: f64) -> bool {
        match self {
            ValidityRule::Interval { lo, hi } => value >= *lo && value <= *hi,
            ValidityRule::Values(set) => {
                value.is_finite() && value.fract() == 0.0 && set.contains(&(value as i64))
            }
        }
    }
}

/// Classify every pixel of the first band as valid (100) or invalid (0).
///
/// The result keeps the source transform and CRS, is stored as UInt8 and uses
/// [`MASK_BACKGROUND`] as its nodata value.
pub fn build_validity_mask(grid: &GeoGrid, rule: &ValidityRule) -> PrepResult<GeoGrid> {
    log::info!("Creating validity mask ({}x{})", grid.rows(), grid.cols());

    let mask = grid
        .band(0)
        .mapv(|v| if rule.is_valid(v) { MASK_VALID } else { MASK_INVALID });

    let valid = mask.iter().filter(|&&v| v == MASK_VALID).count();
    log::debug!(
        "Validity mask: {} of {} pixels valid ({:.2}%)",
        valid,
        mask.len(),
        valid as f64 / mask.len() as f64 * 100.0
    );

    GeoGrid::single_band(
        mask,
        *grid.transform(),
        grid.crs().clone(),
        Some(MASK_BACKGROUND),
        PixelType::UInt8,
    )
}
