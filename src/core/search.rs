//! Catalog search window around a sea-ice-thickness acquisition

use crate::core::footprint::Footprint;
use crate::io::catalog::{CloudCoverRange, SearchQuery};
use crate::io::safe::ProcessingLevel;
use crate::types::{PrepError, PrepResult};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Platform name used for every catalog query
pub const PLATFORM_NAME: &str = "Sentinel-2";

/// Acquisition time encoded in the leading `YYYYMMDD?HHMM` of a file name
pub fn acquisition_time_from_filename<P: AsRef<Path>>(path: P) -> PrepResult<DateTime<Utc>> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PrepError::InvalidFormat(format!("No file name in {}", path.display())))?;

    let pattern = regex::Regex::new(r"^(\d{4})(\d{2})(\d{2}).(\d{2})(\d{2})")
        .map_err(|e| PrepError::Processing(format!("Invalid time pattern: {}", e)))?;
    let captures = pattern.captures(name).ok_or_else(|| {
        PrepError::InvalidFormat(format!(
            "File name '{}' does not start with an acquisition time (YYYYMMDD?HHMM)",
            name
        ))
    })?;

    let field = |i: usize| -> PrepResult<u32> {
        captures
            .get(i)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .ok_or_else(|| PrepError::InvalidFormat(format!("Bad time field in '{}'", name)))
    };
    let (year, month, day, hour, minute) = (field(1)?, field(2)?, field(3)?, field(4)?, field(5)?);

    Utc.with_ymd_and_hms(year as i32, month, day, hour, minute, 0)
        .single()
        .ok_or_else(|| {
            PrepError::InvalidFormat(format!("File name '{}' holds an invalid date or time", name))
        })
}

/// Half-width of the search window, written `unit=N`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeDelta {
    Minutes(i64),
    Hours(i64),
    Days(i64),
}

impl TimeDelta {
    pub fn to_duration(&self) -> Duration {
        match *self {
            TimeDelta::Minutes(n) => Duration::minutes(n),
            TimeDelta::Hours(n) => Duration::hours(n),
            TimeDelta::Days(n) => Duration::days(n),
        }
    }
}

impl Default for TimeDelta {
    fn default() -> Self {
        TimeDelta::Hours(1)
    }
}

impl std::str::FromStr for TimeDelta {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (unit, amount) = s.split_once('=').ok_or_else(|| {
            PrepError::Config(format!("Time delta must look like 'hours=1', got '{}'", s))
        })?;
        let amount: i64 = amount
            .trim()
            .parse()
            .map_err(|_| PrepError::Config(format!("Invalid time delta amount in '{}'", s)))?;
        if amount < 0 {
            return Err(PrepError::Config(format!("Time delta must not be negative: '{}'", s)));
        }
        match unit.trim() {
            "minutes" => Ok(TimeDelta::Minutes(amount)),
            "hours" => Ok(TimeDelta::Hours(amount)),
            "days" => Ok(TimeDelta::Days(amount)),
            other => Err(PrepError::Config(format!(
                "Invalid time delta unit '{}', expected minutes, hours or days",
                other
            ))),
        }
    }
}

impl std::fmt::Display for TimeDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeDelta::Minutes(n) => write!(f, "minutes={}", n),
            TimeDelta::Hours(n) => write!(f, "hours={}", n),
            TimeDelta::Days(n) => write!(f, "days={}", n),
        }
    }
}

/// Closed time interval `[centre - delta, centre + delta]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SearchWindow {
    pub fn around(centre: DateTime<Utc>, delta: TimeDelta) -> Self {
        let d = delta.to_duration();
        Self {
            start: centre - d,
            end: centre + d,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    pub delta: TimeDelta,
    pub cloud_cover: CloudCoverRange,
    pub level: ProcessingLevel,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            delta: TimeDelta::default(),
            cloud_cover: CloudCoverRange::default(),
            level: ProcessingLevel::L1C,
        }
    }
}

/// Catalog query for scenes over `footprint` acquired near `time`
pub fn build_search_query(
    footprint: &Footprint,
    time: DateTime<Utc>,
    params: &SearchParams,
) -> SearchQuery {
    let window = SearchWindow::around(time, params.delta);
    log::info!(
        "Searching {} {} products between {} and {}",
        PLATFORM_NAME,
        params.level.product_type(),
        window.start,
        window.end
    );
    SearchQuery {
        footprint: footprint.to_wkt(),
        start: window.start,
        end: window.end,
        platform: PLATFORM_NAME.to_string(),
        cloud_cover: params.cloud_cover,
        product_type: params.level.product_type().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_from_filename() {
        let t = acquisition_time_from_filename("/data/sit/20200301T1034_cs2_sit.tif").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2020, 3, 1, 10, 34, 0).unwrap());

        let t = acquisition_time_from_filename("20191231_2359.tif").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2019, 12, 31, 23, 59, 0).unwrap());
    }

    #[test]
    fn test_bad_filename_time() {
        assert!(acquisition_time_from_filename("sit_20200301.tif").is_err());
        assert!(acquisition_time_from_filename("20201301T1034.tif").is_err());
    }

    #[test]
    fn test_time_delta_parsing() {
        assert_eq!("hours=1".parse::<TimeDelta>().unwrap(), TimeDelta::Hours(1));
        assert_eq!("minutes=30".parse::<TimeDelta>().unwrap(), TimeDelta::Minutes(30));
        assert_eq!("days=2".parse::<TimeDelta>().unwrap(), TimeDelta::Days(2));
        assert!("weeks=1".parse::<TimeDelta>().is_err());
        assert!("hours".parse::<TimeDelta>().is_err());
        assert!("hours=x".parse::<TimeDelta>().is_err());
        assert_eq!(TimeDelta::Minutes(15).to_string(), "minutes=15");
    }

    #[test]
    fn test_window_is_symmetric() {
        let centre = Utc.with_ymd_and_hms(2020, 3, 1, 10, 0, 0).unwrap();
        let window = SearchWindow::around(centre, TimeDelta::Minutes(90));
        assert_eq!(centre - window.start, Duration::minutes(90));
        assert_eq!(window.end - centre, Duration::minutes(90));
    }
}
