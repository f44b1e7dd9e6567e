use crate::types::{PrepError, PrepResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sentinel-2 scene metadata as returned by a catalog search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneCandidate {
    pub identifier: String,
    /// Footprint as WKT in geographic lon/lat
    pub footprint: String,
    #[serde(default, alias = "cloudcoverpercentage")]
    pub cloud_cover: Option<f64>,
    #[serde(default, alias = "beginposition")]
    pub acquired: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "producttype")]
    pub product_type: Option<String>,
}

/// Inclusive cloud cover percentage range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CloudCoverRange {
    pub min: f64,
    pub max: f64,
}

impl Default for CloudCoverRange {
    fn default() -> Self {
        Self { min: 0.0, max: 30.0 }
    }
}

impl CloudCoverRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl std::str::FromStr for CloudCoverRange {
    type Err = PrepError;

    /// Accepts `MIN,MAX`, optionally wrapped in parentheses or brackets
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches(|c| c == '(' || c == ')' || c == '[' || c == ']');
        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if parts.len() != 2 {
            return Err(PrepError::Config(format!(
                "Cloud cover must be given as MIN,MAX, got '{}'",
                s
            )));
        }
        let parse = |p: &str| {
            p.parse::<f64>()
                .map_err(|_| PrepError::Config(format!("Invalid cloud cover value '{}'", p)))
        };
        let (min, max) = (parse(parts[0])?, parse(parts[1])?);
        if !(0.0..=100.0).contains(&min) || !(0.0..=100.0).contains(&max) || min > max {
            return Err(PrepError::Config(format!(
                "Cloud cover range ({}, {}) must satisfy 0 <= min <= max <= 100",
                min, max
            )));
        }
        Ok(Self { min, max })
    }
}

/// Parameters handed to the external catalog search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Search polygon as WKT in geographic lon/lat
    pub footprint: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub platform: String,
    pub cloud_cover: CloudCoverRange,
    pub product_type: String,
}

impl SearchQuery {
    /// Whether a candidate's own metadata is compatible with the query.
    /// Missing fields are not held against the candidate.
    pub fn admits(&self, candidate: &SceneCandidate) -> bool {
        let cloud_ok = candidate
            .cloud_cover
            .map_or(true, |cc| self.cloud_cover.contains(cc));
        let time_ok = candidate
            .acquired
            .map_or(true, |t| t >= self.start && t <= self.end);
        let type_ok = candidate
            .product_type
            .as_deref()
            .map_or(true, |pt| pt == self.product_type);
        cloud_ok && time_ok && type_ok
    }
}

/// Source of scene candidates for a search query
pub trait SceneCatalog {
    fn search(&self, query: &SearchQuery) -> PrepResult<Vec<SceneCandidate>>;
}

/// Catalog backed by a JSON export of a previous search.
///
/// The file holds either a list of candidates or an object mapping scene ids
/// to candidate records.
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self) -> PrepResult<Vec<SceneCandidate>> {
        log::info!("Reading scene candidates from {}", self.path.display());
        let content = std::fs::read_to_string(&self.path)?;
        parse_candidates(&content)
    }
}

impl SceneCatalog for JsonCatalog {
    fn search(&self, query: &SearchQuery) -> PrepResult<Vec<SceneCandidate>> {
        let all = self.load()?;
        let total = all.len();
        let admitted: Vec<SceneCandidate> = all.into_iter().filter(|c| query.admits(c)).collect();
        log::info!(
            "{} of {} catalog entries match the search window and cloud cover",
            admitted.len(),
            total
        );
        Ok(admitted)
    }
}

/// Parse a candidate list or an id -> candidate map, keeping file order
pub fn parse_candidates(content: &str) -> PrepResult<Vec<SceneCandidate>> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    match value {
        serde_json::Value::Array(_) => Ok(serde_json::from_value(value)?),
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(_, record)| serde_json::from_value(record).map_err(PrepError::from))
            .collect(),
        _ => Err(PrepError::InvalidFormat(
            "Candidate file must hold a JSON list or object".to_string(),
        )),
    }
}
