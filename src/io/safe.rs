//! Sentinel-2 SAFE product layout

use crate::types::{PrepError, PrepResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sentinel-2 processing level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingLevel {
    /// Top-of-atmosphere reflectance
    L1C,
    /// Bottom-of-atmosphere reflectance
    L2A,
}

const LEVELS: &[(&str, ProcessingLevel)] = &[("L1C", ProcessingLevel::L1C), ("L2A", ProcessingLevel::L2A)];

const L1C_BANDS: &[&str] = &[
    "B01", "B02", "B03", "B04", "B05", "B06", "B07", "B08", "B8A", "B09", "B10", "B11", "B12",
];

const L2A_BANDS: &[&str] = &[
    "B01", "B02", "B03", "B04", "B05", "B06", "B07", "B8A", "B09", "B11", "B12",
];

/// L2A resolution folders, finest first
const L2A_RESOLUTIONS: &[&str] = &["R10m", "R20m", "R60m"];

impl ProcessingLevel {
    pub fn name(&self) -> &'static str {
        match self {
            ProcessingLevel::L1C => "L1C",
            ProcessingLevel::L2A => "L2A",
        }
    }

    /// Bands published at this level, in catalog order
    pub fn bands(&self) -> &'static [&'static str] {
        match self {
            ProcessingLevel::L1C => L1C_BANDS,
            ProcessingLevel::L2A => L2A_BANDS,
        }
    }

    /// Fragment present in product directory names
    pub fn product_pattern(&self) -> &'static str {
        match self {
            ProcessingLevel::L1C => "MSIL1C",
            ProcessingLevel::L2A => "MSIL2A",
        }
    }

    /// Catalog product type
    pub fn product_type(&self) -> &'static str {
        match self {
            ProcessingLevel::L1C => "S2MSI1C",
            ProcessingLevel::L2A => "S2MSI2A",
        }
    }
}

impl std::str::FromStr for ProcessingLevel {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        LEVELS
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, level)| *level)
            .ok_or_else(|| {
                PrepError::Config(format!(
                    "Processing level must either be L1C or L2A, got '{}'",
                    s
                ))
            })
    }
}

impl std::fmt::Display for ProcessingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Resolve the requested band list against a processing level.
///
/// An empty request or `all` selects every band. Requested order is kept and
/// bands the level does not publish are dropped with a warning.
pub fn select_bands<S: AsRef<str>>(level: ProcessingLevel, requested: &[S]) -> PrepResult<Vec<String>> {
    let wants_all = requested.is_empty()
        || requested
            .iter()
            .any(|b| b.as_ref().eq_ignore_ascii_case("all"));
    if wants_all {
        return Ok(level.bands().iter().map(|b| b.to_string()).collect());
    }

    let mut selected: Vec<String> = Vec::new();
    for band in requested {
        let band = band.as_ref().trim().to_uppercase();
        if !level.bands().contains(&band.as_str()) {
            log::warn!("Band {} is not available for {} products, skipping", band, level);
            continue;
        }
        if !selected.contains(&band) {
            selected.push(band);
        }
    }

    if selected.is_empty() {
        return Err(PrepError::Config(format!(
            "Bands must contain at least one of: {}",
            level.bands().join(", ")
        )));
    }
    Ok(selected)
}

fn sorted_entries(dir: &Path) -> PrepResult<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

/// One `.SAFE` product directory
#[derive(Debug, Clone, PartialEq)]
pub struct SafeProduct {
    path: PathBuf,
    name: String,
    level: ProcessingLevel,
}

impl SafeProduct {
    pub fn new<P: AsRef<Path>>(path: P, level: ProcessingLevel) -> Self {
        let path = path.as_ref().to_path_buf();
        let base = file_name(&path);
        let name = base.strip_suffix(".SAFE").unwrap_or(base).to_string();
        Self { path, name, level }
    }

    /// Products of `level` directly inside `dir`, sorted by name
    pub fn discover<P: AsRef<Path>>(dir: P, level: ProcessingLevel) -> PrepResult<Vec<Self>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(PrepError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Product directory not found: {}", dir.display()),
            )));
        }
        let products: Vec<Self> = sorted_entries(dir)?
            .into_iter()
            .filter(|p| p.is_dir() && file_name(p).contains(level.product_pattern()))
            .map(|p| Self::new(p, level))
            .collect();
        log::info!(
            "Found {} {} product(s) in {}",
            products.len(),
            level,
            dir.display()
        );
        Ok(products)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Product name without the `.SAFE` suffix
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> ProcessingLevel {
        self.level
    }

    /// Image folders to search for band files, finest resolution first
    pub fn image_dirs(&self) -> PrepResult<Vec<PathBuf>> {
        let granule = self.path.join("GRANULE");
        if !granule.is_dir() {
            return Err(PrepError::InvalidFormat(format!(
                "No GRANULE folder in {}",
                self.path.display()
            )));
        }

        let mut dirs = Vec::new();
        for tile in sorted_entries(&granule)? {
            if !file_name(&tile).starts_with('L') {
                continue;
            }
            let img_data = tile.join("IMG_DATA");
            if !img_data.is_dir() {
                continue;
            }
            match self.level {
                ProcessingLevel::L1C => dirs.push(img_data),
                ProcessingLevel::L2A => dirs.extend(
                    L2A_RESOLUTIONS
                        .iter()
                        .map(|r| img_data.join(r))
                        .filter(|d| d.is_dir()),
                ),
            }
        }

        if dirs.is_empty() {
            return Err(PrepError::InvalidFormat(format!(
                "No IMG_DATA folder found under {}",
                granule.display()
            )));
        }
        Ok(dirs)
    }

    /// Image file holding `band`, taken from the finest resolution folder
    /// that contains it
    pub fn band_file(&self, band: &str) -> PrepResult<PathBuf> {
        let pattern = regex::Regex::new(&format!(
            r"_{}(_\d+m)?\.(jp2|tif|tiff)$",
            regex::escape(band)
        ))
        .map_err(|e| PrepError::Processing(format!("Invalid band pattern: {}", e)))?;

        for dir in self.image_dirs()? {
            if let Some(found) = sorted_entries(&dir)?
                .into_iter()
                .find(|p| p.is_file() && pattern.is_match(file_name(p)))
            {
                log::debug!("Band {} -> {}", band, found.display());
                return Ok(found);
            }
        }

        Err(PrepError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Band {} not found in {}", band, self.name),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("l2a".parse::<ProcessingLevel>().unwrap(), ProcessingLevel::L2A);
        assert!("L3".parse::<ProcessingLevel>().is_err());
        assert_eq!(ProcessingLevel::L1C.bands().len(), 13);
        assert_eq!(ProcessingLevel::L2A.bands().len(), 11);
        assert!(!ProcessingLevel::L2A.bands().contains(&"B10"));
    }

    #[test]
    fn test_band_selection() {
        let all = select_bands::<&str>(ProcessingLevel::L1C, &[]).unwrap();
        assert_eq!(all.len(), 13);
        let all = select_bands(ProcessingLevel::L2A, &["all"]).unwrap();
        assert_eq!(all.len(), 11);

        let picked = select_bands(ProcessingLevel::L2A, &["B04", "B10", "b02"]).unwrap();
        assert_eq!(picked, vec!["B04".to_string(), "B02".to_string()]);

        assert!(select_bands(ProcessingLevel::L2A, &["B10"]).is_err());
    }

    #[test]
    fn test_discover_and_l1c_band_file() {
        let root = tempfile::tempdir().unwrap();
        let product = root.path().join("S2A_MSIL1C_20200301T101021_N0209_R022_T33XWG.SAFE");
        let img = product.join("GRANULE/L1C_T33XWG_A024441/IMG_DATA");
        touch(&img.join("T33XWG_20200301T101021_B08.jp2"));
        touch(&img.join("T33XWG_20200301T101021_B8A.jp2"));
        fs::create_dir_all(root.path().join("S2B_MSIL2A_other.SAFE")).unwrap();

        let products = SafeProduct::discover(root.path(), ProcessingLevel::L1C).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(
            products[0].name(),
            "S2A_MSIL1C_20200301T101021_N0209_R022_T33XWG"
        );

        let b8a = products[0].band_file("B8A").unwrap();
        assert!(b8a.ends_with("T33XWG_20200301T101021_B8A.jp2"));
        let b08 = products[0].band_file("B08").unwrap();
        assert!(b08.ends_with("T33XWG_20200301T101021_B08.jp2"));
        assert!(products[0].band_file("B02").is_err());
    }

    #[test]
    fn test_l2a_prefers_finest_resolution() {
        let root = tempfile::tempdir().unwrap();
        let product = SafeProduct::new(root.path().join("S2A_MSIL2A_x.SAFE"), ProcessingLevel::L2A);
        let img = product.path().join("GRANULE/L2A_T33XWG/IMG_DATA");
        touch(&img.join("R20m/T33XWG_B02_20m.jp2"));
        touch(&img.join("R10m/T33XWG_B02_10m.jp2"));
        touch(&img.join("R60m/T33XWG_B01_60m.jp2"));

        assert_eq!(product.image_dirs().unwrap().len(), 3);
        assert!(product.band_file("B02").unwrap().ends_with("R10m/T33XWG_B02_10m.jp2"));
        // Only present at 60 m
        assert!(product.band_file("B01").unwrap().ends_with("R60m/T33XWG_B01_60m.jp2"));
    }
}
