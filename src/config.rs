//! Run configuration, loadable from a JSON file and overridden from the CLI.

use crate::error::{GbRegionsError, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_OUTPUT_ROOT: &str = "Results";

/// Functional regions offered for selection.
pub const KNOWN_REGION_TYPES: &[&str] = &[
    "CDS",
    "centromere",
    "intron",
    "mobile_element",
    "ncRNA",
    "rRNA",
    "telomere",
    "tRNA",
    "3'UTR",
    "5'UTR",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Root of the organism tree; organism directories live below it.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Log every extracted sequence at debug level.
    #[serde(default)]
    pub log_sequences: bool,
    #[serde(default = "default_region_types")]
    pub region_types: Vec<String>,
}

fn default_output_root() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_ROOT)
}

fn default_region_types() -> Vec<String> {
    KNOWN_REGION_TYPES.iter().map(|s| s.to_string()).collect()
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            log_sequences: false,
            region_types: default_region_types(),
        }
    }
}

impl ExtractionConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            GbRegionsError::String(format!(
                "Could not read configuration '{}': {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            GbRegionsError::String(format!(
                "Could not parse configuration '{}': {e}",
                path.display()
            ))
        })
    }

    pub fn is_known_region(&self, region_type: &str) -> bool {
        self.region_types.iter().any(|known| known == region_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let td = tempdir().unwrap();
        let path = td.path().join("config.json");
        fs::write(&path, r#"{ "log_sequences": true }"#).unwrap();
        let config = ExtractionConfig::from_json_file(&path).unwrap();
        assert!(config.log_sequences);
        assert_eq!(config.output_root, PathBuf::from(DEFAULT_OUTPUT_ROOT));
        assert!(config.is_known_region("tRNA"));
        assert!(config.is_known_region("3'UTR"));
        assert!(!config.is_known_region("trna"));
    }

    #[test]
    fn test_custom_region_list() {
        let td = tempdir().unwrap();
        let path = td.path().join("config.json");
        fs::write(
            &path,
            r#"{ "output_root": "/tmp/out", "region_types": ["misc_RNA"] }"#,
        )
        .unwrap();
        let config = ExtractionConfig::from_json_file(&path).unwrap();
        assert_eq!(config.output_root, PathBuf::from("/tmp/out"));
        assert!(config.is_known_region("misc_RNA"));
        assert!(!config.is_known_region("CDS"));
    }

    #[test]
    fn test_malformed_config_names_the_file() {
        let td = tempdir().unwrap();
        let path = td.path().join("broken.json");
        fs::write(&path, "{").unwrap();
        let err = ExtractionConfig::from_json_file(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
