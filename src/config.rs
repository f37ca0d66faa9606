//! Run configuration.
//!
//! Read from `energy_income.toml` in the working directory when it exists;
//! every key is optional and falls back to the values below.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;

pub(crate) const CONFIG_FILE: &str = "energy_income.toml";

/// Fixed positions of the classification block inside the income workbook.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct IncomeLayout {
    pub(crate) sheet: String,
    /// Absolute sheet row where country rows begin (header row plus metadata rows).
    pub(crate) start_row: usize,
    pub(crate) iso_col: usize,
    pub(crate) name_col: usize,
    /// Column holding the classification for the target fiscal year.
    pub(crate) classification_col: usize,
}

impl Default for IncomeLayout {
    fn default() -> Self {
        IncomeLayout {
            sheet: "Country Analytical History".to_string(),
            start_row: 12,
            iso_col: 0,
            name_col: 1,
            classification_col: 36, // FY23, i.e. calendar year 2021
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum DedupPolicy {
    /// Keep the first row seen for an ISO code and drop the rest.
    FirstSeen,
    /// Fail the run on the first repeated ISO code.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct AnalysisConfig {
    pub(crate) energy_path: PathBuf,
    pub(crate) income_path: PathBuf,
    pub(crate) target_year: i32,
    pub(crate) income_layout: IncomeLayout,
    pub(crate) missing_markers: Vec<String>,
    pub(crate) dedup: DedupPolicy,
    pub(crate) require_non_empty: bool,
    pub(crate) figure_path: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            energy_path: PathBuf::from("owid-energy-data.csv"),
            income_path: PathBuf::from("income_classification.xlsx"),
            target_year: 2021,
            income_layout: IncomeLayout::default(),
            missing_markers: vec![String::new(), "..".to_string()],
            dedup: DedupPolicy::FirstSeen,
            require_non_empty: true,
            figure_path: PathBuf::from("correlations.png"),
        }
    }
}

impl AnalysisConfig {
    pub(crate) fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No {} found, using default configuration", path.display());
            return Ok(AnalysisConfig::default());
        }
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub(crate) fn is_missing_marker(&self, text: &str) -> bool {
        let trimmed = text.trim();
        self.missing_markers.iter().any(|m| m.trim() == trimmed)
    }
}
