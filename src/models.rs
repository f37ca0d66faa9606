use ndarray::Array1;
use serde::Deserialize;

use crate::error::{AnalysisError, Result};

/// Source column names the energy projection needs.
pub(crate) const ENERGY_COLUMNS: [&str; 8] = [
    "country",
    "year",
    "iso_code",
    "population",
    "electricity_demand",
    "greenhouse_gas_emissions",
    "fossil_share_elec",
    "renewables_share_elec",
];

/// One country-year row of the energy source, restricted to the selected fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct RawEnergyRecord {
    #[serde(rename = "country")]
    pub(crate) country: Option<String>,
    #[serde(rename = "year")]
    pub(crate) year: Option<i32>,
    #[serde(rename = "iso_code")]
    pub(crate) iso: Option<String>,
    #[serde(rename = "population")]
    pub(crate) population: Option<f64>,
    #[serde(rename = "electricity_demand")]
    pub(crate) electricity_demand: Option<f64>,
    #[serde(rename = "greenhouse_gas_emissions")]
    pub(crate) ghg_emissions: Option<f64>,
    #[serde(rename = "fossil_share_elec")]
    pub(crate) ff_share: Option<f64>,
    #[serde(rename = "renewables_share_elec")]
    pub(crate) re_share: Option<f64>,
}

/// A single spreadsheet value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub(crate) fn text(value: &str) -> Cell {
        Cell::Text(value.to_string())
    }
}

/// Position-addressed sheet contents. Rows may be ragged.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Grid {
    pub(crate) rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub(crate) fn new(rows: Vec<Vec<Cell>>) -> Self {
        Grid { rows }
    }

    pub(crate) fn height(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub(crate) fn get(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&Cell::Empty)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawIncomeRecord {
    pub(crate) iso: String,
    pub(crate) country_name: String,
    pub(crate) income_group: String,
}

/// World Bank income classification codes, low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum IncomeGroup {
    Low,
    LowerMiddle,
    UpperMiddle,
    High,
}

impl IncomeGroup {
    pub(crate) fn from_code(code: &str) -> Option<IncomeGroup> {
        match code.trim() {
            "L" => Some(IncomeGroup::Low),
            "LM" => Some(IncomeGroup::LowerMiddle),
            "UM" => Some(IncomeGroup::UpperMiddle),
            "H" => Some(IncomeGroup::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FinalRecord {
    pub(crate) country: String,
    pub(crate) year: i32,
    pub(crate) iso: String,
    pub(crate) population: f64,
    pub(crate) electricity_demand: f64,
    pub(crate) ghg_emissions: f64,
    pub(crate) ff_share: f64,
    pub(crate) re_share: f64,
    pub(crate) income_group: String,
}

/// The five numeric fields carried into the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NumericField {
    Population,
    ElectricityDemand,
    GhgEmissions,
    FfShare,
    ReShare,
}

impl NumericField {
    pub(crate) const ALL: [NumericField; 5] = [
        NumericField::Population,
        NumericField::ElectricityDemand,
        NumericField::GhgEmissions,
        NumericField::FfShare,
        NumericField::ReShare,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            NumericField::Population => "Population",
            NumericField::ElectricityDemand => "Electricity demand",
            NumericField::GhgEmissions => "GHG emissions",
            NumericField::FfShare => "FF electricity share",
            NumericField::ReShare => "RE electricity share",
        }
    }

    /// Decimal places used when the field is reported.
    pub(crate) fn precision(self) -> i32 {
        match self {
            NumericField::Population => 0,
            _ => 2,
        }
    }

    pub(crate) fn value(self, record: &FinalRecord) -> f64 {
        match self {
            NumericField::Population => record.population,
            NumericField::ElectricityDemand => record.electricity_demand,
            NumericField::GhgEmissions => record.ghg_emissions,
            NumericField::FfShare => record.ff_share,
            NumericField::ReShare => record.re_share,
        }
    }
}

/// Merged, cleaned table for one reference year. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FinalDataset {
    target_year: i32,
    records: Vec<FinalRecord>,
}

impl FinalDataset {
    pub(crate) fn new(target_year: i32, records: Vec<FinalRecord>) -> Self {
        FinalDataset { target_year, records }
    }

    pub(crate) fn target_year(&self) -> i32 {
        self.target_year
    }

    pub(crate) fn records(&self) -> &[FinalRecord] {
        &self.records
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn column(&self, field: NumericField) -> Array1<f64> {
        self.records.iter().map(|r| field.value(r)).collect()
    }

    pub(crate) fn require_non_empty(&self) -> Result<&Self> {
        if self.is_empty() {
            Err(AnalysisError::EmptyDataset { year: self.target_year })
        } else {
            Ok(self)
        }
    }
}
