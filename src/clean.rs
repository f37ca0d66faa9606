//! Merge pipeline: energy projection, year filter, missing-value policy,
//! income extraction, ISO normalisation, deduplication and the join.
//!
//! Every stage consumes its input and returns a new table; nothing is
//! modified in place.

use csv::{ReaderBuilder, Trim};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use tracing::{debug, info, trace, warn};

use crate::config::{AnalysisConfig, DedupPolicy};
use crate::error::{AnalysisError, Result};
use crate::models::{
    Cell, FinalDataset, FinalRecord, Grid, RawEnergyRecord, RawIncomeRecord, ENERGY_COLUMNS,
};

pub(crate) const ENERGY_SOURCE: &str = "energy source";
pub(crate) const INCOME_SOURCE: &str = "income source";

/// Energy row with every selected field present and the ISO key normalised.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EnergyRow {
    pub(crate) country: String,
    pub(crate) year: i32,
    pub(crate) iso: String,
    pub(crate) population: f64,
    pub(crate) electricity_demand: f64,
    pub(crate) ghg_emissions: f64,
    pub(crate) ff_share: f64,
    pub(crate) re_share: f64,
}

/// Reads the energy CSV, keeping only the eight selected columns.
pub(crate) fn project_energy<R: Read>(input: R) -> Result<Vec<RawEnergyRecord>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::Headers)
        .from_reader(input);

    let headers = rdr.headers()?.clone();
    for source in ENERGY_COLUMNS {
        if !headers.iter().any(|h| h == source) {
            return Err(AnalysisError::format(
                ENERGY_SOURCE,
                format!("required column '{source}' not found"),
            ));
        }
    }

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: RawEnergyRecord = result.map_err(|e| {
            if e.is_io_error() {
                AnalysisError::Csv(e)
            } else {
                AnalysisError::format(ENERGY_SOURCE, e.to_string())
            }
        })?;
        records.push(record);
    }

    info!("Projected {} energy rows", records.len());
    Ok(records)
}

pub(crate) fn filter_year(records: Vec<RawEnergyRecord>, target_year: i32) -> Vec<RawEnergyRecord> {
    let kept: Vec<RawEnergyRecord> = records
        .into_iter()
        .filter(|r| r.year == Some(target_year))
        .collect();
    info!("{} energy rows for year {}", kept.len(), target_year);
    kept
}

fn present_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn present_number(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Inclusive policy: a row missing any of the eight selected fields is dropped.
/// Non-finite measurements (`NaN`, `inf`) count as missing.
pub(crate) fn drop_incomplete_energy(records: Vec<RawEnergyRecord>) -> Vec<EnergyRow> {
    let total = records.len();
    let rows: Vec<EnergyRow> = records
        .into_iter()
        .filter_map(|r| {
            Some(EnergyRow {
                country: present_text(&r.country)?,
                year: r.year?,
                iso: r.iso.as_deref().and_then(normalize_iso_text)?,
                population: present_number(r.population)?,
                electricity_demand: present_number(r.electricity_demand)?,
                ghg_emissions: present_number(r.ghg_emissions)?,
                ff_share: present_number(r.ff_share)?,
                re_share: present_number(r.re_share)?,
            })
        })
        .collect();
    info!(
        "{} complete energy rows ({} dropped for missing values)",
        rows.len(),
        total - rows.len()
    );
    rows
}

pub(crate) fn normalize_iso_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// Canonical join key for a cell, whether the sheet stored it as text or as a number.
pub(crate) fn normalize_iso(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Text(text) => normalize_iso_text(text),
        Cell::Number(n) if n.is_nan() => None,
        Cell::Number(n) => Some(format_number(*n)),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn cell_text(cell: &Cell, config: &AnalysisConfig) -> Option<String> {
    let text = match cell {
        Cell::Empty => return None,
        Cell::Text(text) => text.trim().to_string(),
        Cell::Number(n) if n.is_nan() => return None,
        Cell::Number(n) => format_number(*n),
    };
    if text.is_empty() || config.is_missing_marker(&text) {
        None
    } else {
        Some(text)
    }
}

/// Pulls ISO, name and target-year classification out of the fixed-position block.
pub(crate) fn extract_income(grid: &Grid, config: &AnalysisConfig) -> Result<Vec<RawIncomeRecord>> {
    let layout = &config.income_layout;
    let widest = layout.iso_col.max(layout.name_col).max(layout.classification_col);
    if grid.width() <= widest {
        return Err(AnalysisError::format(
            INCOME_SOURCE,
            format!(
                "sheet '{}' has {} columns, layout needs column {}",
                layout.sheet,
                grid.width(),
                widest
            ),
        ));
    }
    if grid.height() <= layout.start_row {
        warn!(
            "Sheet '{}' has {} rows, classification block starts at row {}",
            layout.sheet,
            grid.height(),
            layout.start_row
        );
    }

    let records: Vec<RawIncomeRecord> = (layout.start_row..grid.height())
        .filter_map(|row| {
            let iso_cell = grid.get(row, layout.iso_col);
            if cell_text(iso_cell, config).is_none() {
                return None;
            }
            Some(RawIncomeRecord {
                iso: normalize_iso(iso_cell)?,
                country_name: cell_text(grid.get(row, layout.name_col), config)?,
                income_group: cell_text(grid.get(row, layout.classification_col), config)?,
            })
        })
        .collect();

    info!(
        "Extracted {} classified countries from sheet '{}'",
        records.len(),
        layout.sheet
    );
    Ok(records)
}

/// Enforces one row per ISO code.
pub(crate) fn dedup_by_iso<T>(
    rows: Vec<T>,
    iso: impl Fn(&T) -> &str,
    policy: DedupPolicy,
    source_name: &str,
) -> Result<Vec<T>> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows {
        let key = iso(&row).to_string();
        if seen.insert(key.clone()) {
            kept.push(row);
            continue;
        }
        match policy {
            DedupPolicy::FirstSeen => warn!("Dropping duplicate ISO code {} in {}", key, source_name),
            DedupPolicy::Reject => {
                return Err(AnalysisError::DuplicateKey {
                    source_name: source_name.to_string(),
                    iso: key,
                })
            }
        }
    }
    Ok(kept)
}

/// Left join on ISO followed by dropping rows left without a classification.
pub(crate) fn join_income(
    energy: Vec<EnergyRow>,
    income: &[RawIncomeRecord],
    target_year: i32,
) -> FinalDataset {
    let groups: HashMap<&str, &RawIncomeRecord> = income.iter().map(|r| (r.iso.as_str(), r)).collect();

    let candidates = energy.len();
    let records: Vec<FinalRecord> = energy
        .into_iter()
        .filter_map(|row| {
            let Some(classified) = groups.get(row.iso.as_str()) else {
                debug!("No income classification for {} ({})", row.iso, row.country);
                return None;
            };
            trace!("{} matched {} as {}", row.iso, classified.country_name, classified.income_group);
            Some(FinalRecord {
                country: row.country,
                year: row.year,
                iso: row.iso,
                population: row.population,
                electricity_demand: row.electricity_demand,
                ghg_emissions: row.ghg_emissions,
                ff_share: row.ff_share,
                re_share: row.re_share,
                income_group: classified.income_group.clone(),
            })
        })
        .collect();

    info!(
        "Joined {} of {} energy rows to an income classification",
        records.len(),
        candidates
    );
    FinalDataset::new(target_year, records)
}

/// Runs every merge stage. An empty result is not an error here.
pub(crate) fn build_final_dataset(
    energy: Vec<RawEnergyRecord>,
    income: &Grid,
    config: &AnalysisConfig,
) -> Result<FinalDataset> {
    let year_rows = filter_year(energy, config.target_year);
    let complete = drop_incomplete_energy(year_rows);
    let energy_rows = dedup_by_iso(complete, |r| r.iso.as_str(), config.dedup, ENERGY_SOURCE)?;

    let income_rows = extract_income(income, config)?;
    let income_rows = dedup_by_iso(income_rows, |r| r.iso.as_str(), config.dedup, INCOME_SOURCE)?;

    Ok(join_income(energy_rows, &income_rows, config.target_year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IncomeLayout;
    use crate::models::NumericField;

    const HEADER: &str = "country,year,iso_code,population,electricity_demand,\
greenhouse_gas_emissions,fossil_share_elec,renewables_share_elec,coal_share_elec";

    fn energy(rows: &[&str]) -> Vec<RawEnergyRecord> {
        let text = format!("{HEADER}\n{}\n", rows.join("\n"));
        project_energy(text.as_bytes()).unwrap()
    }

    fn test_config() -> AnalysisConfig {
        AnalysisConfig {
            income_layout: IncomeLayout {
                sheet: "test".to_string(),
                start_row: 2,
                iso_col: 0,
                name_col: 1,
                classification_col: 3,
            },
            ..AnalysisConfig::default()
        }
    }

    /// Two metadata rows, then (iso, name, older year, target year).
    fn income(rows: &[(&str, &str, &str)]) -> Grid {
        let mut grid = vec![
            vec![Cell::text("World Bank Analytical Classifications")],
            vec![Cell::Empty, Cell::Empty, Cell::text("FY22"), Cell::text("FY23")],
        ];
        for (iso, name, group) in rows {
            grid.push(vec![Cell::text(iso), Cell::text(name), Cell::text("L"), Cell::text(group)]);
        }
        Grid::new(grid)
    }

    #[test]
    fn filters_to_target_year_and_joins_income_group() {
        let raw = energy(&[
            "Aland,2021,AAA,1000,50,10,80,20,5",
            "Bland,2020,BBB,2000,60,11,70,30,5",
        ]);
        let data = build_final_dataset(raw, &income(&[("AAA", "Aland", "H")]), &test_config()).unwrap();

        assert_eq!(data.len(), 1);
        let row = &data.records()[0];
        assert_eq!(row.iso, "AAA");
        assert_eq!(row.income_group, "H");
        assert_eq!(row.year, 2021);
        assert_eq!(row.population, 1000.0);
        assert_eq!(row.electricity_demand, 50.0);
        assert_eq!(row.ghg_emissions, 10.0);
        assert_eq!(row.ff_share, 80.0);
        assert_eq!(row.re_share, 20.0);
    }

    #[test]
    fn unmatched_energy_row_survives_cleaning_but_not_the_join() {
        let raw = energy(&[
            "Aland,2021,AAA,1000,50,10,80,20,",
            "Cland,2021,CCC,3000,70,12,60,40,",
        ]);
        let cleaned = drop_incomplete_energy(filter_year(raw.clone(), 2021));
        assert!(cleaned.iter().any(|r| r.iso == "CCC"));

        let data = build_final_dataset(raw, &income(&[("AAA", "Aland", "LM")]), &test_config()).unwrap();
        assert!(data.records().iter().all(|r| r.iso != "CCC"));
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn rows_missing_any_selected_field_are_dropped() {
        let raw = energy(&[
            ",2021,AAA,1000,50,10,80,20,",
            "Bland,2021,,1000,50,10,80,20,",
            "Cland,2021,CCC,,50,10,80,20,",
            "Dland,2021,DDD,1000,50,NaN,80,20,",
            "Eland,2021,EEE,1000,50,10,80,20,",
        ]);
        let rows = drop_incomplete_energy(filter_year(raw, 2021));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].iso, "EEE");
    }

    #[test]
    fn infinite_measurement_is_treated_as_missing() {
        let raw = energy(&[
            "Aland,2021,AAA,1,2,3,4,5,",
            "Bland,2021,BBB,inf,2,3,4,5,",
            "Cland,2021,CCC,1,2,-inf,4,5,",
        ]);
        let grid = income(&[("AAA", "Aland", "H"), ("BBB", "Bland", "L"), ("CCC", "Cland", "UM")]);
        let data = build_final_dataset(raw, &grid, &test_config()).unwrap();

        assert_eq!(data.len(), 1);
        assert_eq!(data.records()[0].iso, "AAA");
        assert!(data
            .records()
            .iter()
            .all(|r| NumericField::ALL.iter().all(|f| f.value(r).is_finite())));
    }

    #[test]
    fn duplicate_energy_rows_do_not_fan_out() {
        let raw = energy(&[
            "Aland,2021,AAA,1000,50,10,80,20,",
            "Aland (revised),2021,aaa,1100,55,11,75,25,",
            "Bland,2021,BBB,2000,60,11,70,30,",
        ]);
        let grid = income(&[("AAA", "Aland", "H"), ("BBB", "Bland", "L")]);

        let data = build_final_dataset(raw.clone(), &grid, &test_config()).unwrap();
        assert_eq!(data.len(), 2);
        let aaa: Vec<_> = data.records().iter().filter(|r| r.iso == "AAA").collect();
        assert_eq!(aaa.len(), 1);
        assert_eq!(aaa[0].population, 1000.0);

        let strict = AnalysisConfig {
            dedup: DedupPolicy::Reject,
            ..test_config()
        };
        assert!(matches!(
            build_final_dataset(raw, &grid, &strict),
            Err(AnalysisError::DuplicateKey { ref source_name, .. }) if source_name == ENERGY_SOURCE
        ));
    }

    #[test]
    fn missing_energy_column_is_a_format_error() {
        let text = "country,year,iso_code,population\nAland,2021,AAA,1000\n";
        let err = project_energy(text.as_bytes()).unwrap_err();
        assert!(matches!(err, AnalysisError::SourceFormat { .. }));
        assert!(err.to_string().contains("electricity_demand"));
    }

    #[test]
    fn non_numeric_measurement_is_a_format_error() {
        let text = format!("{HEADER}\nAland,2021,AAA,lots,50,10,80,20,\n");
        assert!(matches!(
            project_energy(text.as_bytes()),
            Err(AnalysisError::SourceFormat { .. })
        ));
    }

    #[test]
    fn year_without_matches_gives_empty_dataset() {
        let raw = energy(&["Aland,2019,AAA,1000,50,10,80,20,"]);
        let data = build_final_dataset(raw, &income(&[("AAA", "Aland", "H")]), &test_config()).unwrap();
        assert!(data.is_empty());
        assert!(data.require_non_empty().is_err());
    }

    #[test]
    fn iso_keys_normalise_across_cell_types() {
        assert_eq!(normalize_iso(&Cell::text("  abc ")), Some("ABC".to_string()));
        assert_eq!(normalize_iso(&Cell::Number(4.0)), Some("4".to_string()));
        assert_eq!(normalize_iso(&Cell::Number(f64::NAN)), None);
        assert_eq!(normalize_iso(&Cell::text("   ")), None);
        assert_eq!(normalize_iso(&Cell::Empty), None);
    }

    #[test]
    fn numeric_iso_in_sheet_joins_text_iso_in_csv() {
        let raw = energy(&["Numland,2021, 4 ,1000,50,10,80,20,"]);
        let grid = Grid::new(vec![
            vec![Cell::Empty],
            vec![Cell::Empty],
            vec![Cell::Number(4.0), Cell::text("Numland"), Cell::Empty, Cell::text("UM")],
        ]);
        let data = build_final_dataset(raw, &grid, &test_config()).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data.records()[0].iso, "4");
    }

    #[test]
    fn income_rows_with_missing_or_placeholder_values_are_dropped() {
        let grid = income(&[
            ("AAA", "Aland", "H"),
            ("BBB", "Bland", ".."),
            ("", "Nowhere", "L"),
            ("DDD", "", "LM"),
        ]);
        let rows = extract_income(&grid, &test_config()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].iso, "AAA");
        assert_eq!(rows[0].country_name, "Aland");
    }

    #[test]
    fn metadata_rows_are_skipped_by_offset() {
        let grid = income(&[("AAA", "Aland", "H")]);
        let rows = extract_income(&grid, &test_config()).unwrap();
        assert!(rows.iter().all(|r| r.income_group != "FY23"));
    }

    #[test]
    fn narrow_sheet_is_a_format_error() {
        let grid = Grid::new(vec![vec![Cell::text("AAA"), Cell::text("Aland")]; 4]);
        assert!(matches!(
            extract_income(&grid, &test_config()),
            Err(AnalysisError::SourceFormat { .. })
        ));
    }

    #[test]
    fn duplicates_keep_first_or_fail() {
        let grid = income(&[("AAA", "Aland", "H"), ("aaa", "Aland again", "L")]);
        let rows = extract_income(&grid, &test_config()).unwrap();

        let kept = dedup_by_iso(rows.clone(), |r| r.iso.as_str(), DedupPolicy::FirstSeen, INCOME_SOURCE)
            .unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].income_group, "H");

        let err = dedup_by_iso(rows, |r| r.iso.as_str(), DedupPolicy::Reject, INCOME_SOURCE).unwrap_err();
        assert!(matches!(err, AnalysisError::DuplicateKey { ref iso, .. } if iso == "AAA"));
    }

    #[test]
    fn pipeline_is_idempotent_and_keeps_invariants() {
        let rows = [
            "Aland,2021,AAA,1000,50,10,80,20,",
            "Bland,2021,BBB,2000,60,11,70,30,",
            "Cland,2021,CCC,3000,70,12,60,40,",
            "Aland,2020,AAA,900,45,9,82,18,",
            "World,2021,OWID_WRL,8000000,25000,50000,61,39,",
        ];
        let grid = income(&[("AAA", "Aland", "H"), ("BBB", "Bland", "L"), ("ZZZ", "Zland", "UM")]);
        let config = test_config();

        let first = build_final_dataset(energy(&rows), &grid, &config).unwrap();
        let second = build_final_dataset(energy(&rows), &grid, &config).unwrap();

        let mut a: Vec<_> = first.records().iter().map(|r| r.iso.clone()).collect();
        let mut b: Vec<_> = second.records().iter().map(|r| r.iso.clone()).collect();
        a.sort();
        b.sort();
        assert_eq!(a, vec!["AAA", "BBB"]);
        assert_eq!(a, b);
        assert_eq!(first, second);

        for record in first.records() {
            assert_eq!(record.year, 2021);
            assert!(!record.country.is_empty());
            assert!(!record.income_group.is_empty());
        }
    }
}
