use itertools::Itertools;
use ndarray::{Array1, Array2};
use ndarray_stats::interpolate::Linear;
use ndarray_stats::{Quantile1dExt, QuantileExt};
use noisy_float::types::{n64, N64};
use ordered_float::NotNan;
use statrs::statistics::{Data, Median};
use std::fmt;

use crate::models::{FinalDataset, NumericField};

pub(crate) const CENTRAL_ROWS: [&str; 3] = ["mean", "median", "mode"];
pub(crate) const DISPERSION_ROWS: [&str; 7] = ["st.dev.", "min", "max", "range", "25th", "75th", "IQR"];

/// Statistic-by-field table. `None` marks a statistic with no defined value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SummaryTable {
    pub(crate) title: &'static str,
    pub(crate) statistics: Vec<&'static str>,
    pub(crate) fields: Vec<NumericField>,
    pub(crate) values: Array2<Option<f64>>,
}

impl SummaryTable {
    fn from_columns(
        title: &'static str,
        statistics: &[&'static str],
        columns: Vec<(NumericField, Vec<Option<f64>>)>,
    ) -> Self {
        let fields: Vec<NumericField> = columns.iter().map(|(f, _)| *f).collect();
        let mut values = Array2::from_elem((statistics.len(), fields.len()), None);
        for (j, (_, column)) in columns.into_iter().enumerate() {
            for (i, value) in column.into_iter().enumerate() {
                values[(i, j)] = value;
            }
        }
        SummaryTable {
            title,
            statistics: statistics.to_vec(),
            fields,
            values,
        }
    }

    pub(crate) fn get(&self, statistic: &str, field: NumericField) -> Option<f64> {
        let i = self.statistics.iter().position(|s| *s == statistic)?;
        let j = self.fields.iter().position(|f| *f == field)?;
        self.values[(i, j)]
    }

    /// Copy of the table rounded to each field's display precision.
    pub(crate) fn rounded(&self) -> SummaryTable {
        let mut values = self.values.clone();
        for (j, field) in self.fields.iter().enumerate() {
            for value in values.column_mut(j) {
                *value = value.map(|v| round_to(v, field.precision()));
            }
        }
        SummaryTable {
            values,
            ..self.clone()
        }
    }
}

impl fmt::Display for SummaryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10}", "")?;
        for field in &self.fields {
            write!(f, "{:>22}", field.label())?;
        }
        writeln!(f)?;
        for (i, statistic) in self.statistics.iter().enumerate() {
            write!(f, "{:<10}", statistic)?;
            for (j, field) in self.fields.iter().enumerate() {
                match self.values[(i, j)] {
                    Some(v) => write!(f, "{:>22.*}", field.precision().max(0) as usize, v)?,
                    None => write!(f, "{:>22}", "NaN")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Round half to even, as the report tables do.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

fn defined(value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

fn finite_values(column: &Array1<f64>) -> Vec<f64> {
    column.iter().copied().filter(|v| v.is_finite()).collect()
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    defined(statrs::statistics::Statistics::mean(values.iter()))
}

pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    defined(Data::new(values.to_vec()).median())
}

/// Most frequent value, smallest first on ties. Undefined when nothing repeats.
pub(crate) fn mode(values: &[f64]) -> Option<f64> {
    let counts = values
        .iter()
        .filter_map(|&v| NotNan::new(v).ok())
        .counts();
    let top = counts.values().copied().max()?;
    if top < 2 {
        return None;
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n == top)
        .map(|(v, _)| v)
        .min()
        .map(NotNan::into_inner)
}

/// Sample (n - 1) standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    defined(statrs::statistics::Statistics::std_dev(values.iter()))
}

fn noisy(values: &[f64]) -> Option<Array1<N64>> {
    if values.is_empty() {
        return None;
    }
    values.iter().map(|&v| N64::try_new(v)).collect()
}

/// Linear interpolation between order statistics at position (n - 1) * q.
pub(crate) fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut array = noisy(values)?;
    array
        .quantile_mut(n64(q), &Linear)
        .ok()
        .map(|v| v.raw())
}

pub(crate) fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let array = noisy(values)?;
    let min = array.min().ok()?.raw();
    let max = array.max().ok()?.raw();
    Some((min, max))
}

pub(crate) fn central(values: &[f64]) -> Vec<Option<f64>> {
    vec![mean(values), median(values), mode(values)]
}

pub(crate) fn dispersion(values: &[f64]) -> Vec<Option<f64>> {
    let extremes = min_max(values);
    let q25 = quantile(values, 0.25);
    let q75 = quantile(values, 0.75);
    vec![
        std_dev(values),
        extremes.map(|(min, _)| min),
        extremes.map(|(_, max)| max),
        extremes.map(|(min, max)| max - min),
        q25,
        q75,
        q25.zip(q75).map(|(low, high)| high - low),
    ]
}

fn summarise(
    data: &FinalDataset,
    title: &'static str,
    statistics: &[&'static str],
    statistic: fn(&[f64]) -> Vec<Option<f64>>,
) -> SummaryTable {
    let columns = NumericField::ALL
        .iter()
        .map(|&field| (field, statistic(&finite_values(&data.column(field)))))
        .collect_vec();
    SummaryTable::from_columns(title, statistics, columns)
}

pub(crate) fn central_tendency_table(data: &FinalDataset) -> SummaryTable {
    summarise(data, "Central tendency summary statistics.", &CENTRAL_ROWS, central)
}

pub(crate) fn dispersion_table(data: &FinalDataset) -> SummaryTable {
    summarise(data, "Dispersion summary statistics.", &DISPERSION_ROWS, dispersion)
}
