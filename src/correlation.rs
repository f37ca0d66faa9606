//! Correlation and trend-line analysis between FF electricity share and the
//! log-scaled size variables, overall and split by income partition.

use itertools::{Itertools, MinMaxResult};
use ndarray::{Array1, ArrayView1};
use tracing::debug;

use crate::models::{FinalDataset, IncomeGroup, NumericField};

/// `log10(value + 1)`, undefined when the offset value is not positive.
pub(crate) fn log10_plus_one(value: f64) -> Option<f64> {
    let shifted = value + 1.0;
    if shifted > 0.0 && shifted.is_finite() {
        Some(shifted.log10())
    } else {
        None
    }
}

/// Keeps rows where both variables are defined; masking is per pair.
pub(crate) fn paired_points(xs: &[Option<f64>], ys: &[Option<f64>]) -> Vec<(f64, f64)> {
    xs.iter()
        .zip(ys)
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((*x, *y)),
            _ => None,
        })
        .collect()
}

fn split(points: &[(f64, f64)]) -> (Array1<f64>, Array1<f64>) {
    let (x, y): (Vec<f64>, Vec<f64>) = points.iter().copied().unzip();
    (Array1::from(x), Array1::from(y))
}

fn calculate_correlation(x: &ArrayView1<f64>, y: &ArrayView1<f64>) -> Option<f64> {
    let x_mean = x.mean()?;
    let y_mean = y.mean()?;
    let numerator = x.iter().zip(y.iter()).map(|(&xi, &yi)| (xi - x_mean) * (yi - y_mean)).sum::<f64>();
    let denominator_x = x.iter().map(|&xi| (xi - x_mean).powi(2)).sum::<f64>().sqrt();
    let denominator_y = y.iter().map(|&yi| (yi - y_mean).powi(2)).sum::<f64>().sqrt();
    if denominator_x > 0.0 && denominator_y > 0.0 {
        Some(numerator / (denominator_x * denominator_y))
    } else {
        None
    }
}

/// Pearson r; undefined for fewer than two points or a constant variable.
pub(crate) fn pearson(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let (x, y) = split(points);
    calculate_correlation(&x.view(), &y.view())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LinearFit {
    pub(crate) slope: f64,
    pub(crate) intercept: f64,
}

impl LinearFit {
    pub(crate) fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Degree-1 least squares fit.
pub(crate) fn linear_fit(points: &[(f64, f64)]) -> Option<LinearFit> {
    if points.len() < 2 {
        return None;
    }
    let (x, y) = split(points);
    let x_mean = x.mean()?;
    let y_mean = y.mean()?;
    let sxx = x.iter().map(|&xi| (xi - x_mean).powi(2)).sum::<f64>();
    if sxx == 0.0 {
        return None;
    }
    let sxy = x.iter().zip(y.iter()).map(|(&xi, &yi)| (xi - x_mean) * (yi - y_mean)).sum::<f64>();
    let slope = sxy / sxx;
    Some(LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TrendLine {
    pub(crate) start: (f64, f64),
    pub(crate) end: (f64, f64),
}

/// Fitted line drawn between the smallest and largest x.
pub(crate) fn trend_line(points: &[(f64, f64)]) -> Option<TrendLine> {
    let fit = linear_fit(points)?;
    let (x0, x1) = match points.iter().map(|(x, _)| *x).minmax_by(f64::total_cmp) {
        MinMaxResult::MinMax(low, high) => (low, high),
        MinMaxResult::OneElement(_) | MinMaxResult::NoElements => return None,
    };
    Some(TrendLine {
        start: (x0, fit.predict(x0)),
        end: (x1, fit.predict(x1)),
    })
}

/// One scatter of FF share against a transformed variable.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PairAnalysis {
    pub(crate) label: String,
    pub(crate) x_label: String,
    pub(crate) points: Vec<(f64, f64)>,
    pub(crate) r: Option<f64>,
    pub(crate) trend: Option<TrendLine>,
}

impl PairAnalysis {
    pub(crate) fn from_points(label: &str, x_label: &str, points: Vec<(f64, f64)>) -> Self {
        let r = pearson(&points);
        let trend = trend_line(&points);
        debug!("{}: {} points, r = {:?}", label, points.len(), r);
        PairAnalysis {
            label: label.to_string(),
            x_label: x_label.to_string(),
            points,
            r,
            trend,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IncomePartition {
    LowAndLowerMiddle,
    UpperMiddleAndHigh,
}

impl IncomePartition {
    pub(crate) const ALL: [IncomePartition; 2] =
        [IncomePartition::LowAndLowerMiddle, IncomePartition::UpperMiddleAndHigh];

    pub(crate) fn label(self) -> &'static str {
        match self {
            IncomePartition::LowAndLowerMiddle => "Low & lower-middle income",
            IncomePartition::UpperMiddleAndHigh => "Upper-middle & high income",
        }
    }

    pub(crate) fn members(self) -> [IncomeGroup; 2] {
        match self {
            IncomePartition::LowAndLowerMiddle => [IncomeGroup::Low, IncomeGroup::LowerMiddle],
            IncomePartition::UpperMiddleAndHigh => [IncomeGroup::UpperMiddle, IncomeGroup::High],
        }
    }

    pub(crate) fn contains(self, code: &str) -> bool {
        IncomeGroup::from_code(code).is_some_and(|g| self.members().contains(&g))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GroupAnalysis {
    pub(crate) partition: IncomePartition,
    pub(crate) pair: PairAnalysis,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CorrelationReport {
    /// FF share against log population, log demand and log emissions.
    pub(crate) panels: Vec<PairAnalysis>,
    /// FF share against log emissions within each income partition.
    pub(crate) income_groups: Vec<GroupAnalysis>,
}

const LOG_PANELS: [(NumericField, &str); 3] = [
    (NumericField::Population, "log10(Population + 1)"),
    (NumericField::ElectricityDemand, "log10(Electricity demand + 1)"),
    (NumericField::GhgEmissions, "log10(GHG emissions + 1)"),
];

fn log_column(data: &FinalDataset, field: NumericField) -> Vec<Option<f64>> {
    data.column(field).iter().map(|&v| log10_plus_one(v)).collect()
}

fn ff_column(data: &FinalDataset) -> Vec<Option<f64>> {
    data.column(NumericField::FfShare).iter().map(|&v| Some(v)).collect()
}

pub(crate) fn analyse_panels(data: &FinalDataset) -> Vec<PairAnalysis> {
    let ff = ff_column(data);
    LOG_PANELS
        .iter()
        .map(|&(field, x_label)| {
            let points = paired_points(&log_column(data, field), &ff);
            PairAnalysis::from_points(field.label(), x_label, points)
        })
        .collect()
}

pub(crate) fn analyse_income_groups(data: &FinalDataset) -> Vec<GroupAnalysis> {
    let ghg = log_column(data, NumericField::GhgEmissions);
    let ff = ff_column(data);
    IncomePartition::ALL
        .iter()
        .map(|&partition| {
            let (xs, ys): (Vec<Option<f64>>, Vec<Option<f64>>) = data
                .records()
                .iter()
                .zip(ghg.iter().zip(&ff))
                .filter(|(record, _)| partition.contains(&record.income_group))
                .map(|(_, (x, y))| (*x, *y))
                .unzip();
            GroupAnalysis {
                partition,
                pair: PairAnalysis::from_points(
                    partition.label(),
                    "log10(GHG emissions + 1)",
                    paired_points(&xs, &ys),
                ),
            }
        })
        .collect()
}

pub(crate) fn correlation_report(data: &FinalDataset) -> CorrelationReport {
    CorrelationReport {
        panels: analyse_panels(data),
        income_groups: analyse_income_groups(data),
    }
}
