use std::fmt;

use crate::correlation::CorrelationReport;
use crate::eda_statistics::SummaryTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Caption {
    Table,
    Figure,
}

pub(crate) fn titled(kind: Caption, number: usize, caption: &str) -> String {
    let prefix = match kind {
        Caption::Table => "Table",
        Caption::Figure => "Figure",
    };
    format!("{prefix} {number}: {caption}")
}

pub(crate) fn format_r(r: Option<f64>) -> String {
    match r {
        Some(r) => format!("r = {r:.3}"),
        None => "r = n/a".to_string(),
    }
}

/// Tables 1 and 2 followed by the correlation coefficients behind Figure 3.
pub(crate) struct Report<'a> {
    pub(crate) central: &'a SummaryTable,
    pub(crate) dispersion: &'a SummaryTable,
    pub(crate) correlations: &'a CorrelationReport,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (number, table) in [(1, self.central), (2, self.dispersion)] {
            writeln!(f, "{}", titled(Caption::Table, number, table.title))?;
            writeln!(f, "{}", table.rounded())?;
        }

        writeln!(f, "{}", titled(Caption::Figure, 3, "Correlations amongst main variables."))?;
        for pair in &self.correlations.panels {
            writeln!(
                f,
                "  FF electricity share vs {:<32} {} (n = {})",
                pair.x_label,
                format_r(pair.r),
                pair.points.len()
            )?;
        }
        for group in &self.correlations.income_groups {
            writeln!(
                f,
                "  {:<28} GHG vs FF share          {} (n = {})",
                group.partition.label(),
                format_r(group.pair.r),
                group.pair.points.len()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::correlation_report;
    use crate::eda_statistics::{central_tendency_table, dispersion_table};
    use crate::models::{FinalDataset, FinalRecord};

    #[test]
    fn captions_are_numbered() {
        assert_eq!(titled(Caption::Table, 1, "Central."), "Table 1: Central.");
        assert_eq!(titled(Caption::Figure, 3, "Plots."), "Figure 3: Plots.");
    }

    #[test]
    fn undefined_correlation_is_not_a_number() {
        assert_eq!(format_r(None), "r = n/a");
        assert_eq!(format_r(Some(-0.12345)), "r = -0.123");
    }

    #[test]
    fn report_lists_tables_and_coefficients() {
        let data = FinalDataset::new(
            2021,
            vec![FinalRecord {
                country: "Aland".to_string(),
                year: 2021,
                iso: "AAA".to_string(),
                population: 1000.0,
                electricity_demand: 50.0,
                ghg_emissions: 10.0,
                ff_share: 80.0,
                re_share: 20.0,
                income_group: "H".to_string(),
            }],
        );
        let central = central_tendency_table(&data);
        let dispersion = dispersion_table(&data);
        let correlations = correlation_report(&data);
        let text = Report {
            central: &central,
            dispersion: &dispersion,
            correlations: &correlations,
        }
        .to_string();
        assert!(text.contains("Table 1: Central tendency summary statistics."));
        assert!(text.contains("Table 2: Dispersion summary statistics."));
        assert!(text.contains("Figure 3"));
        assert_eq!(text.matches("r = n/a").count(), 5);
    }
}
