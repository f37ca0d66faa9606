use plotters::coord::Shift;
use plotters::prelude::*;
use std::error::Error;
use std::ops::Range;
use std::path::Path;
use tracing::info;

use crate::correlation::{CorrelationReport, PairAnalysis};
use crate::error::{AnalysisError, Result};
use crate::report::format_r;

const FF_AXIS: &str = "Fossil fuel electricity share (%)";
const PANEL_TAGS: [&str; 4] = ["(a)", "(b)", "(c)", "(d)"];

/// One scatter drawn on a panel: points colour, trend line colour.
struct Series<'a> {
    pair: &'a PairAnalysis,
    color: RGBColor,
    line: RGBColor,
}

/// X axis bounds with a little padding; unit range when there is nothing to show.
pub(crate) fn axis_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (low, high) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !low.is_finite() {
        return 0.0..1.0;
    }
    let pad = if high > low { (high - low) * 0.05 } else { 0.5 };
    (low - pad)..(high + pad)
}

fn draw_panel(
    area: &DrawingArea<BitMapBackend, Shift>,
    tag: &str,
    x_label: &str,
    series: &[Series],
    legend: bool,
) -> std::result::Result<(), Box<dyn Error>> {
    let x_range = axis_range(series.iter().flat_map(|s| s.pair.points.iter().map(|p| p.0)));
    let text_x = x_range.start + 0.65 * (x_range.end - x_range.start);

    let mut chart = ChartBuilder::on(area)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range, 0.0..100.0)?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(FF_AXIS)
        .label_style(("sans-serif", 12))
        .draw()?;

    for (i, s) in series.iter().enumerate() {
        let color = s.color;
        let points = chart.draw_series(
            s.pair
                .points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 3, color.mix(0.5).filled())),
        )?;
        if legend {
            points
                .label(s.pair.label.clone())
                .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
        }

        if let Some(line) = s.pair.trend {
            chart.draw_series(LineSeries::new(vec![line.start, line.end], s.line.stroke_width(2)))?;
        }

        let text_y = 30.0 + 40.0 * i as f64;
        chart.draw_series(std::iter::once(Text::new(
            format_r(s.pair.r),
            (text_x, text_y),
            ("sans-serif", 16).into_font().color(&color),
        )))?;
    }

    if legend {
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    area.draw_text(tag, &("sans-serif", 18).into_font().color(&BLACK), (8, 4))?;
    Ok(())
}

fn draw(report: &CorrelationReport, path: &Path) -> std::result::Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (1000, 800)).into_drawing_area();
    root.fill(&WHITE)?;
    let areas = root.split_evenly((2, 2));

    let colors = [BLUE, RED, GREEN];
    for ((area, pair), (tag, color)) in areas
        .iter()
        .zip(&report.panels)
        .zip(PANEL_TAGS.iter().zip(colors))
    {
        let series = [Series { pair, color, line: BLACK }];
        draw_panel(area, tag, &pair.x_label, &series, false)?;
    }

    let group_colors = [MAGENTA, CYAN];
    let series: Vec<Series> = report
        .income_groups
        .iter()
        .zip(group_colors)
        .map(|(group, color)| Series {
            pair: &group.pair,
            color,
            line: color,
        })
        .collect();
    if let Some(area) = areas.get(3) {
        draw_panel(area, PANEL_TAGS[3], "log10(GHG emissions + 1)", &series, true)?;
    }

    root.present()?;
    Ok(())
}

/// Renders the 2x2 correlation figure to a PNG file.
pub(crate) fn draw_correlation_figure(report: &CorrelationReport, path: &Path) -> Result<()> {
    draw(report, path).map_err(|e| AnalysisError::Plot(e.to_string()))?;
    info!("Correlation figure saved to {}", path.display());
    Ok(())
}
