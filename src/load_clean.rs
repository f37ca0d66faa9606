use calamine::{open_workbook_auto, Data, Range, Reader};
use std::fs::File;
use std::path::Path;
use tracing::info;

use crate::clean::{project_energy, INCOME_SOURCE};
use crate::error::{AnalysisError, Result};
use crate::models::{Cell, Grid, RawEnergyRecord};

// Load the energy CSV, projected to the selected columns
pub(crate) fn load_energy(path: &Path) -> Result<Vec<RawEnergyRecord>> {
    info!("Reading energy data from {}", path.display());
    project_energy(File::open(path)?)
}

// Load one workbook sheet with absolute row/column positions preserved
pub(crate) fn load_income_grid(path: &Path, sheet: &str) -> Result<Grid> {
    info!("Reading income classification from {} [{}]", path.display(), sheet);
    let mut workbook = open_workbook_auto(path)?;
    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(AnalysisError::format(
            INCOME_SOURCE,
            format!("sheet '{sheet}' not found in {}", path.display()),
        ));
    }
    let range = workbook.worksheet_range(sheet)?;
    let grid = grid_from_range(&range);
    info!("Sheet '{}': {} rows x {} columns", sheet, grid.height(), grid.width());
    Ok(grid)
}

fn cell_from(value: &Data) -> Cell {
    match value {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::text(s),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::DateTime(d) => Cell::Number(d.as_f64()),
        Data::Error(_) => Cell::Empty,
    }
}

// calamine ranges start at the first used cell; pad so offsets count from A1
fn grid_from_range(range: &Range<Data>) -> Grid {
    let Some((end_row, end_col)) = range.end() else {
        return Grid::default();
    };
    let rows = (0..=end_row)
        .map(|row| {
            (0..=end_col)
                .map(|col| range.get_value((row, col)).map_or(Cell::Empty, cell_from))
                .collect()
        })
        .collect();
    Grid::new(rows)
}
