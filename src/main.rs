mod clean;
mod config;
mod correlation;
mod eda_statistics;
mod error;
mod load_clean;
mod models;
mod plot;
mod report;

use std::error::Error;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::clean::build_final_dataset;
use crate::config::{AnalysisConfig, CONFIG_FILE};
use crate::correlation::correlation_report;
use crate::eda_statistics::{central_tendency_table, dispersion_table};
use crate::error::require_defined;
use crate::load_clean::{load_energy, load_income_grid};
use crate::report::Report;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(config: &AnalysisConfig) -> error::Result<()> {
    let energy = load_energy(&config.energy_path)?;
    let income = load_income_grid(&config.income_path, &config.income_layout.sheet)?;

    let data = build_final_dataset(energy, &income, config)?;
    if config.require_non_empty {
        data.require_non_empty()?;
    }
    info!("Final dataset: {} countries for {}", data.len(), data.target_year());

    let central = central_tendency_table(&data);
    let dispersion = dispersion_table(&data);
    let correlations = correlation_report(&data);

    let pairs = correlations
        .panels
        .iter()
        .chain(correlations.income_groups.iter().map(|g| &g.pair));
    for pair in pairs {
        if let Err(e) = require_defined(pair.r, &format!("r for {} vs {}", pair.label, pair.x_label)) {
            warn!("{}", e);
        }
    }

    let report = Report {
        central: &central,
        dispersion: &dispersion,
        correlations: &correlations,
    };
    println!("{}", report);
    plot::draw_correlation_figure(&correlations, &config.figure_path)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let config = AnalysisConfig::load(Path::new(CONFIG_FILE))?;
    run(&config)?;
    Ok(())
}
