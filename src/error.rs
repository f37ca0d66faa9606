use thiserror::Error;

pub(crate) type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Error, Debug)]
pub(crate) enum AnalysisError {
    /// A required column, sheet or offset is absent from a source
    #[error("{source_name}: {detail}")]
    SourceFormat { source_name: String, detail: String },

    #[error("no rows survived cleaning and joining for year {year}")]
    EmptyDataset { year: i32 },

    #[error("{0} is undefined for this data")]
    UndefinedStatistic(String),

    #[error("duplicate ISO code {iso} in {source_name}")]
    DuplicateKey { source_name: String, iso: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("plotting error: {0}")]
    Plot(String),
}

impl AnalysisError {
    pub(crate) fn format(source_name: &str, detail: impl Into<String>) -> Self {
        AnalysisError::SourceFormat {
            source_name: source_name.to_string(),
            detail: detail.into(),
        }
    }
}

/// Turns an undefined statistic into an error for callers that cannot proceed without it.
pub(crate) fn require_defined(value: Option<f64>, name: &str) -> Result<f64> {
    value.ok_or_else(|| AnalysisError::UndefinedStatistic(name.to_string()))
}
