pub mod csv_loader;

use std::path::PathBuf;
use tchart_core::{ChartData, SeriesError};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Data not found: {0}")]
    NotFound(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid bars: {0}")]
    SeriesError(#[from] SeriesError),
}

/// Chart data stored as one `<instrument>.csv` file per instrument.
pub struct CsvDataSource {
    pub directory: PathBuf,
}

impl CsvDataSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn load(&self, instrument: &str) -> Result<ChartData, DataError> {
        let file_path = self.directory.join(format!("{}.csv", instrument));
        if !file_path.exists() {
            return Err(DataError::NotFound(format!(
                "CSV file not found: {}",
                file_path.display()
            )));
        }
        let data = csv_loader::load_chart_from_csv(&file_path)?;
        debug!(instrument, bars = data.len(), "Loaded chart data");
        Ok(data)
    }

    pub fn available_instruments(&self) -> Result<Vec<String>, DataError> {
        let mut instruments = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "csv") {
                if let Some(stem) = path.file_stem() {
                    instruments.push(stem.to_string_lossy().to_string());
                }
            }
        }
        instruments.sort();
        Ok(instruments)
    }
}
