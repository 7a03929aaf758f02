use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::types::{FilterCombination, SeriesRow, TimeSeries};

/// Writes one CSV artifact per reconciled series.
pub struct SeriesWriter {
    dir: PathBuf,
}

impl SeriesWriter {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    /// Rows are `Date,Index Value,Change`, oldest first; a missing change is an empty field.
    pub fn write(&self, combination: &FilterCombination, series: &TimeSeries) -> Result<PathBuf> {
        let path = self.dir.join(combination.artifact_name());
        let mut out = csv::Writer::from_path(&path)?;
        for record in series.records() {
            out.serialize(SeriesRow::from(record))?;
        }
        out.flush()?;

        info!(
            combination = %combination.slug(),
            rows = series.len(),
            "Saved {} ({} rows, {} to {})",
            path.display(),
            series.len(),
            series.first_period().map(|p| p.to_string()).unwrap_or_default(),
            series.last_period().map(|p| p.to_string()).unwrap_or_default(),
        );
        Ok(path)
    }
}
