//! CSV-backed dataset

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::SalesSource;
use crate::error::{AnalyticsError, Result};
use crate::model::SalesRecord;

/// Reads a headered CSV file with the `OPERATION_NAME, PRODUCT_ID,
/// PRODUCT_NAME, UNITS_SOLD, CALENDAR_YEAR, CALENDAR_MONTH` columns
#[derive(Clone, Debug)]
pub struct CsvSalesSource {
    path: PathBuf,
}

impl CsvSalesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse CSV text into records
    pub fn parse(bytes: &[u8]) -> Result<Vec<SalesRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let records = reader
            .deserialize::<SalesRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if let Some(bad) = records.iter().find(|r| !(1..=12).contains(&r.calendar_month)) {
            return Err(AnalyticsError::Dataset(format!(
                "CALENDAR_MONTH {} out of range for {} / {}",
                bad.calendar_month, bad.operation_name, bad.product_id
            )));
        }
        Ok(records)
    }
}

#[async_trait]
impl SalesSource for CsvSalesSource {
    async fn load(&self) -> Result<Vec<SalesRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AnalyticsError::DatasetMissing(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let records = Self::parse(&bytes)?;
        tracing::debug!(path = %self.path.display(), rows = records.len(), "Loaded sales dataset");
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}
