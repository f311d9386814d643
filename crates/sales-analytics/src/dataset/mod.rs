//! Dataset Sources
//!
//! Where sales rows come from. Every analytics call loads the rows again,
//! so edits to the backing file show up on the next call.

mod csv_file;
mod fixed;

pub use csv_file::CsvSalesSource;
pub use fixed::StaticSalesSource;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::SalesRecord;

/// Sales dataset source (Strategy pattern)
#[async_trait]
pub trait SalesSource: Send + Sync {
    /// Load all rows
    async fn load(&self) -> Result<Vec<SalesRecord>>;

    /// Human-readable origin, for logs
    fn describe(&self) -> String;
}
