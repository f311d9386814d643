//! In-memory dataset
//!
//! For tests and demos.

use async_trait::async_trait;

use super::SalesSource;
use crate::error::Result;
use crate::model::SalesRecord;

/// Serves a fixed set of rows
#[derive(Clone, Debug, Default)]
pub struct StaticSalesSource {
    records: Vec<SalesRecord>,
}

impl StaticSalesSource {
    pub fn new(records: Vec<SalesRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl SalesSource for StaticSalesSource {
    async fn load(&self) -> Result<Vec<SalesRecord>> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("static:{} rows", self.records.len())
    }
}
