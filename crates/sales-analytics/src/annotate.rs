//! Forecast-aware result annotation
//!
//! Models tend to read every date as already past. For forecast results the
//! annotation states today's date and the forecast period up front.

use chrono::{Datelike, Local, NaiveDate};

use agent_core::{PlainAnnotator, ResultAnnotator, ToolResult};

use crate::svckit::FORECAST_SALES;

#[derive(Clone, Debug, Default)]
pub struct ForecastAnnotator {
    /// Fixed "today"; the local date when unset
    today: Option<NaiveDate>,
}

impl ForecastAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotate as if today were `today`
    pub fn at(today: NaiveDate) -> Self {
        Self { today: Some(today) }
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}

/// First and last `ds` of a non-empty forecast payload
fn forecast_period(result: &ToolResult) -> Option<(&str, &str)> {
    let points = result.payload()?.get("forecast")?.as_array()?;
    let first = points.first()?.get("ds")?.as_str()?;
    let last = points.last()?.get("ds")?.as_str()?;
    Some((first, last))
}

fn year_of(ds: &str) -> &str {
    ds.split('-').next().unwrap_or(ds)
}

impl ResultAnnotator for ForecastAnnotator {
    fn annotate(&self, tool: &str, result: &ToolResult) -> String {
        let period = (tool == FORECAST_SALES).then(|| forecast_period(result)).flatten();
        let Some((first, last)) = period else {
            return PlainAnnotator.annotate(tool, result);
        };

        let today = self.today();
        format!(
            "IMPORTANT CONTEXT:\n\
             - Current date: {date} (Year: {year})\n\
             - These are FUTURE sales forecasts\n\
             - Forecast period: {first} to {last}\n\
             - Pay attention to the YEARS in the dates: they run from {first_year} to {last_year}\n\
             \n\
             Here is the forecast data from the {tool} function:\n\
             \n\
             {text}\n\
             \n\
             Please format this data nicely for the user, making sure to use the CORRECT YEARS from the data.",
            date = today.format("%B %d, %Y"),
            year = today.year(),
            first_year = year_of(first),
            last_year = year_of(last),
            text = result.to_text(),
        )
    }
}
