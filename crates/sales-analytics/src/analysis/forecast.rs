//! Monthly Forecasting
//!
//! Additive decomposition `y(t) = trend(t) + season(month)`:
//!
//! - trend: ordinary least squares on the month index
//! - season: centred mean residual per calendar month, fitted only once the
//!   history spans two full years
//! - interval: 80% band from the residual standard error, widening as
//!   `sqrt(1 + h / n)` for a point `h` months past the last observation

use chrono::{Datelike, Months, NaiveDate};

use crate::error::{AnalyticsError, Result};
use crate::model::{ForecastPoint, MonthlyPoint};

/// Months forecast past the last observation
pub const HORIZON_MONTHS: u32 = 6;

/// Two-sided 80% normal quantile
const Z_80: f64 = 1.281_551_6;

/// Month-start dates strictly after `last`: `last + 1 ..= last + months`
pub fn horizon(last: NaiveDate, months: u32) -> Vec<NaiveDate> {
    (1..=months)
        .filter_map(|k| last.checked_add_months(Months::new(k)))
        .collect()
}

/// A forecasting model (Strategy pattern)
pub trait Forecaster: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fit on `history` (chronological, one point per month) and predict every date in `dates`
    fn forecast(&self, history: &[MonthlyPoint], dates: &[NaiveDate]) -> Result<Vec<ForecastPoint>>;
}

/// Trend plus yearly seasonality
#[derive(Clone, Debug)]
pub struct AdditiveForecaster {
    /// Interval half-width in residual standard errors
    pub interval_z: f64,

    /// History span (in months) required before seasonality is fitted
    pub seasonal_min_months: i32,
}

impl Default for AdditiveForecaster {
    fn default() -> Self {
        Self {
            interval_z: Z_80,
            seasonal_min_months: 24,
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(units: u64) -> f64 {
    units as f64
}

#[allow(clippy::cast_possible_truncation)]
fn round(value: f64) -> i64 {
    value.round() as i64
}

struct Fit {
    origin: i32,
    last: i32,
    intercept: f64,
    slope: f64,
    season: [f64; 12],
    sigma: f64,
    n: f64,
}

impl Fit {
    fn mean(&self, date: NaiveDate) -> f64 {
        let t = f64::from(month_index(date) - self.origin);
        self.intercept + self.slope * t + self.season[date.month0() as usize]
    }

    fn predict(&self, date: NaiveDate, z: f64) -> ForecastPoint {
        let yhat = self.mean(date);
        let ahead = f64::from((month_index(date) - self.last).max(0));
        let half = z * self.sigma * (1.0 + ahead / self.n).sqrt();

        ForecastPoint {
            ds: date,
            yhat: round(yhat),
            yhat_lower: round(yhat - half),
            yhat_upper: round(yhat + half),
        }
    }
}

impl AdditiveForecaster {
    fn fit(&self, history: &[MonthlyPoint]) -> Result<Fit> {
        if history.len() < 2 {
            return Err(AnalyticsError::InsufficientHistory {
                found: history.len(),
                needed: 2,
            });
        }

        let origin = month_index(history[0].ds);
        let last = history.iter().map(|p| month_index(p.ds)).max().unwrap_or(origin);
        let ts: Vec<f64> = history.iter().map(|p| f64::from(month_index(p.ds) - origin)).collect();
        let ys: Vec<f64> = history.iter().map(|p| as_f64(p.units)).collect();

        #[allow(clippy::cast_precision_loss)]
        let n = history.len() as f64;
        let mean_t = ts.iter().sum::<f64>() / n;
        let mean_y = ys.iter().sum::<f64>() / n;
        let sxx: f64 = ts.iter().map(|t| (t - mean_t).powi(2)).sum();
        let sxy: f64 = ts.iter().zip(&ys).map(|(t, y)| (t - mean_t) * (y - mean_y)).sum();

        if sxx <= f64::EPSILON {
            return Err(AnalyticsError::InsufficientHistory {
                found: 1,
                needed: 2,
            });
        }
        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_t;

        let mut fit = Fit {
            origin,
            last,
            intercept,
            slope,
            season: [0.0; 12],
            sigma: 0.0,
            n,
        };

        if last - origin + 1 >= self.seasonal_min_months {
            let season = seasonal_profile(history, |p| as_f64(p.units) - fit.mean(p.ds));
            fit.season = season;
        }

        let sse: f64 = history
            .iter()
            .map(|p| (as_f64(p.units) - fit.mean(p.ds)).powi(2))
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let dof = history.len().saturating_sub(2).max(1) as f64;
        fit.sigma = (sse / dof).sqrt();

        Ok(fit)
    }
}

/// Mean residual per calendar month, centred on zero over the months present
fn seasonal_profile(history: &[MonthlyPoint], residual: impl Fn(&MonthlyPoint) -> f64) -> [f64; 12] {
    let mut sums = [0.0; 12];
    let mut counts = [0_u32; 12];
    for point in history {
        let m = point.ds.month0() as usize;
        sums[m] += residual(point);
        counts[m] += 1;
    }

    let means: Vec<(usize, f64)> = (0..12)
        .filter(|&m| counts[m] > 0)
        .map(|m| (m, sums[m] / f64::from(counts[m])))
        .collect();
    if means.is_empty() {
        return [0.0; 12];
    }
    #[allow(clippy::cast_precision_loss)]
    let centre = means.iter().map(|(_, v)| v).sum::<f64>() / means.len() as f64;

    let mut season = [0.0; 12];
    for (m, v) in means {
        season[m] = v - centre;
    }
    season
}

impl Forecaster for AdditiveForecaster {
    fn name(&self) -> &'static str {
        "additive"
    }

    fn forecast(&self, history: &[MonthlyPoint], dates: &[NaiveDate]) -> Result<Vec<ForecastPoint>> {
        let fit = self.fit(history)?;
        Ok(dates.iter().map(|&d| fit.predict(d, self.interval_z)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn series(start: NaiveDate, units: &[u64]) -> Vec<MonthlyPoint> {
        units
            .iter()
            .enumerate()
            .map(|(i, &u)| MonthlyPoint {
                ds: start.checked_add_months(Months::new(u32::try_from(i).unwrap())).unwrap(),
                units: u,
            })
            .collect()
    }

    #[test]
    fn test_horizon_is_strictly_after_last_month() {
        let dates = horizon(date(2024, 11), HORIZON_MONTHS);
        assert_eq!(dates.len(), 6);
        assert_eq!(dates[0], date(2024, 12));
        assert_eq!(dates[5], date(2025, 5));
    }

    #[test]
    fn test_linear_series_is_extrapolated_exactly() {
        let units: Vec<u64> = (0..12).map(|t| 10 + 2 * t).collect();
        let history = series(date(2024, 1), &units);

        let out = AdditiveForecaster::default()
            .forecast(&history, &horizon(date(2024, 12), 2))
            .unwrap();

        assert_eq!(out[0].yhat, 34);
        assert_eq!(out[1].yhat, 36);
        assert_eq!(out[0].yhat_lower, out[0].yhat_upper);
    }

    #[test]
    fn test_yearly_season_is_learned_from_two_years() {
        let units: Vec<u64> = (0..24).map(|t| if t % 12 == 11 { 150 } else { 100 }).collect();
        let history = series(date(2023, 1), &units);

        let out = AdditiveForecaster::default()
            .forecast(&history, &[date(2025, 11), date(2025, 12)])
            .unwrap();

        assert!(out[1].yhat - out[0].yhat > 30, "{out:?}");
    }

    #[test]
    fn test_no_season_below_two_years() {
        let units: Vec<u64> = (0..12).map(|t| if t == 11 { 150 } else { 100 }).collect();
        let history = series(date(2024, 1), &units);

        let out = AdditiveForecaster::default()
            .forecast(&history, &[date(2025, 11), date(2025, 12)])
            .unwrap();

        assert!((out[1].yhat - out[0].yhat).abs() <= 5, "{out:?}");
    }

    #[test]
    fn test_bounds_hold_and_widen_with_horizon() {
        let units = [120, 95, 130, 80, 140, 110, 90, 150, 105, 125];
        let history = series(date(2024, 1), &units);
        let dates = horizon(date(2024, 10), HORIZON_MONTHS);

        let out = AdditiveForecaster::default().forecast(&history, &dates).unwrap();

        for point in &out {
            assert!(point.yhat_lower <= point.yhat && point.yhat <= point.yhat_upper);
        }
        let width = |p: &ForecastPoint| p.yhat_upper - p.yhat_lower;
        assert!(width(&out[5]) >= width(&out[0]));
        assert!(width(&out[0]) > 0);
    }

    #[test]
    fn test_single_month_is_insufficient() {
        let history = series(date(2024, 1), &[10]);
        let err = AdditiveForecaster::default()
            .forecast(&history, &horizon(date(2024, 1), 6))
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientHistory { found: 1, .. }));
    }
}
